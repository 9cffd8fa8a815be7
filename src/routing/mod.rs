//! Route classification

pub mod classifier;

pub use classifier::Classifier;
