//! Test doubles for the router's external collaborators

pub mod mocks;

pub use mocks::*;
