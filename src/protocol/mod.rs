//! Wire types for agent discovery and task delegation
//!
//! Capability descriptors are fetched from each agent's well-known path; tasks
//! travel as JSON-RPC `message/send` requests.

pub mod card;
pub mod messages;

pub use card::*;
pub use messages::*;
