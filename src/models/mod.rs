//! Core data models for p4wire
//!
//! Commands sent to the client, the events and responses read back, and
//! the listing entries the query layer parses out of them.

pub mod change;
pub mod command;
pub mod response;

// Re-exports for convenience
pub use change::ChangeSummary;
pub use command::{Command, Framing, CLIENT_PLACEHOLDER};
pub use response::{Response, ResponseEvent};
