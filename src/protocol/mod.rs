//! Client output protocol
//!
//! Framing rules for the line-oriented output of the client in script mode.

pub mod classifier;

pub use classifier::{split_tag, LineClassifier, Tag, DEFAULT_BENIGN_ERRORS, SEPARATOR};
