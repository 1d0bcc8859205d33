//! Listing Queries
//!
//! Change listings that would exceed the server's result limits are split
//! by directory and re-assembled here.

pub mod paginate;

use crate::error::Error;

pub use paginate::{PaginatedQueryResolver, DEFAULT_MAX_DEPTH, DEFAULT_PAGE_SIZE};

/// Start of the error text the server sends for oversized results
pub const OVERFLOW_SENTINEL: &str = "Request too large";

/// Whether `error` is the server refusing an oversized result
pub fn is_overflow(error: &Error) -> bool {
    error
        .server_message()
        .map(|m| m.lines().any(|line| line.trim_start().starts_with(OVERFLOW_SENTINEL)))
        .unwrap_or(false)
}
