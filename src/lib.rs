//! p4wire - Perforce command-line transport
//!
//! Talks to a Perforce server only through its command-line client, treating
//! the client's script-mode output as a wire protocol.
//!
//! ## Features
//!
//! - **Script-mode framing:** `<tag>: <content>` lines classified into content, errors and exit codes
//! - **Ticket re-login:** expired or missing tickets are renewed and the command retried once
//! - **Paginated queries:** oversized `changes` listings are split by directory and merged
//! - **Object caches:** TTL maps with background sweeping and per-object staleness gates
//! - **Configuration:** TOML or JSON files plus the usual `P4*` environment variables
//!
//! ## Module Organization
//!
//! - [`process`] - Spawning the client, reader threads, process teardown
//! - [`protocol`] - Script-mode line classification
//! - [`session`] - Command sessions, argument assembly, authentication retry, cancellation
//! - [`query`] - Paginated and partitioned listing queries
//! - [`cache`] - TTL caches, cache registry, staleness gates
//! - [`config`] - Configuration loading and credentials
//! - [`models`] - Commands, responses, change summaries
//! - [`mod@error`] - Error types and Result aliases
//!
//! ## Quick Start
//!
//! ```no_run
//! use p4wire::{connect, Command, ConfigLoader};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::load()?;
//! let session = connect(&config);
//! let response = session.execute(&Command::p4(["changes", "-m", "1", "//depot/..."]))?;
//! for line in response.lines() {
//!     println!("{}", line);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Threading
//!
//! Calls block the caller's thread. Each spawned client gets one reader
//! thread per output stream, and each cache with eviction enabled owns one
//! sweep thread.

#[macro_use]
extern crate tracing;

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod process;
pub mod protocol;
pub mod query;
pub mod session;

// Re-exports for core functionality
pub use config::{Config, ConfigLoader, Secret};
pub use error::{Error, Result};
pub use models::{ChangeSummary, Command, Framing, Response, ResponseEvent};

// Convenience re-exports for common types
pub use cache::{CacheRegistry, StalenessGate, Syncable, TtlCache};
pub use process::{Executor, ProcessExecutor};
pub use protocol::LineClassifier;
pub use query::PaginatedQueryResolver;
pub use session::{
    AuthRetryController, CancelToken, CommandRunner, CommandSession, ConnectionContext,
    TicketStore,
};

/// The current version of p4wire from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The crate name from Cargo.toml
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Session over real client processes that logs in again when needed
pub fn connect(config: &Config) -> AuthRetryController {
    debug!("{} v{} connecting", NAME, VERSION);
    AuthRetryController::new(CommandSession::from_config(config))
}
