//! Configuration management for p4wire
//!
//! Connection parameters, session timing and cache lifetimes. Loaded from
//! TOML or JSON by [`loader::ConfigLoader`] and overridden by the usual
//! `P4*` environment variables.

pub mod loader;
pub mod secret;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::process::ClosePolicy;
use crate::protocol::DEFAULT_BENIGN_ERRORS;

pub use loader::{ConfigFormat, ConfigLoader, LoadOptions};
pub use secret::Secret;

/// Main configuration structure for p4wire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server connection parameters
    pub connection: ConnectionConfig,

    /// Command session behaviour
    pub session: SessionConfig,

    /// Object cache lifetimes
    pub cache: CacheConfig,
}

/// Server connection parameters
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Client executable path
    pub executable: String,

    /// Server address (`P4PORT`)
    pub port: Option<String>,

    /// User name (`P4USER`)
    pub user: Option<String>,

    /// Client workspace (`P4CLIENT`); defaults to the host name
    pub client: Option<String>,

    /// Password used for `-P` and for the login exchange (`P4PASSWD`)
    pub password: Option<String>,

    /// Pre-issued ticket (`P4TICKET`)
    pub ticket: Option<String>,

    /// Extra environment variables for the client process
    pub environment: HashMap<String, String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            executable: "p4".to_string(),
            port: None,
            user: None,
            client: default_client_name(),
            password: None,
            ticket: None,
            environment: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("executable", &self.executable)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("client", &self.client)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("ticket", &self.ticket.as_ref().map(|_| "***"))
            .field("environment", &self.environment.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Host name, used as the default workspace name
fn default_client_name() -> Option<String> {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
}

/// Command session behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Per-command deadline in milliseconds
    pub timeout_ms: u64,

    /// How long to wait for a finished command to exit before terminating it
    pub close_wait_ms: u64,

    /// Time between terminate request and hard kill
    pub kill_grace_ms: u64,

    /// Whether the client inherits this process's environment
    pub inherit_env: bool,

    /// `error:` texts treated as informational (case-insensitive substrings)
    pub benign_errors: Vec<String>,

    /// Page size for `changes` listings
    pub page_size: usize,

    /// How many levels an oversized query may be split
    pub max_partition_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            close_wait_ms: 5_000,
            kill_grace_ms: 500,
            inherit_env: true,
            benign_errors: DEFAULT_BENIGN_ERRORS.iter().map(|s| s.to_string()).collect(),
            page_size: 100,
            max_partition_depth: 8,
        }
    }
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn close_policy(&self) -> ClosePolicy {
        let defaults = ClosePolicy::default();
        let interval = defaults.poll_interval.as_millis().max(1) as u64;
        ClosePolicy {
            wait_attempts: u32::try_from(self.close_wait_ms / interval)
                .unwrap_or(u32::MAX)
                .max(1),
            kill_grace: Duration::from_millis(self.kill_grace_ms),
            ..defaults
        }
    }
}

/// Object cache lifetimes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry lifetime and sweep interval in seconds
    pub ttl_secs: u64,

    /// Age after which a domain object re-fetches before use
    pub staleness_threshold_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            staleness_threshold_secs: 60,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_secs(self.staleness_threshold_secs)
    }
}

/// Configuration utilities
pub mod utils {
    use super::*;

    /// Get configuration file format from path
    pub fn get_config_format(path: &Path) -> Option<ConfigFormat> {
        match path.extension()?.to_str()? {
            "toml" => Some(ConfigFormat::Toml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }
}
