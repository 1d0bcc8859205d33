//! Connection Context
//!
//! Everything a session needs to reach one server: address, identity,
//! credentials and process settings. The ticket store is the only part a
//! session ever writes to.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::config::{Config, Secret};

/// Shared, replaceable ticket for one connection
#[derive(Debug, Clone, Default)]
pub struct TicketStore {
    inner: Arc<RwLock<Option<Secret>>>,
}

impl TicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a ticket issued elsewhere
    pub fn with_ticket(ticket: impl Into<Secret>) -> Self {
        let store = Self::new();
        store.set(ticket.into());
        store
    }

    pub fn get(&self) -> Option<Secret> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, ticket: Secret) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(ticket);
    }

    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_set(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Connection parameters read by sessions
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    /// Server address (`-p`)
    pub server: Option<String>,
    /// User name (`-u`)
    pub user: Option<String>,
    /// Client workspace (`-c`)
    pub client: Option<String>,
    pub password: Option<Secret>,
    pub tickets: TicketStore,
    /// Path to the client executable
    pub executable: String,
    /// Default per-command deadline
    pub timeout: Duration,
    /// Extra environment for the client process
    pub environment: HashMap<String, String>,
}

impl ConnectionContext {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            server: None,
            user: None,
            client: None,
            password: None,
            tickets: TicketStore::new(),
            executable: executable.into(),
            timeout: Duration::from_secs(10),
            environment: HashMap::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let connection = &config.connection;
        let tickets = match connection.ticket.as_deref().filter(|t| !t.is_empty()) {
            Some(ticket) => TicketStore::with_ticket(ticket),
            None => TicketStore::new(),
        };
        Self {
            server: connection.port.clone(),
            user: connection.user.clone(),
            client: connection.client.clone(),
            password: connection
                .password
                .as_deref()
                .filter(|p| !p.is_empty())
                .map(Secret::from),
            tickets,
            executable: connection.executable.clone(),
            timeout: config.session.timeout(),
            environment: connection.environment.clone(),
        }
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<Secret>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Credential for `-P`: the ticket when one is stored, else the password
    pub fn credential(&self) -> Option<Secret> {
        self.tickets
            .get()
            .filter(|t| !t.is_empty())
            .or_else(|| self.password.clone())
    }

    /// User name for messages; `(unset)` when none is configured
    pub fn user_label(&self) -> &str {
        self.user.as_deref().unwrap_or("(unset)")
    }
}

impl Default for ConnectionContext {
    fn default() -> Self {
        Self::new(crate::models::CLIENT_PLACEHOLDER)
    }
}
