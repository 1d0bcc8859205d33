//! Ticket Re-login
//!
//! Wraps a [`CommandSession`]. A command rejected with a known
//! authentication message triggers one `login -a -p` exchange; the fresh
//! ticket goes into the connection's [`TicketStore`](super::TicketStore) and
//! the command is re-run once.

use std::io::Write;

use super::{CancelToken, CommandRunner, CommandSession};
use crate::config::Secret;
use crate::error::{Error, Result};
use crate::models::{Command, Response};

/// What to do with a recognized authentication failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    /// Log in again and retry the command once
    Relogin,
    /// Give up; retrying cannot help
    Fatal,
}

/// A server message that identifies an authentication failure
#[derive(Debug, Clone, Copy)]
pub struct AuthSignature {
    pub condition: &'static str,
    pub pattern: &'static str,
    pub action: AuthAction,
}

/// Known authentication failures, matched by substring
pub const AUTH_SIGNATURES: &[AuthSignature] = &[
    AuthSignature {
        condition: "connection refused or server address misconfigured",
        pattern: "Connect to server failed; check $P4PORT",
        action: AuthAction::Relogin,
    },
    AuthSignature {
        condition: "password unset or invalid",
        pattern: "Perforce password (P4PASSWD) invalid or unset",
        action: AuthAction::Relogin,
    },
    AuthSignature {
        condition: "ticket login required",
        pattern: "Password not allowed at this server security level",
        action: AuthAction::Relogin,
    },
    AuthSignature {
        condition: "session expired",
        pattern: "Your session has expired",
        action: AuthAction::Relogin,
    },
    AuthSignature {
        condition: "permission not granted",
        pattern: "has not been enabled by 'p4 protect'",
        action: AuthAction::Relogin,
    },
    AuthSignature {
        condition: "password rejected",
        pattern: "Password invalid",
        action: AuthAction::Relogin,
    },
    AuthSignature {
        condition: "license quota exceeded",
        pattern: "over license quota",
        action: AuthAction::Fatal,
    },
];

/// Find the signature matching a server message.
///
/// Fatal signatures win when a message matches more than one.
pub fn match_signature(message: &str) -> Option<&'static AuthSignature> {
    let mut matches = AUTH_SIGNATURES.iter().filter(|s| message.contains(s.pattern));
    let first = matches.next()?;
    if first.action == AuthAction::Fatal {
        return Some(first);
    }
    Some(matches.find(|s| s.action == AuthAction::Fatal).unwrap_or(first))
}

fn auth_action(error: &Error) -> Option<AuthAction> {
    error
        .server_message()
        .and_then(match_signature)
        .map(|s| s.action)
}

/// Progress of one call through the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Idle,
    Executing,
    AuthFailed,
    LoggingIn,
    Retrying,
    Done,
}

/// Command session that logs in again when the ticket is rejected
#[derive(Debug, Clone)]
pub struct AuthRetryController {
    session: CommandSession,
}

impl AuthRetryController {
    pub fn new(session: CommandSession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &CommandSession {
        &self.session
    }

    pub fn execute(&self, command: &Command) -> Result<Response> {
        self.with_retry(command, |session| session.execute(command))
    }

    pub fn save(&self, command: &Command) -> Result<Response> {
        self.with_retry(command, |session| session.save(command))
    }

    pub fn execute_cancellable(&self, command: &Command, token: &CancelToken) -> Result<Response> {
        self.with_retry(command, |session| {
            session.execute_cancellable(command, token)
        })
    }

    /// Run `login -a -p` with the configured password and store the ticket
    pub fn login(&self) -> Result<Secret> {
        let context = self.session.context();
        let user = context.user_label().to_string();
        let password = context
            .password
            .clone()
            .ok_or_else(|| Error::AuthenticationFailed {
                user: user.clone(),
                reason: "no password configured for login".to_string(),
            })?;

        let command = Command::p4(["login", "-a", "-p"]).without_credentials();
        let response = self
            .session
            .execute_with_input(&command, |w: &mut dyn Write| {
                w.write_all(password.expose().as_bytes())?;
                w.write_all(b"\n")
            })
            .map_err(|e| match e {
                Error::Protocol { message, .. } => {
                    if let Some(sig) = match_signature(&message)
                        .filter(|s| s.action == AuthAction::Fatal)
                    {
                        debug!("Login refused: {}", sig.condition);
                        return Error::LicenseQuota {
                            user: user.clone(),
                            message,
                        };
                    }
                    Error::AuthenticationFailed {
                        user: user.clone(),
                        reason: message,
                    }
                }
                other => other,
            })?;

        let ticket = extract_ticket(&response).ok_or_else(|| Error::AuthenticationFailed {
            user: user.clone(),
            reason: "login returned no ticket".to_string(),
        })?;
        context.tickets.set(ticket.clone());
        info!("Logged in as {}", user);
        Ok(ticket)
    }

    fn with_retry<F>(&self, command: &Command, attempt: F) -> Result<Response>
    where
        F: Fn(&CommandSession) -> Result<Response>,
    {
        let mut state = AuthState::Idle;
        let user = self.session.context().user_label().to_string();

        advance(&mut state, AuthState::Executing, command);
        let error = match attempt(&self.session) {
            Ok(response) => {
                advance(&mut state, AuthState::Done, command);
                return Ok(response);
            }
            Err(e) => e,
        };

        match auth_action(&error) {
            None => return Err(error),
            Some(AuthAction::Fatal) => return Err(license_error(user, error)),
            Some(AuthAction::Relogin) => advance(&mut state, AuthState::AuthFailed, command),
        }

        advance(&mut state, AuthState::LoggingIn, command);
        self.login()?;

        advance(&mut state, AuthState::Retrying, command);
        let result = attempt(&self.session);
        advance(&mut state, AuthState::Done, command);
        result.map_err(|e| match auth_action(&e) {
            Some(AuthAction::Relogin) => Error::AuthenticationFailed {
                user: user.clone(),
                reason: e.server_message().unwrap_or_default().to_string(),
            },
            Some(AuthAction::Fatal) => license_error(user.clone(), e),
            None => e,
        })
    }
}

impl CommandRunner for AuthRetryController {
    fn run(&self, command: &Command) -> Result<Response> {
        if command.builds_from_input() {
            self.save(command)
        } else {
            self.execute(command)
        }
    }
}

fn advance(state: &mut AuthState, next: AuthState, command: &Command) {
    trace!("{:?} -> {:?} for {}", state, next, command);
    *state = next;
}

fn license_error(user: String, error: Error) -> Error {
    let message = error.server_message().unwrap_or_default().to_string();
    Error::LicenseQuota { user, message }
}

/// The last token of the last content line, which holds the ticket
fn extract_ticket(response: &Response) -> Option<Secret> {
    response
        .lines()
        .iter()
        .rev()
        .find(|line| !line.trim().is_empty())
        .and_then(|line| line.split_whitespace().last())
        .map(Secret::from)
}
