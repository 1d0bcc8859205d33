//! Command Model
//!
//! An immutable description of one client invocation: the argument vector,
//! an optional stdin payload and the flags that control how the session
//! frames and authenticates it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder for the client executable in `args[0]`; the session replaces it
/// with the configured path.
pub const CLIENT_PLACEHOLDER: &str = "p4";

/// How content lines are handed to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// `<tag>: ` is removed from content lines
    #[default]
    Stripped,
    /// Lines are kept verbatim, tag included
    Raw,
}

/// A single client invocation
#[derive(Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<String>,
    input: Option<String>,
    framing: Framing,
    script_mode: bool,
    inject_credentials: bool,
    builds_from_input: bool,
    timeout: Option<Duration>,
}

impl Command {
    /// Create a command from a full argument vector (`args[0]` is the executable)
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            input: None,
            framing: Framing::default(),
            script_mode: true,
            inject_credentials: true,
            builds_from_input: false,
            timeout: None,
        }
    }

    /// Create a client command; `p4` is prepended to the given arguments
    pub fn p4<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = vec![CLIENT_PLACEHOLDER.to_string()];
        argv.extend(args.into_iter().map(Into::into));
        Self::new(argv)
    }

    /// Attach a stdin payload
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Mark this command as building an object from stdin (`-i` style save)
    pub fn from_input(mut self) -> Self {
        self.builds_from_input = true;
        self
    }

    /// Keep the tag on content lines
    pub fn raw(mut self) -> Self {
        self.framing = Framing::Raw;
        self
    }

    /// Do not request script-mode framing (`-s`)
    pub fn unframed(mut self) -> Self {
        self.script_mode = false;
        self
    }

    /// Do not inject `-P` (used by the login exchange)
    pub fn without_credentials(mut self) -> Self {
        self.inject_credentials = false;
        self
    }

    /// Override the session deadline for this command
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The executable element (`args[0]`)
    pub fn executable(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// Everything after the executable
    pub fn arguments(&self) -> &[String] {
        self.args.get(1..).unwrap_or(&[])
    }

    /// The client sub-command, skipping leading global options
    pub fn subcommand(&self) -> Option<&str> {
        let globals = crate::session::args::leading_globals(&self.args);
        self.args.get(1 + globals.len()).map(String::as_str)
    }

    pub fn input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    pub fn requires_standard_input(&self) -> bool {
        self.input.is_some() || self.builds_from_input
    }

    pub fn builds_from_input(&self) -> bool {
        self.builds_from_input
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn script_mode(&self) -> bool {
        self.script_mode
    }

    pub fn injects_credentials(&self) -> bool {
        self.inject_credentials
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("args", &crate::session::args::redact(&self.args))
            .field("input_bytes", &self.input.as_ref().map(String::len))
            .field("framing", &self.framing)
            .field("script_mode", &self.script_mode)
            .field("builds_from_input", &self.builds_from_input)
            .finish()
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", crate::session::args::redact(&self.args).join(" "))
    }
}
