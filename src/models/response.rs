//! Response Model
//!
//! Per-line events produced by the classifier and the aggregated result
//! of one command session.

use serde::{Deserialize, Serialize};

/// One classified output line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseEvent {
    /// Informational or data line
    Content(String),
    /// Error reported by the server
    ErrorLine(String),
    /// Trailing `exit: <n>` line
    ExitCode(i32),
    /// The output stream closed
    EndOfStream,
}

impl ResponseEvent {
    /// Whether this event ends the session
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResponseEvent::ExitCode(_) | ResponseEvent::EndOfStream)
    }
}

/// Successful outcome of a command session
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Response {
    lines: Vec<String>,
    exit_code: i32,
    timed_out: bool,
}

impl Response {
    pub fn new(lines: Vec<String>, exit_code: i32) -> Self {
        Self {
            lines,
            exit_code,
            timed_out: false,
        }
    }

    /// Empty result of a save whose deadline expired; nothing is known to have happened
    pub fn timed_out() -> Self {
        Self {
            lines: Vec::new(),
            exit_code: 0,
            timed_out: true,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn is_timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn last_line(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }
}
