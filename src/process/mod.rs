//! Client Process Management
//!
//! Spawning the client binary, reading its output as lines and tearing it
//! down again. The [`Executor`] trait is the seam the session talks to; the
//! real implementation is [`ProcessExecutor`].

pub mod signals;
pub mod spawn;
pub mod streams;

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::Result;

// Re-exports for convenience
pub use spawn::ProcessExecutor;
pub use streams::{pump_lines, LineRead, LineSender, LineSource, Origin, StdinSink, StreamItem};

/// Exit code reported for a process that was killed by a signal
pub const KILLED_EXIT_CODE: i32 = -1;

/// Starts client processes
pub trait Executor: Send + Sync {
    /// Start `argv[0]` with the remaining arguments and extra environment
    fn spawn(&self, argv: &[String], env: &HashMap<String, String>) -> Result<ProcessIo>;
}

/// Control over a running process; safe to use from any thread
pub trait ProcessHandle: Send + Sync {
    /// Unique identifier for log correlation
    fn id(&self) -> &str;

    fn pid(&self) -> Option<u32>;

    /// Exit code if the process has exited
    fn try_wait(&self) -> Result<Option<i32>>;

    /// Ask the process to exit
    fn terminate(&self) -> Result<()>;

    /// Force the process to exit
    fn kill(&self) -> Result<()>;
}

/// How long [`ProcessIo::close`] waits before forcing termination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosePolicy {
    /// Delay between exit checks
    pub poll_interval: Duration,
    /// Exit checks before asking the process to terminate
    pub wait_attempts: u32,
    /// Time allowed after the terminate request before a hard kill
    pub kill_grace: Duration,
}

impl Default for ClosePolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            wait_attempts: 100, // 5s
            kill_grace: Duration::from_millis(500),
        }
    }
}

/// A spawned process with its I/O
pub struct ProcessIo {
    pub lines: LineSource,
    pub stdin: Option<StdinSink>,
    pub handle: Arc<dyn ProcessHandle>,
}

impl ProcessIo {
    /// Close stdin, abandon the output, then wait for the process to exit.
    ///
    /// Waits in a bounded retry loop; a process still running afterwards is
    /// asked to terminate, then killed. Returns the last exit code observed.
    pub fn close(self, policy: &ClosePolicy) -> Result<i32> {
        let ProcessIo {
            lines,
            stdin,
            handle,
        } = self;
        drop(stdin);
        drop(lines);
        close_handle(handle.as_ref(), policy)
    }
}

impl std::fmt::Debug for ProcessIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessIo")
            .field("id", &self.handle.id())
            .field("pid", &self.handle.pid())
            .field("open_streams", &self.lines.open_streams())
            .finish()
    }
}

/// Wait for exit, escalating to terminate and kill
pub fn close_handle(handle: &dyn ProcessHandle, policy: &ClosePolicy) -> Result<i32> {
    if let Some(code) = wait_for_exit(handle, policy.poll_interval, policy.wait_attempts)? {
        return Ok(code);
    }

    warn!(
        "Process {} did not exit after {:?}, terminating",
        handle.id(),
        policy.poll_interval.saturating_mul(policy.wait_attempts)
    );
    handle.terminate()?;
    let grace_attempts = grace_attempts(policy);
    if let Some(code) = wait_for_exit(handle, policy.poll_interval, grace_attempts)? {
        return Ok(code);
    }

    warn!("Process {} ignored terminate request, killing", handle.id());
    handle.kill()?;
    Ok(wait_for_exit(handle, policy.poll_interval, grace_attempts)?.unwrap_or(KILLED_EXIT_CODE))
}

fn grace_attempts(policy: &ClosePolicy) -> u32 {
    let interval = policy.poll_interval.as_millis().max(1);
    u32::try_from(policy.kill_grace.as_millis() / interval)
        .unwrap_or(u32::MAX)
        .max(1)
}

fn wait_for_exit(
    handle: &dyn ProcessHandle,
    interval: Duration,
    attempts: u32,
) -> Result<Option<i32>> {
    for attempt in 0..=attempts {
        if let Some(code) = handle.try_wait()? {
            return Ok(Some(code));
        }
        if attempt < attempts {
            thread::sleep(interval);
        }
    }
    Ok(None)
}
