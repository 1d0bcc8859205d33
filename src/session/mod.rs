//! Command Sessions
//!
//! One request/response exchange with the client binary: build the argument
//! vector, feed stdin, drain classified output and turn it into a single
//! [`Result<Response>`].

pub mod args;
pub mod auth;
pub mod cancel;
pub mod context;

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{Command, Response, ResponseEvent};
use crate::process::{
    close_handle, ClosePolicy, Executor, LineRead, ProcessExecutor, KILLED_EXIT_CODE,
};
use crate::protocol::{LineClassifier, DEFAULT_BENIGN_ERRORS};

// Re-exports for convenience
pub use auth::{AuthAction, AuthRetryController, AuthState};
pub use cancel::CancelToken;
pub use context::{ConnectionContext, TicketStore};

/// Writes a command's stdin payload
pub type InputWriter<'a> = Box<dyn FnOnce(&mut dyn Write) -> io::Result<()> + 'a>;

/// Anything that can run a [`Command`] to completion
pub trait CommandRunner: Send + Sync {
    /// Run the command; `-i` style commands go through the save path
    fn run(&self, command: &Command) -> Result<Response>;
}

/// Executes commands against one connection
#[derive(Clone)]
pub struct CommandSession {
    executor: Arc<dyn Executor>,
    context: Arc<ConnectionContext>,
    benign_errors: Vec<String>,
    close_policy: ClosePolicy,
}

impl CommandSession {
    pub fn new(executor: Arc<dyn Executor>, context: Arc<ConnectionContext>) -> Self {
        Self {
            executor,
            context,
            benign_errors: DEFAULT_BENIGN_ERRORS.iter().map(|s| s.to_string()).collect(),
            close_policy: ClosePolicy::default(),
        }
    }

    /// Session over real client processes, configured from `config`
    pub fn from_config(config: &Config) -> Self {
        let executor = ProcessExecutor::new().inherit_env(config.session.inherit_env);
        Self::new(
            Arc::new(executor),
            Arc::new(ConnectionContext::from_config(config)),
        )
        .with_benign_errors(config.session.benign_errors.iter().cloned())
        .with_close_policy(config.session.close_policy())
    }

    /// Replace the benign `error:` allow-list
    pub fn with_benign_errors<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.benign_errors = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_close_policy(mut self, policy: ClosePolicy) -> Self {
        self.close_policy = policy;
        self
    }

    pub fn context(&self) -> &Arc<ConnectionContext> {
        &self.context
    }

    /// Run a command, writing its attached payload (if any) to stdin
    pub fn execute(&self, command: &Command) -> Result<Response> {
        self.run_session(command, None, None)
    }

    /// Run a command that `token` can cancel from another thread
    pub fn execute_cancellable(&self, command: &Command, token: &CancelToken) -> Result<Response> {
        if command.builds_from_input() {
            return self.save_cancellable(command, token);
        }
        self.run_session(command, None, Some(token))
    }

    /// Run a command whose stdin is produced by `writer`
    pub fn execute_with_input<F>(&self, command: &Command, writer: F) -> Result<Response>
    where
        F: FnOnce(&mut dyn Write) -> io::Result<()>,
    {
        self.run_session(command, Some(Box::new(writer)), None)
    }

    /// Send a spec on stdin (`p4 <type> -i`).
    ///
    /// A rejected save carries the command line and the payload that was
    /// sent. A save that runs past its deadline yields an empty response
    /// flagged as timed out.
    pub fn save(&self, command: &Command) -> Result<Response> {
        let command = as_save(command);
        let transcript = command.input().unwrap_or_default().to_string();
        self.run_session(&command, None, None)
            .map_err(|e| into_save_failure(e, transcript))
    }

    /// Like [`save`](Self::save) with the payload produced by `writer`
    pub fn save_with<F>(&self, command: &Command, writer: F) -> Result<Response>
    where
        F: FnOnce(&mut dyn Write) -> io::Result<()>,
    {
        let command = as_save(command);
        let mut recorded = Vec::new();
        let result = self.run_session(
            &command,
            Some(Box::new(|w: &mut dyn Write| {
                let mut tee = Tee {
                    inner: w,
                    copy: &mut recorded,
                };
                writer(&mut tee)
            })),
            None,
        );
        result.map_err(|e| into_save_failure(e, String::from_utf8_lossy(&recorded).into_owned()))
    }

    fn save_cancellable(&self, command: &Command, token: &CancelToken) -> Result<Response> {
        let command = as_save(command);
        let transcript = command.input().unwrap_or_default().to_string();
        self.run_session(&command, None, Some(token))
            .map_err(|e| into_save_failure(e, transcript))
    }

    fn run_session(
        &self,
        command: &Command,
        writer: Option<InputWriter<'_>>,
        cancel: Option<&CancelToken>,
    ) -> Result<Response> {
        if command.args().is_empty() {
            return Err(Error::EmptyCommand);
        }

        let argv = args::build_argv(command, &self.context);
        let shown = args::display(&argv);
        let timeout = command.timeout().unwrap_or(self.context.timeout);
        debug!("Executing: {}", shown);

        let io = self
            .executor
            .spawn(&argv, &self.context.environment)
            .map_err(|e| match e {
                Error::Transport { reason, .. } => Error::Transport {
                    command: shown.clone(),
                    reason,
                },
                other => other,
            })?;

        let handle = io.handle.clone();
        if let Some(token) = cancel {
            if !token.register(handle.clone()) {
                drop(io);
                self.finish(handle.as_ref(), &shown);
                return Err(Error::Cancelled { command: shown });
            }
        }

        let mut lines = io.lines;
        let write_error = match (io.stdin, writer, command.input()) {
            (Some(sink), Some(writer), _) => sink.deliver(|w| writer(w)).err(),
            (Some(sink), None, Some(payload)) => sink
                .deliver(|w| {
                    w.write_all(payload.as_bytes())?;
                    if !payload.ends_with('\n') {
                        w.write_all(b"\n")?;
                    }
                    Ok(())
                })
                .err(),
            (Some(sink), None, None) => {
                // closing stdin right away stops the client waiting on it
                drop(sink);
                None
            }
            (None, writer, payload) if writer.is_some() || payload.is_some() => Some(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "stdin is not available",
            )),
            (None, _, _) => None,
        };
        if let Some(e) = &write_error {
            warn!("Failed to write input for {}: {}", shown, e);
        }

        let classifier = LineClassifier::new(command.framing())
            .with_benign_errors(self.benign_errors.iter());
        let deadline = Instant::now() + timeout;
        let mut content = Vec::new();
        let mut errors = Vec::new();
        let mut exit_line = None;
        let mut saw_output = false;
        let mut timed_out = false;

        loop {
            match lines.recv_until(deadline) {
                LineRead::Line { origin, text } => {
                    saw_output = true;
                    match classifier.classify_from(&text, origin) {
                        ResponseEvent::Content(line) => content.push(line),
                        ResponseEvent::ErrorLine(line) => errors.push(line),
                        ResponseEvent::ExitCode(code) => {
                            exit_line = Some(code);
                            break;
                        }
                        ResponseEvent::EndOfStream => break,
                    }
                }
                LineRead::EndOfStream => break,
                LineRead::TimedOut => {
                    timed_out = true;
                    break;
                }
            }
        }
        drop(lines);

        let still_running = timed_out && matches!(handle.try_wait(), Ok(None));
        if timed_out {
            warn!("{} did not finish within {:?}, terminating", shown, timeout);
            if let Err(e) = handle.terminate() {
                warn!("Failed to terminate {}: {}", shown, e);
            }
        }
        let process_code = self.finish(handle.as_ref(), &shown);
        if let Some(token) = cancel {
            token.unregister();
            if token.is_cancelled() {
                return Err(Error::Cancelled { command: shown });
            }
        }

        trace!(
            "{}: {} content, {} error lines, exit line {:?}, process exit {:?}",
            shown,
            content.len(),
            errors.len(),
            exit_line,
            process_code
        );

        if timed_out {
            if command.builds_from_input() {
                return Ok(Response::timed_out());
            }
            return Err(Error::Timeout {
                command: shown,
                duration: timeout,
                still_running,
            });
        }

        let Some(exit_code) = exit_line.or(process_code) else {
            return Err(Error::Protocol {
                command: shown,
                message: "exit status unknown".to_string(),
                exit_code: KILLED_EXIT_CODE,
            });
        };
        let outcome = outcome(&shown, content, errors, exit_code, saw_output);
        match (outcome, write_error) {
            (Ok(_), Some(e)) => Err(Error::InputWriteFailed {
                command: shown,
                reason: e.to_string(),
            }),
            (outcome, _) => outcome,
        }
    }

    /// Wait for the process to go away; `None` when the exit code is unknown
    fn finish(&self, handle: &dyn crate::process::ProcessHandle, shown: &str) -> Option<i32> {
        match close_handle(handle, &self.close_policy) {
            Ok(code) => Some(code),
            Err(e) => {
                warn!("Failed to close {}: {}", shown, e);
                None
            }
        }
    }
}

impl CommandRunner for CommandSession {
    fn run(&self, command: &Command) -> Result<Response> {
        if command.builds_from_input() {
            self.save(command)
        } else {
            self.execute(command)
        }
    }
}

impl std::fmt::Debug for CommandSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSession")
            .field("context", &self.context)
            .field("benign_errors", &self.benign_errors)
            .field("close_policy", &self.close_policy)
            .finish()
    }
}

/// Turn drained output into the session result
fn outcome(
    shown: &str,
    content: Vec<String>,
    errors: Vec<String>,
    exit_code: i32,
    saw_output: bool,
) -> Result<Response> {
    if !errors.is_empty() {
        return Err(Error::Protocol {
            command: shown.to_string(),
            message: errors.join("\n"),
            exit_code,
        });
    }
    if exit_code != 0 {
        let message = match content.last() {
            Some(last) => format!("exited with code {}: {}", exit_code, last),
            None => format!("exited with code {}", exit_code),
        };
        return Err(Error::Protocol {
            command: shown.to_string(),
            message,
            exit_code,
        });
    }
    if !saw_output {
        return Err(Error::Protocol {
            command: shown.to_string(),
            message: format!("no output for command {}", shown),
            exit_code,
        });
    }
    Ok(Response::new(content, exit_code))
}

fn as_save(command: &Command) -> Command {
    if command.builds_from_input() {
        command.clone()
    } else {
        command.clone().from_input()
    }
}

fn into_save_failure(error: Error, input: String) -> Error {
    match error {
        Error::Protocol {
            command, message, ..
        } => Error::SaveFailed {
            command,
            message,
            input,
        },
        other => other,
    }
}

/// Forwards writes and keeps a copy for the save transcript
struct Tee<'a> {
    inner: &'a mut dyn Write,
    copy: &'a mut Vec<u8>,
}

impl Write for Tee<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.copy.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
