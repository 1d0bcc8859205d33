//! Client Process Spawning
//!
//! Starts the client with piped stdio. stdout and stderr each get a reader
//! thread feeding the same [`LineSource`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Child, Command as OsCommand, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use super::signals::request_termination;
use super::streams::{pump_lines, LineSource, Origin, StdinSink};
use super::{Executor, ProcessHandle, ProcessIo, KILLED_EXIT_CODE};
use crate::error::{Error, Result};

/// Spawns real OS processes
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    /// Working directory for spawned processes
    working_directory: Option<PathBuf>,
    /// Whether to inherit the parent environment
    inherit_env: bool,
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self {
            working_directory: None,
            inherit_env: true,
        }
    }

    pub fn with_working_directory(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_directory = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn inherit_env(mut self, inherit: bool) -> Self {
        self.inherit_env = inherit;
        self
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for ProcessExecutor {
    fn spawn(&self, argv: &[String], env: &HashMap<String, String>) -> Result<ProcessIo> {
        let (program, args) = argv.split_first().ok_or(Error::EmptyCommand)?;

        let mut command = OsCommand::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if !self.inherit_env {
            command.env_clear();
        }
        command.envs(env);
        if let Some(dir) = &self.working_directory {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| Error::Transport {
            command: program.clone(),
            reason: e.to_string(),
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stdin = child.stdin.take().map(StdinSink::new);
        let handle = Arc::new(ChildHandle::new(child));

        let (Some(stdout), Some(stderr)) = (stdout, stderr) else {
            let _ = handle.kill();
            return Err(Error::Transport {
                command: program.clone(),
                reason: "output pipes were not created".to_string(),
            });
        };

        let (tx, lines) = LineSource::channel(2);
        let pumps = pump_lines(stdout, Origin::Stdout, tx.clone())
            .and_then(|_| pump_lines(stderr, Origin::Stderr, tx));
        if let Err(e) = pumps {
            let _ = handle.kill();
            return Err(Error::Transport {
                command: program.clone(),
                reason: format!("failed to start reader thread: {}", e),
            });
        }

        debug!(
            "Spawned {} (pid {:?}, id {})",
            program,
            handle.pid(),
            handle.id()
        );

        Ok(ProcessIo {
            lines,
            stdin,
            handle,
        })
    }
}

/// [`ProcessHandle`] over a `std::process::Child`
#[derive(Debug)]
pub struct ChildHandle {
    id: String,
    pid: u32,
    child: Mutex<Child>,
}

impl ChildHandle {
    fn new(child: Child) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            pid: child.id(),
            child: Mutex::new(child),
        }
    }

    fn child(&self) -> MutexGuard<'_, Child> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProcessHandle for ChildHandle {
    fn id(&self) -> &str {
        &self.id
    }

    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn try_wait(&self) -> Result<Option<i32>> {
        let status = self.child().try_wait()?;
        Ok(status.map(|s| s.code().unwrap_or(KILLED_EXIT_CODE)))
    }

    fn terminate(&self) -> Result<()> {
        if self.try_wait()?.is_some() {
            return Ok(());
        }
        if !request_termination(self.pid)? {
            return self.kill();
        }
        Ok(())
    }

    fn kill(&self) -> Result<()> {
        match self.child().kill() {
            Ok(()) => Ok(()),
            // already reaped
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
