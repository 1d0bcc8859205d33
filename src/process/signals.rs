//! Process termination
//!
//! Graceful termination requests. On Unix this sends SIGTERM; elsewhere
//! there is no graceful signal and callers fall back to a hard kill.

use crate::error::{Error, Result};

/// Ask the process to exit. Returns `false` when the platform has no graceful signal.
#[cfg(unix)]
pub fn request_termination(pid: u32) -> Result<bool> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal as NixSignal};
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), NixSignal::SIGTERM) {
        Ok(()) => Ok(true),
        // already gone
        Err(Errno::ESRCH) => Ok(true),
        Err(e) => Err(Error::Io(std::io::Error::from_raw_os_error(e as i32))),
    }
}

#[cfg(not(unix))]
pub fn request_termination(_pid: u32) -> Result<bool> {
    Ok(false)
}
