//! Test Fixtures
//!
//! Connection contexts and sessions wired to a scripted executor.

use super::ScriptedExecutor;
use p4wire::process::ClosePolicy;
use p4wire::{AuthRetryController, CommandSession, ConnectionContext};
use std::sync::Arc;
use std::time::Duration;

/// Context with every connection field set
pub fn create_test_context() -> ConnectionContext {
    ConnectionContext::new("/usr/local/bin/p4")
        .with_server("perforce:1666")
        .with_user("alice")
        .with_client("alice-ws")
        .with_password("hunter2")
        .with_timeout(Duration::from_secs(2))
}

/// Close policy that gives up quickly
pub fn quick_close_policy() -> ClosePolicy {
    ClosePolicy {
        poll_interval: Duration::from_millis(1),
        wait_attempts: 5,
        kill_grace: Duration::from_millis(5),
    }
}

pub fn create_test_session(executor: &Arc<ScriptedExecutor>) -> CommandSession {
    create_session_with(executor, create_test_context())
}

pub fn create_session_with(
    executor: &Arc<ScriptedExecutor>,
    context: ConnectionContext,
) -> CommandSession {
    CommandSession::new(executor.clone(), Arc::new(context)).with_close_policy(quick_close_policy())
}

pub fn create_test_controller(executor: &Arc<ScriptedExecutor>) -> AuthRetryController {
    AuthRetryController::new(create_test_session(executor))
}
