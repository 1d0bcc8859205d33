//! Integration Tests for Real Client Processes
//!
//! Runs `/bin/sh` in place of the client binary so the reader threads, stdin
//! delivery and process teardown are exercised against the operating system.

#![cfg(unix)]

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use p4wire::error::Error;
use p4wire::process::{ClosePolicy, Executor, LineRead, Origin, ProcessExecutor};
use p4wire::{CancelToken, Command, CommandSession, ConnectionContext};

const SHELL: &str = "/bin/sh";

/// Session whose "client" is the shell; no connection flags get injected
fn shell_session() -> CommandSession {
    let context = ConnectionContext::new(SHELL).with_timeout(Duration::from_secs(5));
    CommandSession::new(Arc::new(ProcessExecutor::new()), Arc::new(context)).with_close_policy(
        ClosePolicy {
            poll_interval: Duration::from_millis(10),
            wait_attempts: 50,
            kill_grace: Duration::from_millis(200),
        },
    )
}

fn script(body: &str) -> Command {
    Command::p4(["-c", body]).unframed()
}

#[test]
fn test_script_mode_output_from_process() {
    let session = shell_session();
    let response = session
        .execute(&script(
            "echo 'info: Change 100 on 2024/01/01 by alice@ws'; echo 'exit: 0'",
        ))
        .unwrap();
    assert_eq!(response.lines(), ["Change 100 on 2024/01/01 by alice@ws"]);
    assert_eq!(response.exit_code(), 0);
}

#[test]
fn test_process_exit_code_without_exit_line() {
    let session = shell_session();
    let err = session
        .execute(&script("echo 'info: partial'; exit 4"))
        .unwrap_err();
    assert!(matches!(err, Error::Protocol { exit_code: 4, .. }));
}

#[test]
fn test_stderr_is_classified() {
    let session = shell_session();
    let err = session
        .execute(&script("echo 'Perforce client error:' >&2; exit 1"))
        .unwrap_err();
    assert_eq!(err.server_message(), Some("Perforce client error:"));
}

#[test]
fn test_stdin_is_delivered_before_reading() {
    let session = shell_session();
    let response = session
        .execute_with_input(
            &script("read pw; echo \"info: got $pw\"; echo 'exit: 0'"),
            |w: &mut dyn Write| w.write_all(b"hunter2\n"),
        )
        .unwrap();
    assert_eq!(response.lines(), ["got hunter2"]);
}

#[test]
fn test_silent_process_is_an_error() {
    let session = shell_session();
    let err = session.execute(&script("true")).unwrap_err();
    assert!(err.to_string().contains("no output for command"));
}

#[test]
fn test_timeout_kills_process() {
    let session = shell_session();
    let started = Instant::now();
    let command = script("exec sleep 30").with_timeout(Duration::from_millis(200));
    match session.execute(&command) {
        Err(Error::Timeout { still_running, .. }) => assert!(still_running),
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_cancel_unblocks_reader() {
    let session = shell_session();
    let token = CancelToken::new();
    let canceller = {
        let token = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            token.cancel();
        })
    };

    let started = Instant::now();
    let result = session.execute_cancellable(&script("exec sleep 30"), &token);
    canceller.join().unwrap();
    assert!(matches!(result, Err(Error::Cancelled { .. })));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_missing_binary_is_transport_error() {
    let context = ConnectionContext::new("/nonexistent/bin/p4");
    let session = CommandSession::new(Arc::new(ProcessExecutor::new()), Arc::new(context));
    let err = session.execute(&Command::p4(["info"])).unwrap_err();
    assert!(err.is_transport());
    assert!(err.to_string().contains("/nonexistent/bin/p4"));
}

#[test]
fn test_executor_reports_both_streams() {
    let executor = ProcessExecutor::new();
    let argv: Vec<String> = [SHELL, "-c", "echo out; echo err >&2"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut io = executor.spawn(&argv, &HashMap::new()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut seen = Vec::new();
    while let LineRead::Line { origin, text } = io.lines.recv_until(deadline) {
        seen.push((origin, text));
    }
    seen.sort_by_key(|(origin, _)| *origin == Origin::Stderr);
    assert_eq!(
        seen,
        vec![
            (Origin::Stdout, "out".to_string()),
            (Origin::Stderr, "err".to_string())
        ]
    );
    assert_eq!(io.close(&ClosePolicy::default()).unwrap(), 0);
}

#[test]
fn test_extra_environment_reaches_process() {
    let context = ConnectionContext::new(SHELL).with_env("P4WIRE_TEST_VALUE", "from-context");
    let session = CommandSession::new(Arc::new(ProcessExecutor::new()), Arc::new(context));
    let response = session
        .execute(&script("echo \"info: $P4WIRE_TEST_VALUE\"; echo 'exit: 0'"))
        .unwrap();
    assert_eq!(response.lines(), ["from-context"]);
}
