//! Contract Tests for Authentication Retry
//!
//! The re-login contract: which failures trigger a login, how the login
//! exchange looks on the wire, and that a command is retried at most once.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use p4wire::error::Error;
use p4wire::session::auth::{match_signature, AuthAction, AUTH_SIGNATURES};
use p4wire::{AuthRetryController, Command, ConnectionContext};
use test_utils::*;

const EXPIRED: &str = "Your session has expired, please login again.";

#[test]
fn test_expired_session_logs_in_and_retries_once() {
    let executor = ScriptedExecutor::new();
    executor
        .on_subcommand("login", vec![Reply::info(&["Enter password: ", "A1B2C3D4E5"])])
        .on_subcommand(
            "opened",
            vec![Reply::error(EXPIRED), Reply::info(&["//depot/a#1 - edit"])],
        );
    let controller = create_test_controller(&executor);

    let response = controller.execute(&Command::p4(["opened"])).unwrap();
    assert_eq!(response.lines(), ["//depot/a#1 - edit"]);
    assert_eq!(executor.subcommands(), vec!["opened", "login", "opened"]);

    let calls = executor.calls();
    // the retry carries the fresh ticket
    let retry = &calls[2].argv;
    let pos = retry.iter().position(|a| a == "-P").unwrap();
    assert_eq!(retry[pos + 1], "A1B2C3D4E5");
    assert_eq!(
        controller
            .session()
            .context()
            .tickets
            .get()
            .unwrap()
            .expose(),
        "A1B2C3D4E5"
    );
}

#[test]
fn test_login_exchange_on_the_wire() {
    let executor = ScriptedExecutor::new();
    executor.on_subcommand("login", vec![Reply::info(&["TICKET"])]);
    let controller = create_test_controller(&executor);

    let ticket = controller.login().unwrap();
    assert_eq!(ticket.expose(), "TICKET");

    let call = &executor.calls()[0];
    assert_eq!(call.sub_args(), vec!["-a", "-p"]);
    assert!(!call.argv.contains(&"-P".to_string()));
    assert!(call.argv.contains(&"-s".to_string()));
    let port = call.argv.iter().position(|a| a == "-p").unwrap();
    assert_eq!(call.argv[port + 1], "perforce:1666");
    let user = call.argv.iter().position(|a| a == "-u").unwrap();
    assert_eq!(call.argv[user + 1], "alice");
    assert_eq!(call.stdin_text(), "hunter2\n");
}

#[test]
fn test_second_auth_failure_is_fatal() {
    let executor = ScriptedExecutor::new();
    executor
        .on_subcommand("login", vec![Reply::info(&["TICKET"])])
        .on_subcommand("info", vec![Reply::error(EXPIRED)]);
    let controller = create_test_controller(&executor);

    match controller.execute(&Command::p4(["info"])) {
        Err(Error::AuthenticationFailed { user, reason }) => {
            assert_eq!(user, "alice");
            assert!(reason.contains("Your session has expired"));
        }
        other => panic!("expected authentication failure, got {:?}", other),
    }
    assert_eq!(executor.subcommands(), vec!["info", "login", "info"]);
}

#[test]
fn test_failed_login_is_authentication_failure() {
    let executor = ScriptedExecutor::new();
    executor
        .on_subcommand("login", vec![Reply::error("Password invalid.")])
        .on_subcommand("info", vec![Reply::error(EXPIRED)]);
    let controller = create_test_controller(&executor);

    assert!(matches!(
        controller.execute(&Command::p4(["info"])),
        Err(Error::AuthenticationFailed { .. })
    ));
    assert_eq!(executor.subcommands(), vec!["info", "login"]);
}

#[test]
fn test_login_without_password() {
    let executor = ScriptedExecutor::new();
    executor.on_subcommand("info", vec![Reply::error(EXPIRED)]);
    let context = ConnectionContext::new("p4").with_user("bob");
    let controller = AuthRetryController::new(create_session_with(&executor, context));

    match controller.execute(&Command::p4(["info"])) {
        Err(Error::AuthenticationFailed { user, reason }) => {
            assert_eq!(user, "bob");
            assert!(reason.contains("no password"));
        }
        other => panic!("expected authentication failure, got {:?}", other),
    }
    assert_eq!(executor.call_count(), 1);
}

#[test]
fn test_license_quota_is_never_retried() {
    let executor = ScriptedExecutor::new();
    executor.on_subcommand(
        "sync",
        vec![Reply::error("User alice over license quota.")],
    );
    let controller = create_test_controller(&executor);

    assert!(matches!(
        controller.execute(&Command::p4(["sync"])),
        Err(Error::LicenseQuota { .. })
    ));
    assert_eq!(executor.call_count(), 1);
}

#[test]
fn test_other_failures_are_not_retried() {
    let executor = ScriptedExecutor::new();
    executor.on_subcommand("files", vec![Reply::error("//x/... - no such file(s).")]);
    let controller = create_test_controller(&executor);

    assert!(matches!(
        controller.execute(&Command::p4(["files", "//x/..."])),
        Err(Error::Protocol { .. })
    ));
    assert_eq!(executor.call_count(), 1);
}

#[test]
fn test_save_retries_with_transcript_intact() {
    let executor = ScriptedExecutor::new();
    executor
        .on_subcommand("login", vec![Reply::info(&["TICKET"])])
        .on_subcommand(
            "client",
            vec![
                Reply::error("Perforce password (P4PASSWD) invalid or unset."),
                Reply::info(&["Client alice-ws saved."]),
            ],
        );
    let controller = create_test_controller(&executor);

    let spec = "Client: alice-ws\n";
    controller
        .save(&Command::p4(["client", "-i"]).with_input(spec))
        .unwrap();

    let calls = executor.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].stdin_text(), spec);
    assert_eq!(calls[2].stdin_text(), spec);
}

#[test]
fn test_every_signature_is_recognized() {
    for signature in AUTH_SIGNATURES {
        let message = format!("prefix {} suffix", signature.pattern);
        let found = match_signature(&message).unwrap();
        assert_eq!(found.action, signature.action, "{}", signature.condition);
    }
    let relogin = AUTH_SIGNATURES
        .iter()
        .filter(|s| s.action == AuthAction::Relogin)
        .count();
    assert_eq!(relogin, 6);
}
