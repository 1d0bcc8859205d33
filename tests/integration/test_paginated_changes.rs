//! Integration Tests for Paginated Change Queries
//!
//! The resolver running over a real command session with scripted server
//! answers, including oversized queries that must be partitioned.

#[path = "../test_utils/mod.rs"]
mod test_utils;

use p4wire::error::Error;
use p4wire::{AuthRetryController, PaginatedQueryResolver};
use test_utils::*;

fn change(id: u64) -> String {
    format!("info: Change {} on 2024/01/01 by alice@ws 'change {}'", id, id)
}

fn changes_reply(ids: &[u64]) -> Reply {
    let mut lines: Vec<String> = ids.iter().map(|id| change(*id)).collect();
    lines.push("exit: 0".to_string());
    Reply {
        stdout: lines,
        ..Reply::default()
    }
}

fn too_large() -> Reply {
    Reply::error("Request too large (over 100000); see 'p4 help maxresults'.")
}

#[test]
fn test_overflow_is_partitioned_and_merged() {
    let executor = ScriptedExecutor::new();
    executor
        .on_last_arg("//proj/...", vec![too_large()])
        .on_subcommand("dirs", vec![Reply::info(&["//proj/a", "//proj/b"])])
        .on_last_arg("//proj/a/...", vec![changes_reply(&[50, 40])])
        .on_last_arg("//proj/b/...", vec![changes_reply(&[45, 30])])
        .on_last_arg("//proj/*", vec![Reply::lines(&["exit: 0"])]);
    let session = create_test_session(&executor);

    let resolver = PaginatedQueryResolver::new(&session);
    assert_eq!(resolver.changes("//proj/...", 35).unwrap(), vec![50, 45, 40]);

    let queried: Vec<String> = executor
        .calls()
        .iter()
        .map(|c| c.sub_args().join(" "))
        .collect();
    assert_eq!(
        queried,
        vec![
            "-m 100 //proj/...",
            "//proj/*",
            "-m 100 //proj/a/...",
            "-m 100 //proj/b/...",
            "-m 100 //proj/*",
        ]
    );
}

#[test]
fn test_overlapping_partitions_are_deduplicated() {
    let executor = ScriptedExecutor::new();
    executor
        .on_last_arg("//proj/...", vec![too_large()])
        .on_subcommand("dirs", vec![Reply::info(&["//proj/a", "//proj/b"])])
        .on_last_arg("//proj/a/...", vec![changes_reply(&[60, 55])])
        .on_last_arg("//proj/b/...", vec![changes_reply(&[60, 52])])
        .on_last_arg("//proj/*", vec![changes_reply(&[58])]);
    let session = create_test_session(&executor);

    let summaries = PaginatedQueryResolver::new(&session)
        .change_summaries("//proj/...", 0)
        .unwrap();
    let ids: Vec<u64> = summaries.iter().map(|c| c.number).collect();
    assert_eq!(ids, vec![60, 58, 55, 52]);
    assert_eq!(summaries[0].description, "change 60");
}

#[test]
fn test_paging_uses_upper_bound() {
    let executor = ScriptedExecutor::new();
    executor
        .on_last_arg("//depot/...", vec![changes_reply(&[30, 29])])
        .on_last_arg("//depot/...@28", vec![changes_reply(&[28, 27])])
        .on_last_arg("//depot/...@26", vec![changes_reply(&[26])]);
    let session = create_test_session(&executor);

    let resolver = PaginatedQueryResolver::new(&session).with_page_size(2);
    assert_eq!(
        resolver.changes("//depot/...", 0).unwrap(),
        vec![30, 29, 28, 27, 26]
    );
    assert_eq!(executor.call_count(), 3);
}

#[test]
fn test_overflow_without_partitions_is_fatal() {
    let executor = ScriptedExecutor::new();
    executor
        .on_last_arg("//flat/...", vec![too_large()])
        .on_subcommand(
            "dirs",
            vec![Reply::error("//flat/* - no such file(s).")],
        );
    let session = create_test_session(&executor);

    match PaginatedQueryResolver::new(&session).changes("//flat/...", 0) {
        Err(Error::PartitionLimit { path, depth, .. }) => {
            assert_eq!(path, "//flat/...");
            assert_eq!(depth, 0);
        }
        other => panic!("expected partition limit, got {:?}", other),
    }
}

#[test]
fn test_other_errors_propagate() {
    let executor = ScriptedExecutor::new();
    executor.always(Reply::error("//nowhere/... - must refer to client 'alice-ws'."));
    let session = create_test_session(&executor);

    let err = PaginatedQueryResolver::new(&session)
        .changes("//nowhere/...", 0)
        .unwrap_err();
    assert!(matches!(err, Error::Protocol { .. }));
    assert_eq!(executor.call_count(), 1);
}

#[test]
fn test_resolver_over_auth_controller() {
    let executor = ScriptedExecutor::new();
    executor
        .on_subcommand("login", vec![Reply::info(&["TICKET0001"])])
        .on_subcommand(
            "changes",
            vec![
                Reply::error("Your session has expired, please login again."),
                changes_reply(&[12, 11]),
            ],
        );
    let controller: AuthRetryController = create_test_controller(&executor);

    let resolver = PaginatedQueryResolver::new(&controller);
    assert_eq!(resolver.changes("//depot/...", 0).unwrap(), vec![12, 11]);
    assert_eq!(executor.subcommands(), vec!["changes", "login", "changes"]);
}
