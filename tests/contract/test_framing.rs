//! Contract Tests for Script-Mode Framing
//!
//! Pins down how each tag is classified, in both framing modes.

use p4wire::models::{Framing, ResponseEvent};
use p4wire::process::Origin;
use p4wire::protocol::{split_tag, LineClassifier, Tag};

#[test]
fn test_every_tag_in_the_table() {
    let cases = [
        ("error: x", Some(Tag::Error)),
        ("warning: x", Some(Tag::Warning)),
        ("text: x", Some(Tag::Text)),
        ("info: x", Some(Tag::Info(0))),
        ("info1: x", Some(Tag::Info(1))),
        ("info2: x", Some(Tag::Info(2))),
        ("exit: 0", Some(Tag::Exit)),
        ("info3: x", None),
        ("INFO: x", None),
        ("x", None),
    ];
    for (line, expected) in cases {
        assert_eq!(split_tag(line).map(|(tag, _)| tag), expected, "{}", line);
    }
}

#[test]
fn test_stripped_and_raw_agree_on_content() {
    let stripped = LineClassifier::new(Framing::Stripped);
    let raw = LineClassifier::new(Framing::Raw);
    for line in [
        "info: Change 100 on 2024/01/01 by alice@ws",
        "info1: //depot/a#3 - edit change 7 (text)",
        "text: ... headRev 3",
        "warning: //x/... - no such file(s).",
    ] {
        let (ResponseEvent::Content(s), ResponseEvent::Content(r)) =
            (stripped.classify(line), raw.classify(line))
        else {
            panic!("{} should be content", line);
        };
        assert_eq!(r, line);
        let (_, content) = split_tag(&r).unwrap();
        assert_eq!(s, content);
    }
}

#[test]
fn test_exit_codes() {
    let classifier = LineClassifier::default();
    assert_eq!(classifier.classify("exit: 0"), ResponseEvent::ExitCode(0));
    assert_eq!(classifier.classify("exit: 255"), ResponseEvent::ExitCode(255));
    assert_eq!(classifier.classify("exit: -1"), ResponseEvent::ExitCode(-1));
    assert!(classifier.classify("exit: 0").is_terminal());
}

#[test]
fn test_error_classification_depends_on_allow_list() {
    let classifier = LineClassifier::default();
    assert_eq!(
        classifier.classify("error: File(s) up-to-date."),
        ResponseEvent::Content("File(s) up-to-date.".to_string())
    );
    assert_eq!(
        classifier.classify("error: //ws/x - file(s) not on client."),
        ResponseEvent::ErrorLine("//ws/x - file(s) not on client.".to_string())
    );

    let strict = LineClassifier::default().with_benign_errors(Vec::<String>::new());
    assert!(matches!(
        strict.classify("error: File(s) up-to-date."),
        ResponseEvent::ErrorLine(_)
    ));
}

#[test]
fn test_origin_matters_only_for_untagged_lines() {
    let classifier = LineClassifier::default();
    assert_eq!(
        classifier.classify_from("//depot/main", Origin::Stdout),
        ResponseEvent::Content("//depot/main".to_string())
    );
    assert_eq!(
        classifier.classify_from("Connect to server failed", Origin::Stderr),
        ResponseEvent::ErrorLine("Connect to server failed".to_string())
    );
    assert_eq!(
        classifier.classify_from("exit: 2", Origin::Stderr),
        ResponseEvent::ExitCode(2)
    );
}
