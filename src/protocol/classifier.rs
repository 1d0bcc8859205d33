//! Script-mode line classification
//!
//! In script mode (`p4 -s`) every output line is framed as `<tag>: <content>`.
//! The classifier tokenizes the tag against a fixed table and maps each line
//! to a [`ResponseEvent`].

use crate::models::{Framing, ResponseEvent};
use crate::process::Origin;

/// Tag → content separator
pub const SEPARATOR: &str = ": ";

/// Error texts the server reports under `error:` that are informational.
///
/// Matched case-insensitively by substring. The server localizes these
/// messages, so the list only holds for English-language servers.
pub const DEFAULT_BENIGN_ERRORS: &[&str] = &[
    "file(s) up-to-date",
    "no file(s) to resolve",
    "no file(s) to reconcile",
    "already up to date",
];

/// Line tags emitted in script mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Error,
    Warning,
    Text,
    /// `info`, `info1`, `info2`: the number is the nesting level
    Info(u8),
    Exit,
}

const TAG_TABLE: &[(&str, Tag)] = &[
    ("error", Tag::Error),
    ("warning", Tag::Warning),
    ("text", Tag::Text),
    ("info", Tag::Info(0)),
    ("info1", Tag::Info(1)),
    ("info2", Tag::Info(2)),
    ("exit", Tag::Exit),
];

impl Tag {
    /// Look a tag name up in the tag table
    pub fn from_name(name: &str) -> Option<Tag> {
        TAG_TABLE
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, tag)| *tag)
    }

    pub fn name(&self) -> &'static str {
        TAG_TABLE
            .iter()
            .find(|(_, tag)| tag == self)
            .map(|(name, _)| *name)
            .unwrap_or("info")
    }
}

/// Split a framed line into its tag and content.
///
/// `info:` with nothing after the colon is accepted as an empty content line.
pub fn split_tag(line: &str) -> Option<(Tag, &str)> {
    let (name, content) = match line.find(SEPARATOR) {
        Some(idx) => (&line[..idx], &line[idx + SEPARATOR.len()..]),
        None => (line.strip_suffix(':')?, ""),
    };
    Tag::from_name(name).map(|tag| (tag, content))
}

/// Turns raw lines into [`ResponseEvent`]s
#[derive(Debug, Clone)]
pub struct LineClassifier {
    framing: Framing,
    benign_errors: Vec<String>,
}

impl LineClassifier {
    /// Create a classifier with the default benign-error list
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            benign_errors: DEFAULT_BENIGN_ERRORS
                .iter()
                .map(|s| s.to_lowercase())
                .collect(),
        }
    }

    /// Replace the benign-error allow-list
    pub fn with_benign_errors<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.benign_errors = patterns
            .into_iter()
            .map(|p| p.as_ref().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        self
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Whether an `error:` content is on the allow-list
    pub fn is_benign(&self, content: &str) -> bool {
        let lowered = content.to_lowercase();
        self.benign_errors.iter().any(|p| lowered.contains(p))
    }

    /// Classify one stdout line
    pub fn classify(&self, line: &str) -> ResponseEvent {
        self.classify_from(line, Origin::Stdout)
    }

    /// Classify one line read from the given stream
    pub fn classify_from(&self, line: &str, origin: Origin) -> ResponseEvent {
        let Some((tag, content)) = split_tag(line) else {
            // Untagged stderr output is how the client reports errors outside script mode
            return match origin {
                Origin::Stderr if !self.is_benign(line) => {
                    ResponseEvent::ErrorLine(line.to_string())
                }
                _ => ResponseEvent::Content(line.to_string()),
            };
        };

        match tag {
            Tag::Exit => match content.trim().parse::<i32>() {
                Ok(code) => ResponseEvent::ExitCode(code),
                Err(_) => ResponseEvent::Content(line.to_string()),
            },
            Tag::Error if !self.is_benign(content) => ResponseEvent::ErrorLine(content.to_string()),
            _ => ResponseEvent::Content(self.frame(line, content)),
        }
    }

    fn frame(&self, line: &str, content: &str) -> String {
        match self.framing {
            Framing::Stripped => content.to_string(),
            Framing::Raw => line.to_string(),
        }
    }
}

impl Default for LineClassifier {
    fn default() -> Self {
        Self::new(Framing::Stripped)
    }
}
