//! Changelist summary lines
//!
//! Parses the one-line summaries printed by `p4 changes`:
//! `Change 100 on 2024/01/01 by alice@ws *pending* 'fix build'`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static CHANGE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Change (\d+) on (\S+) by ([^@\s]+)@(\S+)(?: \*(\w+)\*)?(?: '(.*)')?\s*$")
        .expect("change line pattern is valid")
});

/// One entry of a `changes` listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub number: u64,
    pub date: String,
    pub user: String,
    pub client: String,
    /// `pending` or `shelved`; `None` for submitted changes
    pub status: Option<String>,
    pub description: String,
}

impl ChangeSummary {
    /// Parse a stripped or raw (`info: `-tagged) summary line
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.strip_prefix("info: ").unwrap_or(line);
        let caps = CHANGE_LINE.captures(line)?;
        Some(Self {
            number: caps.get(1)?.as_str().parse().ok()?,
            date: caps.get(2)?.as_str().to_string(),
            user: caps.get(3)?.as_str().to_string(),
            client: caps.get(4)?.as_str().to_string(),
            status: caps.get(5).map(|m| m.as_str().to_string()),
            description: caps
                .get(6)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        })
    }

    pub fn is_pending(&self) -> bool {
        self.status.as_deref() == Some("pending")
    }
}
