//! Paginated `changes` queries
//!
//! Pages walk backwards through history with `@<upper>` bounds. When the
//! server refuses a query as too large, the path is split into its child
//! directories plus the files directly below it, and each part is queried
//! on its own.

use std::collections::BTreeMap;

use super::is_overflow;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::models::{ChangeSummary, Command};
use crate::session::CommandRunner;

pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_MAX_DEPTH: usize = 8;

const RECURSIVE_SUFFIX: &str = "/...";

/// Resolves change listings over any [`CommandRunner`]
pub struct PaginatedQueryResolver<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    page_size: usize,
    max_depth: usize,
}

impl<'a, R: CommandRunner + ?Sized> PaginatedQueryResolver<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self {
            runner,
            page_size: DEFAULT_PAGE_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Resolver using the page size and depth cap from `config`
    pub fn configured(runner: &'a R, config: &SessionConfig) -> Self {
        Self::new(runner)
            .with_page_size(config.page_size)
            .with_max_depth(config.max_partition_depth)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Change numbers under `path` at or above `until`, newest first
    pub fn changes(&self, path: &str, until: u64) -> Result<Vec<u64>> {
        Ok(self
            .change_summaries(path, until)?
            .into_iter()
            .map(|change| change.number)
            .collect())
    }

    /// Parsed change summaries under `path` at or above `until`, newest first
    pub fn change_summaries(&self, path: &str, until: u64) -> Result<Vec<ChangeSummary>> {
        let mut found = BTreeMap::new();
        self.collect(path, until, None, 0, &mut found)?;
        debug!("{}: {} changes at or above {}", path, found.len(), until);
        Ok(found.into_values().rev().collect())
    }

    /// Child directories of a `//path/...` spec, as `dirs` reports them
    pub fn partitions(&self, path: &str) -> Result<Vec<String>> {
        let base = path.strip_suffix(RECURSIVE_SUFFIX).unwrap_or(path);
        let command = Command::p4(["dirs".to_string(), format!("{}/*", base)]);
        match self.runner.run(&command) {
            Ok(response) => Ok(response
                .lines()
                .iter()
                .map(|line| line.trim())
                .filter(|line| line.starts_with("//"))
                .map(str::to_string)
                .collect()),
            Err(e) if is_missing_path(&e) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn collect(
        &self,
        path: &str,
        until: u64,
        mut upper: Option<u64>,
        depth: usize,
        found: &mut BTreeMap<u64, ChangeSummary>,
    ) -> Result<()> {
        loop {
            let spec = match upper {
                Some(upper) => format!("{}@{}", path, upper),
                None => path.to_string(),
            };
            let command = Command::p4([
                "changes".to_string(),
                "-m".to_string(),
                self.page_size.to_string(),
                spec,
            ]);

            let response = match self.runner.run(&command) {
                Ok(response) => response,
                Err(e) if is_overflow(&e) => {
                    return self.split(path, until, upper, depth, found);
                }
                Err(e) => return Err(e),
            };

            let page: Vec<ChangeSummary> = response
                .lines()
                .iter()
                .filter_map(|line| ChangeSummary::parse(line))
                .collect();
            let Some(oldest) = page.iter().map(|c| c.number).min() else {
                return Ok(());
            };
            let full_page = page.len() >= self.page_size;
            for change in page {
                if change.number >= until {
                    found.insert(change.number, change);
                }
            }

            if !full_page || oldest <= until || oldest == 0 {
                return Ok(());
            }
            upper = Some(oldest - 1);
        }
    }

    fn split(
        &self,
        path: &str,
        until: u64,
        upper: Option<u64>,
        depth: usize,
        found: &mut BTreeMap<u64, ChangeSummary>,
    ) -> Result<()> {
        if depth >= self.max_depth {
            return Err(Error::PartitionLimit {
                path: path.to_string(),
                depth,
                reason: format!("still too large after {} splits", depth),
            });
        }
        let Some(base) = path.strip_suffix(RECURSIVE_SUFFIX) else {
            return Err(Error::PartitionLimit {
                path: path.to_string(),
                depth,
                reason: "only directory queries can be split".to_string(),
            });
        };

        let children = self.partitions(path)?;
        if children.is_empty() {
            return Err(Error::PartitionLimit {
                path: path.to_string(),
                depth,
                reason: "no subdirectories to split into".to_string(),
            });
        }
        info!(
            "{} is too large, splitting into {} directories",
            path,
            children.len()
        );

        for child in &children {
            self.collect(
                &format!("{}{}", child, RECURSIVE_SUFFIX),
                until,
                upper,
                depth + 1,
                found,
            )?;
        }
        // files directly below the base
        self.collect(&format!("{}/*", base), until, upper, depth + 1, found)
    }
}

fn is_missing_path(error: &Error) -> bool {
    error
        .server_message()
        .map(|m| m.contains("no such file"))
        .unwrap_or(false)
}
