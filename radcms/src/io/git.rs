//! Git adapter.
//!
//! A thin wrapper that turns git subcommands into [`ExecRequest`]s for a
//! [`CommandRunner`]. Failures are returned raw; callers attach the step.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::core::types::ExecRequest;
use crate::error::{ExecError, ExecResult};
use crate::io::executor::CommandRunner;

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    /// Path for the changed file.
    pub path: String,
}

/// Git commands scoped to one working copy.
pub struct Git<'a, R: ?Sized> {
    runner: &'a R,
    workdir: &'a Path,
}

impl<'a, R: CommandRunner + ?Sized> Git<'a, R> {
    pub fn new(runner: &'a R, workdir: &'a Path) -> Self {
        Self { runner, workdir }
    }

    /// `git init`. Re-running in an existing repository succeeds.
    #[instrument(skip_all, fields(workdir = %self.workdir.display()))]
    pub fn init(&self) -> ExecResult {
        self.run(&["init"])
    }

    /// Stage everything under the working copy (respects .gitignore).
    pub fn add_all(&self) -> ExecResult {
        self.run(&["add", "."])
    }

    /// Commit staged changes. Fails when nothing is staged.
    #[instrument(skip_all)]
    pub fn commit(&self, message: &str) -> ExecResult {
        debug!("committing staged changes");
        self.run(&["commit", "-m", message])
    }

    /// Raw porcelain status output (already trimmed).
    pub fn status_porcelain(&self) -> ExecResult {
        self.run(&["status", "--porcelain"])
    }

    /// Status entries (including untracked) in porcelain format.
    pub fn status_entries(&self) -> Result<Vec<StatusEntry>, ExecError> {
        let out = self.status_porcelain()?;
        let mut entries = Vec::new();
        for line in out.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_status_line(line) {
                Some(entry) => entries.push(entry),
                None => warn!(line, "skipping unexpected porcelain line"),
            }
        }
        Ok(entries)
    }

    fn run(&self, args: &[&str]) -> ExecResult {
        let request = ExecRequest::git(self.workdir).args(args.iter().copied());
        self.runner.exec(&request)
    }
}

/// Parse one porcelain v1 line.
///
/// The executor trims stdout, so the first line may have lost its leading
/// space (" M a" arrives as "M a"); both shapes are accepted.
fn parse_status_line(line: &str) -> Option<StatusEntry> {
    if let Some(path) = line.strip_prefix("?? ") {
        return Some(StatusEntry {
            code: "??".to_string(),
            path: path.trim().to_string(),
        });
    }
    let (code, rest) = if line.len() >= 3 && line.as_bytes()[2] == b' ' {
        (line.get(..2)?, line.get(3..)?)
    } else if line.len() >= 2 && line.as_bytes()[1] == b' ' {
        (line.get(..1)?, line.get(2..)?)
    } else {
        return None;
    };
    let mut path = rest.trim().to_string();
    if path.is_empty() {
        return None;
    }
    if let Some((_, new)) = path.split_once("->") {
        path = new.trim().to_string();
    }
    Some(StatusEntry {
        code: format!("{code:>2}"),
        path,
    })
}
