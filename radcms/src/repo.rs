//! Repository lifecycle: init, publish, fetch and status for a working copy.
//!
//! Every operation is a fixed, strictly sequential list of process calls.
//! Failures come back tagged with the [`Step`] that produced them so the
//! orchestrator can tell a recoverable sync failure from a failed commit.

use std::path::Path;

use tracing::{info, instrument, warn};

use crate::core::classifier::FailureClass;
use crate::core::types::{Step, is_dirty};
use crate::error::{Result, StepExt};
use crate::io::executor::CommandRunner;
use crate::io::git::{Git, StatusEntry};
use crate::io::rad::Rad;

pub struct RepoLifecycle<'a, R: ?Sized> {
    runner: &'a R,
}

impl<'a, R: CommandRunner + ?Sized> RepoLifecycle<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self { runner }
    }

    /// `git init` then `rad init --private --no-confirm`.
    ///
    /// A step that reports "already initialized" is logged and skipped; any
    /// other failure stops the sequence and is returned.
    #[instrument(skip_all, fields(cwd = %cwd.display()))]
    pub fn init(&self, cwd: &Path) -> Result<()> {
        tolerate_existing(Git::new(self.runner, cwd).init().at(Step::VcsInit))?;
        tolerate_existing(Rad::new(self.runner).init_project(cwd).at(Step::PeerInit))?;
        info!("working copy initialized");
        Ok(())
    }

    /// Stage everything, commit with `message`, then sync with the network.
    #[instrument(skip_all, fields(cwd = %cwd.display()))]
    pub fn publish(&self, cwd: &Path, message: &str) -> Result<()> {
        let git = Git::new(self.runner, cwd);
        git.add_all().at(Step::Stage)?;
        git.commit(message).at(Step::Commit)?;
        self.sync(cwd)
    }

    /// The final step of [`publish`](Self::publish) on its own.
    pub fn sync(&self, cwd: &Path) -> Result<()> {
        Rad::new(self.runner).sync(cwd).at(Step::Sync)?;
        Ok(())
    }

    #[instrument(skip_all, fields(cwd = %cwd.display()))]
    pub fn fetch(&self, cwd: &Path) -> Result<()> {
        Rad::new(self.runner).sync_fetch(cwd).at(Step::Fetch)?;
        Ok(())
    }

    /// True when the working copy has uncommitted changes.
    ///
    /// A failed status query is an error, never "clean".
    pub fn status(&self, cwd: &Path) -> Result<bool> {
        let out = Git::new(self.runner, cwd)
            .status_porcelain()
            .at(Step::Status)?;
        Ok(is_dirty(&out))
    }

    pub fn changes(&self, cwd: &Path) -> Result<Vec<StatusEntry>> {
        Git::new(self.runner, cwd)
            .status_entries()
            .at(Step::Status)
    }
}

fn tolerate_existing(result: Result<String>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(err) if err.failure_class() == FailureClass::AlreadyInitialized => {
            warn!(step = ?err.step(), err = %err, "already initialized, continuing");
            Ok(())
        }
        Err(err) => Err(err),
    }
}
