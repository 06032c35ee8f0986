//! Radicle (`rad`) adapter.

use std::path::Path;
use std::time::Duration;

use tracing::instrument;

use crate::core::types::ExecRequest;
use crate::error::{ExecError, ExecResult};
use crate::io::executor::CommandRunner;

/// Passphrase variable read by `rad auth`; left empty for unattended use.
pub const PASSPHRASE_VAR: &str = "RAD_PASSPHRASE";

pub struct Rad<'a, R: ?Sized> {
    runner: &'a R,
}

impl<'a, R: CommandRunner + ?Sized> Rad<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self { runner }
    }

    /// Register the working copy as a private project without prompting.
    #[instrument(skip_all, fields(cwd = %cwd.display()))]
    pub fn init_project(&self, cwd: &Path) -> ExecResult {
        self.runner.exec(&request(cwd, &["init", "--private", "--no-confirm"]))
    }

    pub fn sync(&self, cwd: &Path) -> ExecResult {
        self.runner.exec(&request(cwd, &["sync"]))
    }

    pub fn sync_fetch(&self, cwd: &Path) -> ExecResult {
        self.runner.exec(&request(cwd, &["sync", "--fetch"]))
    }

    /// Current identity (`rad self`).
    pub fn self_identity(&self, profile_home: &Path) -> ExecResult {
        self.runner.exec(&request(profile_home, &["self"]))
    }

    /// Create a new identity with an empty passphrase.
    #[instrument(skip_all, fields(alias = %alias))]
    pub fn auth(&self, profile_home: &Path, alias: &str) -> ExecResult {
        let req = request(profile_home, &["auth", "--alias", alias]).env(PASSPHRASE_VAR, "");
        self.runner.exec(&req)
    }

    /// One bounded `rad node status` probe.
    pub fn node_status(&self, profile_home: &Path, timeout: Duration) -> ExecResult {
        self.runner
            .exec(&request(profile_home, &["node", "status"]).timeout(timeout))
    }

    /// Launch `rad node start` detached from this process.
    pub fn node_start_detached(&self, profile_home: &Path) -> Result<(), ExecError> {
        self.runner
            .spawn_detached(&request(profile_home, &["node", "start"]))
    }
}

fn request(cwd: &Path, args: &[&str]) -> ExecRequest {
    ExecRequest::rad(cwd).args(args.iter().copied())
}
