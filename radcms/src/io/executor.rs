//! Process executor for `git` and `rad`.
//!
//! The [`CommandRunner`] trait decouples orchestration from real processes.
//! [`ProcessExecutor`] spawns the configured binaries in a sandboxed
//! environment; tests substitute scripted runners that never spawn anything.

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::core::env::sandboxed_env;
use crate::core::types::ExecRequest;
use crate::error::{ExecError, ExecResult};
use crate::io::config::BinaryPaths;
use crate::io::process::{run_command, spawn_detached};

/// Abstraction over process execution backends.
pub trait CommandRunner: Send + Sync {
    /// Run to completion. Exit code 0 yields trimmed stdout.
    fn exec(&self, request: &ExecRequest) -> ExecResult;

    /// Launch without waiting. Only spawn-level failures are reported.
    fn spawn_detached(&self, request: &ExecRequest) -> Result<(), ExecError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for Box<R> {
    fn exec(&self, request: &ExecRequest) -> ExecResult {
        (**self).exec(request)
    }

    fn spawn_detached(&self, request: &ExecRequest) -> Result<(), ExecError> {
        (**self).spawn_detached(request)
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for Arc<R> {
    fn exec(&self, request: &ExecRequest) -> ExecResult {
        (**self).exec(request)
    }

    fn spawn_detached(&self, request: &ExecRequest) -> Result<(), ExecError> {
        (**self).spawn_detached(request)
    }
}

/// Runner that spawns real processes with a minimal environment.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    binaries: BinaryPaths,
    profile_home: PathBuf,
}

impl ProcessExecutor {
    pub fn new(binaries: BinaryPaths, profile_home: impl Into<PathBuf>) -> Self {
        Self {
            binaries,
            profile_home: profile_home.into(),
        }
    }

    fn command(&self, request: &ExecRequest) -> Command {
        let program = self.binaries.resolve(request.alias);
        let mut cmd = Command::new(program);
        cmd.args(&request.args)
            .current_dir(&request.cwd)
            .env_clear()
            .envs(sandboxed_env(
                |key| std::env::var_os(key),
                &self.profile_home,
                &request.extra_env,
            ));
        cmd
    }
}

impl CommandRunner for ProcessExecutor {
    #[instrument(skip_all, fields(alias = %request.alias, argc = request.args.len(), cwd = %request.cwd.display()))]
    fn exec(&self, request: &ExecRequest) -> ExecResult {
        let label = request.display_command();
        debug!(command = %label, "exec");
        let output = run_command(self.command(request), &label, request.timeout)?;

        if output.timed_out {
            return Err(ExecError::TimedOut {
                command: label,
                timeout: request.timeout.unwrap_or_default(),
            });
        }
        if !output.status.success() {
            let code = output.exit_code();
            warn!(command = %label, exit_code = code, "command failed");
            return Err(ExecError::Command {
                command: label,
                code,
                output: output.failure_text(),
            });
        }
        Ok(output.stdout_text())
    }

    #[instrument(skip_all, fields(alias = %request.alias, cwd = %request.cwd.display()))]
    fn spawn_detached(&self, request: &ExecRequest) -> Result<(), ExecError> {
        let label = request.display_command();
        let pid = spawn_detached(self.command(request), &label)?;
        debug!(command = %label, pid, "launched detached");
        Ok(())
    }
}
