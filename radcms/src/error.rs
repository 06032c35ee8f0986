//! Error types for the orchestration layer.
//!
//! [`ExecError`] is what a single process invocation can produce. [`Error`]
//! is what the orchestrator returns: an `ExecError` tagged with the step that
//! failed, or a local I/O problem with the profile home. Both keep the exit
//! code and captured output intact.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::core::classifier::{FailureClass, classify};
use crate::core::types::Step;

/// Exit code reported when a child was killed by a signal.
pub const SIGNAL_EXIT_CODE: i32 = -1;

/// Failure of a single external command.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed with code {code}: {output}")]
    Command {
        command: String,
        code: i32,
        output: String,
    },

    #[error("{command} did not exit within {timeout:?}")]
    TimedOut { command: String, timeout: Duration },

    #[error("{command}: {context}: {source}")]
    Io {
        command: String,
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl ExecError {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecError::Command { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Captured output of a command failure (stderr, else stdout).
    pub fn output(&self) -> Option<&str> {
        match self {
            ExecError::Command { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Spawn and I/O failures never match a recoverable pattern.
    pub fn failure_class(&self) -> FailureClass {
        self.output().map_or(FailureClass::Other, classify)
    }

    pub fn is_spawn(&self) -> bool {
        matches!(self, ExecError::Spawn { .. })
    }
}

/// Outcome of one process invocation: trimmed stdout on exit code 0.
pub type ExecResult = std::result::Result<String, ExecError>;

/// Errors returned by orchestrator operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{step}: {source}")]
    Step {
        step: Step,
        #[source]
        source: ExecError,
    },

    #[error("create profile home {}: {source}", path.display())]
    ProfileHome {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn step(&self) -> Option<Step> {
        match self {
            Error::Step { step, .. } => Some(*step),
            Error::ProfileHome { .. } => None,
        }
    }

    pub fn exec(&self) -> Option<&ExecError> {
        match self {
            Error::Step { source, .. } => Some(source),
            Error::ProfileHome { .. } => None,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exec().and_then(ExecError::exit_code)
    }

    pub fn output(&self) -> Option<&str> {
        self.exec().and_then(ExecError::output)
    }

    pub fn failure_class(&self) -> FailureClass {
        self.exec()
            .map_or(FailureClass::Other, ExecError::failure_class)
    }

    /// A sync-step failure that starting the node daemon may fix.
    pub fn needs_node(&self) -> bool {
        self.step().is_some_and(Step::talks_to_node)
            && self.failure_class() == FailureClass::NodeNotRunning
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Attach the failing step to a raw process result.
pub trait StepExt<T> {
    fn at(self, step: Step) -> Result<T>;
}

impl<T> StepExt<T> for std::result::Result<T, ExecError> {
    fn at(self, step: Step) -> Result<T> {
        self.map_err(|source| Error::Step { step, source })
    }
}
