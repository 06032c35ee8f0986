//! Shared deterministic types for the orchestration layer.
//!
//! Nothing here touches the filesystem or spawns processes. Requests are built
//! here and handed to a [`CommandRunner`](crate::io::executor::CommandRunner).

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which external tool a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryAlias {
    /// Content-versioning binary (`git`).
    Vcs,
    /// Peer-to-peer collaboration binary (`rad`).
    Peer,
}

impl BinaryAlias {
    pub fn default_program(self) -> &'static str {
        match self {
            BinaryAlias::Vcs => "git",
            BinaryAlias::Peer => "rad",
        }
    }
}

impl fmt::Display for BinaryAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_program())
    }
}

/// One invocation of an external binary.
///
/// Arguments are passed to the OS as a literal vector; nothing is ever joined
/// into a shell string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    pub alias: BinaryAlias,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Overlaid on top of the sandboxed environment.
    pub extra_env: BTreeMap<String, String>,
    /// Upper bound on the wait. `None` waits for exit.
    pub timeout: Option<Duration>,
}

impl ExecRequest {
    pub fn new(alias: BinaryAlias, cwd: impl Into<PathBuf>) -> Self {
        Self {
            alias,
            args: Vec::new(),
            cwd: cwd.into(),
            extra_env: BTreeMap::new(),
            timeout: None,
        }
    }

    pub fn git(cwd: impl Into<PathBuf>) -> Self {
        Self::new(BinaryAlias::Vcs, cwd)
    }

    pub fn rad(cwd: impl Into<PathBuf>) -> Self {
        Self::new(BinaryAlias::Peer, cwd)
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_env.insert(key.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Human-readable rendering used in logs and error messages.
    pub fn display_command(&self) -> String {
        if self.args.is_empty() {
            return self.alias.to_string();
        }
        format!("{} {}", self.alias, self.args.join(" "))
    }
}

/// Named step of a multi-command operation, attached to failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    VcsInit,
    PeerInit,
    Stage,
    Commit,
    Sync,
    Fetch,
    Status,
    Identity,
    Auth,
    NodeStart,
}

impl Step {
    /// Steps whose failure may mean the node daemon is down.
    pub fn talks_to_node(self) -> bool {
        matches!(self, Step::Sync | Step::Fetch)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::VcsInit => "git init",
            Step::PeerInit => "rad init",
            Step::Stage => "git add",
            Step::Commit => "git commit",
            Step::Sync => "rad sync",
            Step::Fetch => "rad sync --fetch",
            Step::Status => "git status",
            Step::Identity => "rad self",
            Step::Auth => "rad auth",
            Step::NodeStart => "rad node start",
        };
        f.write_str(name)
    }
}

/// Node daemon state as seen by a single status probe. Never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonStatus {
    Running,
    Stopped,
    /// The probe failed without saying why; try again later.
    Unknown,
}

/// How `init` treats failures other than "already initialized".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitPolicy {
    /// Log and swallow every failure so workspace creation never blocks.
    #[default]
    Lenient,
    /// Propagate everything except "already initialized".
    Strict,
}

/// Readiness polling budget for the node daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub interval: Duration,
    /// Extra wait after the first healthy probe, for the control socket.
    pub grace: Duration,
    /// Bound on each individual status probe.
    pub probe_timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 20,
            interval: Duration::from_millis(500),
            grace: Duration::from_secs(1),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

impl PollPolicy {
    /// Policy with no waiting at all, for scripted tests.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            interval: Duration::ZERO,
            grace: Duration::ZERO,
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// A working copy is dirty iff porcelain status prints anything.
pub fn is_dirty(porcelain: &str) -> bool {
    !porcelain.trim().is_empty()
}
