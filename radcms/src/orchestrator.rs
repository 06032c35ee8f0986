//! Application-facing operations with recovery.
//!
//! [`Orchestrator`] is what the transports call. It delegates to the
//! lifecycle, identity and supervisor components and owns the one policy
//! they share: a recoverable failure gets one repair and exactly one retry.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use anyhow::Result as AnyResult;
use tracing::{info, instrument, warn};

use crate::core::types::{InitPolicy, PollPolicy};
use crate::daemon::{NodeSupervisor, SupervisorState};
use crate::error::Result;
use crate::identity::IdentityManager;
use crate::io::config::Config;
use crate::io::executor::{CommandRunner, ProcessExecutor};
use crate::io::git::StatusEntry;
use crate::io::profile::ProfileHome;
use crate::repo::RepoLifecycle;

/// Tunables the orchestrator needs from configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub identity_alias: String,
    pub init_policy: InitPolicy,
    pub poll: PollPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            identity_alias: "rad-cms-user".to_string(),
            init_policy: InitPolicy::default(),
            poll: PollPolicy::default(),
        }
    }
}

impl From<&Config> for Settings {
    fn from(cfg: &Config) -> Self {
        Self {
            identity_alias: cfg.identity_alias.clone(),
            init_policy: cfg.init_policy,
            poll: cfg.node.poll_policy(),
        }
    }
}

pub struct Orchestrator<R> {
    runner: R,
    profile: ProfileHome,
    settings: Settings,
    /// Serializes node start-and-poll for this profile home.
    node_lock: Mutex<()>,
}

impl Orchestrator<ProcessExecutor> {
    /// Build an orchestrator that spawns the configured binaries.
    pub fn from_config(cfg: &Config) -> AnyResult<Self> {
        let profile = ProfileHome::from_user_data(&cfg.user_data_root()?);
        let runner = ProcessExecutor::new(cfg.binaries.clone(), profile.path());
        Ok(Self::new(runner, profile, Settings::from(cfg)))
    }
}

impl<R: CommandRunner> Orchestrator<R> {
    pub fn new(runner: R, profile: ProfileHome, settings: Settings) -> Self {
        Self {
            runner,
            profile,
            settings,
            node_lock: Mutex::new(()),
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn profile_home(&self) -> &ProfileHome {
        &self.profile
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Make `cwd` a git repository and a private rad project.
    ///
    /// Under [`InitPolicy::Lenient`] every failure is logged and swallowed.
    #[instrument(skip_all, fields(cwd = %cwd.display()))]
    pub fn init(&self, cwd: &Path) -> Result<()> {
        match self.repo().init(cwd) {
            Err(err) if self.settings.init_policy == InitPolicy::Lenient => {
                warn!(err = %err, "init failed, continuing");
                Ok(())
            }
            other => other,
        }
    }

    /// Commit everything and sync, starting the node if it is down.
    #[instrument(skip_all, fields(cwd = %cwd.display()))]
    pub fn publish(&self, cwd: &Path, message: &str) -> Result<()> {
        let repo = self.repo();
        match repo.publish(cwd, message) {
            Err(err) if err.needs_node() => {
                info!("node not running, starting it before retrying sync");
                self.recover_node()?;
                // Stage and commit already went through; only sync is retried.
                repo.sync(cwd)
            }
            other => other,
        }
    }

    /// Fetch from the network, starting the node if it is down.
    #[instrument(skip_all, fields(cwd = %cwd.display()))]
    pub fn fetch(&self, cwd: &Path) -> Result<()> {
        let repo = self.repo();
        match repo.fetch(cwd) {
            Err(err) if err.needs_node() => {
                info!("node not running, starting it before retrying fetch");
                self.recover_node()?;
                repo.fetch(cwd)
            }
            other => other,
        }
    }

    pub fn status(&self, cwd: &Path) -> Result<bool> {
        self.repo().status(cwd)
    }

    pub fn changes(&self, cwd: &Path) -> Result<Vec<StatusEntry>> {
        self.repo().changes(cwd)
    }

    pub fn get_identity(&self) -> Result<String> {
        IdentityManager::new(&self.runner, &self.profile, &self.settings.identity_alias)
            .get_identity()
    }

    /// Explicit node start: detached launch plus readiness poll.
    pub fn node_start(&self) -> Result<SupervisorState> {
        self.recover_node()
    }

    fn recover_node(&self) -> Result<SupervisorState> {
        // A caller that had to wait may find the node already started by the
        // holder, so it re-probes before launching.
        let (_guard, contended) = self.lock_node();
        let state = NodeSupervisor::new(&self.runner, &self.profile, &self.settings.poll)
            .start(contended)?;
        info!(?state, "node recovery finished");
        Ok(state)
    }

    fn lock_node(&self) -> (MutexGuard<'_, ()>, bool) {
        match self.node_lock.try_lock() {
            Ok(guard) => (guard, false),
            Err(TryLockError::Poisoned(poisoned)) => (poisoned.into_inner(), false),
            Err(TryLockError::WouldBlock) => (
                self.node_lock
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
                true,
            ),
        }
    }

    fn repo(&self) -> RepoLifecycle<'_, R> {
        RepoLifecycle::new(&self.runner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Step;
    use crate::test_support::{Response, ScriptedRunner};

    const NODE_DOWN: &str =
        "✗ Error: to sync a repository, your node must be running. To start it, run `rad node start`";

    fn orchestrator(
        runner: ScriptedRunner,
        policy: InitPolicy,
    ) -> (tempfile::TempDir, Orchestrator<ScriptedRunner>) {
        let temp = tempfile::tempdir().expect("tempdir");
        let profile = ProfileHome::from_user_data(temp.path());
        let settings = Settings {
            identity_alias: "tester".to_string(),
            init_policy: policy,
            poll: PollPolicy::immediate(3),
        };
        (temp, Orchestrator::new(runner, profile, settings))
    }

    #[test]
    fn lenient_init_swallows_failures() {
        let runner =
            ScriptedRunner::new().on("git init", [Response::fail(128, "permission denied")]);
        let (_temp, orch) = orchestrator(runner, InitPolicy::Lenient);
        orch.init(Path::new("/w")).expect("lenient init");
    }

    #[test]
    fn strict_init_propagates_failures() {
        let runner =
            ScriptedRunner::new().on("git init", [Response::fail(128, "permission denied")]);
        let (_temp, orch) = orchestrator(runner, InitPolicy::Strict);
        let err = orch.init(Path::new("/w")).unwrap_err();
        assert_eq!(err.exit_code(), Some(128));
    }

    #[test]
    fn strict_init_still_tolerates_existing_project() {
        let runner = ScriptedRunner::new()
            .on("rad init", [Response::fail(1, "repository is already initialized")]);
        let (_temp, orch) = orchestrator(runner, InitPolicy::Strict);
        orch.init(Path::new("/w")).expect("strict init");
    }

    #[test]
    fn fetch_recovers_once() {
        let runner = ScriptedRunner::new()
            .on("rad sync --fetch", [Response::fail(1, NODE_DOWN), Response::ok("")])
            .on("rad node status", [Response::ok("Node is running.")]);
        let (_temp, orch) = orchestrator(runner, InitPolicy::Lenient);

        orch.fetch(Path::new("/w")).expect("fetch");

        let runner = orch.runner();
        assert_eq!(runner.count("rad sync --fetch"), 2);
        assert_eq!(runner.detached_count("rad node start"), 1);
    }

    #[test]
    fn second_node_failure_propagates() {
        let runner = ScriptedRunner::new()
            .on("rad sync --fetch", [Response::fail(1, NODE_DOWN)])
            .on("rad node status", [Response::ok("Node is stopped.")]);
        let (_temp, orch) = orchestrator(runner, InitPolicy::Lenient);

        let err = orch.fetch(Path::new("/w")).unwrap_err();

        assert_eq!(err.step(), Some(Step::Fetch));
        assert_eq!(err.output(), Some(NODE_DOWN));
        let runner = orch.runner();
        assert_eq!(runner.count("rad sync --fetch"), 2);
        assert_eq!(runner.detached_count("rad node start"), 1);
    }

    #[test]
    fn node_start_is_explicitly_callable() {
        let runner =
            ScriptedRunner::new().on("rad node status", [Response::ok("Node is running.")]);
        let (_temp, orch) = orchestrator(runner, InitPolicy::Lenient);

        let state = orch.node_start().expect("node start");

        assert_eq!(state, SupervisorState::Ready);
        assert_eq!(orch.runner().detached_count("rad node start"), 1);
        assert!(orch.profile_home().path().is_dir());
    }
}
