//! Node daemon supervision: detached launch plus readiness polling.
//!
//! The supervisor never owns the daemon. It fires `rad node start` as a
//! detached process and then judges readiness only through independent
//! `rad node status` probes.
//!
//! ```text
//! NotStarted ──launch──▶ Starting ──healthy probe + grace──▶ Ready
//!                            │
//!                            └──poll budget exhausted──▶ TimedOut (soft)
//! ```

use std::thread;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::classifier::reports_stopped;
use crate::core::types::{DaemonStatus, PollPolicy, Step};
use crate::error::{ExecResult, Result, StepExt};
use crate::io::executor::CommandRunner;
use crate::io::profile::ProfileHome;
use crate::io::rad::Rad;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    NotStarted,
    Starting,
    /// A probe confirmed the node is up.
    Ready,
    /// The poll budget ran out. Callers proceed anyway.
    TimedOut,
}

impl SupervisorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SupervisorState::Ready | SupervisorState::TimedOut)
    }
}

pub struct NodeSupervisor<'a, R: ?Sized> {
    runner: &'a R,
    profile: &'a ProfileHome,
    policy: &'a PollPolicy,
}

impl<'a, R: CommandRunner + ?Sized> NodeSupervisor<'a, R> {
    pub fn new(runner: &'a R, profile: &'a ProfileHome, policy: &'a PollPolicy) -> Self {
        Self {
            runner,
            profile,
            policy,
        }
    }

    /// One fresh status probe.
    pub fn probe(&self) -> DaemonStatus {
        let result =
            Rad::new(self.runner).node_status(self.profile.path(), self.policy.probe_timeout);
        status_from_probe(&result)
    }

    /// Start the node and wait for it to report healthy.
    ///
    /// With `skip_if_running`, a healthy probe before launching short-cuts
    /// straight to `Ready`. A spawn failure (binary missing) is returned; a
    /// launch that dies because a node already runs is not, since polling
    /// will then find the running node.
    #[instrument(skip_all, fields(profile_home = %self.profile.path().display()))]
    pub fn start(&self, skip_if_running: bool) -> Result<SupervisorState> {
        if skip_if_running && self.probe() == DaemonStatus::Running {
            debug!("node already running, skipping launch");
            return Ok(SupervisorState::Ready);
        }

        self.profile.ensure()?;
        info!("starting node in background");
        Rad::new(self.runner)
            .node_start_detached(self.profile.path())
            .at(Step::NodeStart)?;
        let state = advance(SupervisorState::NotStarted, SupervisorState::Starting);
        Ok(advance(state, self.await_ready()))
    }

    fn await_ready(&self) -> SupervisorState {
        for attempt in 1..=self.policy.attempts {
            thread::sleep(self.policy.interval);
            match self.probe() {
                DaemonStatus::Running => {
                    info!(attempt, "node reported running");
                    thread::sleep(self.policy.grace);
                    return SupervisorState::Ready;
                }
                status => debug!(attempt, ?status, "waiting for node"),
            }
        }
        warn!(
            attempts = self.policy.attempts,
            "node did not report running within budget, continuing anyway"
        );
        SupervisorState::TimedOut
    }
}

fn advance(from: SupervisorState, to: SupervisorState) -> SupervisorState {
    debug!(?from, ?to, "supervisor transition");
    to
}

/// Interpret one `rad node status` result.
pub fn status_from_probe(result: &ExecResult) -> DaemonStatus {
    match result {
        Ok(out) if reports_stopped(out) => DaemonStatus::Stopped,
        Ok(_) => DaemonStatus::Running,
        Err(err) if err.output().is_some_and(reports_stopped) => DaemonStatus::Stopped,
        Err(_) => DaemonStatus::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecError;
    use crate::test_support::{Response, ScriptedRunner};

    fn setup() -> (tempfile::TempDir, ProfileHome) {
        let temp = tempfile::tempdir().expect("tempdir");
        let profile = ProfileHome::from_user_data(temp.path());
        (temp, profile)
    }

    #[test]
    fn probe_interpretation() {
        assert_eq!(
            status_from_probe(&Ok("✓ Node is running.".to_string())),
            DaemonStatus::Running
        );
        assert_eq!(
            status_from_probe(&Ok("Node is stopped.".to_string())),
            DaemonStatus::Stopped
        );
        let stopped = ExecError::Command {
            command: "rad node status".to_string(),
            code: 1,
            output: "node is not running".to_string(),
        };
        assert_eq!(status_from_probe(&Err(stopped)), DaemonStatus::Stopped);
        let other = ExecError::Command {
            command: "rad node status".to_string(),
            code: 1,
            output: "control socket refused connection".to_string(),
        };
        assert_eq!(status_from_probe(&Err(other)), DaemonStatus::Unknown);
    }

    #[test]
    fn launches_then_polls_until_running() {
        let (_temp, profile) = setup();
        let policy = PollPolicy::immediate(5);
        let runner = ScriptedRunner::new().on(
            "rad node status",
            [
                Response::fail(1, "node is not running"),
                Response::ok("Node is stopped."),
                Response::ok("Node is running."),
            ],
        );

        let state = NodeSupervisor::new(&runner, &profile, &policy)
            .start(false)
            .expect("start");

        assert_eq!(state, SupervisorState::Ready);
        assert_eq!(runner.detached_count("rad node start"), 1);
        assert_eq!(runner.count("rad node status"), 3);
        assert_eq!(runner.calls()[0].cwd, profile.path());
    }

    #[test]
    fn exhausted_budget_is_soft_timeout() {
        let (_temp, profile) = setup();
        let policy = PollPolicy::immediate(4);
        let runner = ScriptedRunner::new().on("rad node status", [Response::ok("Node is stopped.")]);

        let state = NodeSupervisor::new(&runner, &profile, &policy)
            .start(false)
            .expect("soft timeout is not an error");

        assert_eq!(state, SupervisorState::TimedOut);
        assert!(state.is_terminal());
        assert_eq!(runner.count("rad node status"), 4);
    }

    #[test]
    fn spawn_failure_propagates() {
        let (_temp, profile) = setup();
        let policy = PollPolicy::immediate(3);
        let runner = ScriptedRunner::new().on("rad node start", [Response::SpawnError]);

        let err = NodeSupervisor::new(&runner, &profile, &policy)
            .start(false)
            .unwrap_err();

        assert_eq!(err.step(), Some(Step::NodeStart));
        assert!(err.exec().is_some_and(ExecError::is_spawn));
        assert_eq!(runner.count("rad node status"), 0);
    }

    #[test]
    fn skip_if_running_avoids_second_launch() {
        let (_temp, profile) = setup();
        let policy = PollPolicy::immediate(3);
        let runner = ScriptedRunner::new().on("rad node status", [Response::ok("Node is running.")]);

        let state = NodeSupervisor::new(&runner, &profile, &policy)
            .start(true)
            .expect("start");

        assert_eq!(state, SupervisorState::Ready);
        assert_eq!(runner.detached_count("rad node start"), 0);
    }

    #[test]
    fn probes_are_bounded() {
        let (_temp, profile) = setup();
        let policy = PollPolicy::immediate(1);
        let runner = ScriptedRunner::new();
        let status = NodeSupervisor::new(&runner, &profile, &policy).probe();

        assert_eq!(status, DaemonStatus::Running);
        let calls = runner.calls();
        assert_eq!(calls[0].command, "rad node status");
        assert_eq!(calls[0].timeout, Some(policy.probe_timeout));
    }
}
