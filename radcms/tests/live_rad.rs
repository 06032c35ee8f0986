//! Scenarios against an installed `rad`. Run with `cargo test -- --ignored`.
//!
//! These create a real identity under a temporary profile home and start a
//! real node, so they need network-capable `rad` on `PATH`.

use radcms::Orchestrator;
use radcms::core::types::DaemonStatus;
use radcms::daemon::NodeSupervisor;
use radcms::io::config::Config;
use radcms::io::executor::ProcessExecutor;
use radcms::test_support::TestRepo;

fn live_orchestrator(user_data: &std::path::Path) -> Orchestrator<ProcessExecutor> {
    let cfg = Config {
        user_data: Some(user_data.to_path_buf()),
        ..Config::default()
    };
    Orchestrator::from_config(&cfg).expect("orchestrator")
}

#[test]
#[ignore = "requires rad on PATH"]
fn fresh_profile_gets_an_identity() {
    let user_data = tempfile::tempdir().expect("user data");
    let orch = live_orchestrator(user_data.path());

    let identity = orch.get_identity().expect("identity");

    assert!(identity.contains("did:key:"));
    assert!(orch.profile_home().keys_dir().is_dir());
}

#[test]
#[ignore = "requires rad on PATH and network access"]
fn publish_starts_a_stopped_node() {
    let user_data = tempfile::tempdir().expect("user data");
    let orch = live_orchestrator(user_data.path());
    orch.get_identity().expect("identity");

    let repo = TestRepo::new().expect("repo");
    repo.write("README.md", "# live\n").expect("write");
    repo.commit_all("seed").expect("commit");
    orch.init(repo.path()).expect("init");
    repo.write("post.md", "hello\n").expect("write");

    orch.publish(repo.path(), "live publish").expect("publish");

    let policy = orch.settings().poll.clone();
    let status = NodeSupervisor::new(orch.runner(), orch.profile_home(), &policy).probe();
    assert_eq!(status, DaemonStatus::Running);
}
