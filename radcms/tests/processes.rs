//! End-to-end runs against real processes: host `git` plus a shell stand-in
//! for `rad` that keeps node and identity state in the profile home.
#![cfg(unix)]

use std::collections::BTreeSet;
use std::path::PathBuf;

use radcms::Orchestrator;
use radcms::core::env::{PROFILE_HOME_VAR, permitted_keys};
use radcms::core::types::{ExecRequest, Step};
use radcms::io::config::{BinaryPaths, Config, NodeConfig};
use radcms::io::executor::{CommandRunner, ProcessExecutor};
use radcms::io::profile::ProfileHome;
use radcms::test_support::{TestRepo, fake_rad_calls, write_fake_rad};

struct Fixture {
    _tools: tempfile::TempDir,
    _user_data: tempfile::TempDir,
    orch: Orchestrator<ProcessExecutor>,
}

fn fixture() -> Fixture {
    let tools = tempfile::tempdir().expect("tools dir");
    let user_data = tempfile::tempdir().expect("user data");
    let rad = write_fake_rad(tools.path()).expect("fake rad");
    let cfg = Config {
        user_data: Some(user_data.path().to_path_buf()),
        binaries: BinaryPaths {
            git: PathBuf::from("git"),
            rad,
        },
        node: NodeConfig {
            poll_attempts: 40,
            poll_interval_ms: 50,
            ready_grace_ms: 0,
            ..NodeConfig::default()
        },
        ..Config::default()
    };
    let orch = Orchestrator::from_config(&cfg).expect("orchestrator");
    orch.profile_home().ensure().expect("profile home");
    Fixture {
        _tools: tools,
        _user_data: user_data,
        orch,
    }
}

#[test]
fn status_tracks_working_copy() {
    let fx = fixture();
    let repo = TestRepo::new().expect("repo");

    assert!(!fx.orch.status(repo.path()).expect("empty repo"));

    repo.write("index.md", "# Home\n").expect("write");
    assert!(fx.orch.status(repo.path()).expect("untracked"));

    repo.commit_all("add index").expect("commit");
    assert!(!fx.orch.status(repo.path()).expect("clean"));

    repo.write("index.md", "# Home\n\nedited\n").expect("edit");
    assert!(fx.orch.status(repo.path()).expect("modified"));
}

#[test]
fn status_outside_a_repository_is_an_error() {
    let fx = fixture();
    let plain = tempfile::tempdir().expect("tempdir");

    let err = fx.orch.status(plain.path()).unwrap_err();

    assert_eq!(err.step(), Some(Step::Status));
    assert_eq!(err.exit_code(), Some(128));
}

#[test]
fn publish_with_stopped_node_recovers() {
    let fx = fixture();
    let repo = TestRepo::new().expect("repo");
    repo.write("post.md", "hello\n").expect("write");

    fx.orch.publish(repo.path(), "first post").expect("publish");

    assert_eq!(repo.commit_count().expect("count"), 1);
    assert!(!fx.orch.status(repo.path()).expect("status"));
    let calls = fake_rad_calls(fx.orch.profile_home().path());
    assert_eq!(calls.iter().filter(|c| *c == "sync").count(), 2);
    assert_eq!(calls.iter().filter(|c| *c == "node start").count(), 1);
    assert!(fx.orch.profile_home().path().join("node.up").exists());
}

#[test]
fn publish_with_nothing_to_commit_fails_before_sync() {
    let fx = fixture();
    let repo = TestRepo::new().expect("repo");
    repo.write("post.md", "hello\n").expect("write");
    repo.commit_all("seed").expect("commit");

    let err = fx.orch.publish(repo.path(), "again").unwrap_err();

    assert_eq!(err.step(), Some(Step::Commit));
    assert_eq!(err.exit_code(), Some(1));
    assert!(fake_rad_calls(fx.orch.profile_home().path()).is_empty());
}

#[test]
fn identity_is_bootstrapped_on_first_use() {
    let fx = fixture();
    let profile: &ProfileHome = fx.orch.profile_home();

    let identity = fx.orch.get_identity().expect("identity");

    assert!(identity.contains("did:key:"));
    assert!(profile.keys_dir().is_dir());
    assert_eq!(
        fake_rad_calls(profile.path()),
        vec!["self", "auth --alias rad-cms-user", "self"]
    );

    fx.orch.get_identity().expect("second lookup");
    assert_eq!(fake_rad_calls(profile.path()).len(), 4);
}

#[test]
fn child_environment_is_allow_listed() {
    let temp = tempfile::tempdir().expect("tempdir");
    let exec = ProcessExecutor::new(
        BinaryPaths {
            git: PathBuf::from("env"),
            rad: PathBuf::from("rad"),
        },
        temp.path(),
    );
    let request = ExecRequest::git(temp.path()).env("RAD_PASSPHRASE", "");

    let out = exec.exec(&request).expect("env");

    let allowed: BTreeSet<String> = permitted_keys(&request.extra_env).into_iter().collect();
    let seen: Vec<(&str, &str)> = out
        .lines()
        .filter_map(|line| line.split_once('='))
        .collect();
    for (key, _) in &seen {
        assert!(allowed.contains(*key), "unexpected variable {key}");
    }
    let home = temp.path().to_string_lossy();
    assert!(seen.contains(&(PROFILE_HOME_VAR, home.as_ref())));
    assert!(seen.contains(&("RAD_PASSPHRASE", "")));
}
