//! Classification of free-text failure output from `git` and `rad`.
//!
//! Neither binary exposes structured error codes, so every pattern this crate
//! reacts to lives here. Matching is best-effort: an unrecognized message is
//! `Other` and propagates as a plain command failure.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Failure categories with an automated response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureClass {
    /// The node daemon is not running; start it and retry once.
    NodeNotRunning,
    /// No local profile yet; create an identity and retry once.
    ProfileNotFound,
    /// The repository or project already exists; nothing to do.
    AlreadyInitialized,
    Other,
}

static NODE_NOT_RUNNING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)must be running").unwrap());

static PROFILE_NOT_FOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)profile not found|no such file or directory|\benoent\b").unwrap()
});

static ALREADY_INITIALIZED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)already (?:initialized|a radicle project|exists)|reinitialized existing")
        .unwrap()
});

static REPORTS_STOPPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bstopped\b|not running").unwrap());

/// Classify the captured output of a failed command.
pub fn classify(output: &str) -> FailureClass {
    if NODE_NOT_RUNNING.is_match(output) {
        FailureClass::NodeNotRunning
    } else if PROFILE_NOT_FOUND.is_match(output) {
        FailureClass::ProfileNotFound
    } else if ALREADY_INITIALIZED.is_match(output) {
        FailureClass::AlreadyInitialized
    } else {
        FailureClass::Other
    }
}

/// True if `rad node status` output says the node is down.
pub fn reports_stopped(status_output: &str) -> bool {
    REPORTS_STOPPED.is_match(status_output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_not_running_matches_rad_wording() {
        let out = "✗ Error: to sync a repository, your node must be running. To start it, run `rad node start`";
        assert_eq!(classify(out), FailureClass::NodeNotRunning);
    }

    #[test]
    fn node_not_running_wins_over_other_patterns() {
        let out = "profile not found, and the daemon must be running";
        assert_eq!(classify(out), FailureClass::NodeNotRunning);
    }

    #[test]
    fn profile_not_found_matches_missing_home() {
        assert_eq!(
            classify("✗ Error: Radicle profile not found in '/tmp/x/radicle-env'"),
            FailureClass::ProfileNotFound
        );
        assert_eq!(
            classify("No such file or directory (os error 2)"),
            FailureClass::ProfileNotFound
        );
        assert_eq!(classify("spawn rad ENOENT"), FailureClass::ProfileNotFound);
    }

    #[test]
    fn already_initialized_matches_both_tools() {
        assert_eq!(
            classify("✗ Error: repository is already initialized with remote rad"),
            FailureClass::AlreadyInitialized
        );
        assert_eq!(
            classify("Reinitialized existing Git repository in /tmp/w/.git/"),
            FailureClass::AlreadyInitialized
        );
    }

    #[test]
    fn unrelated_output_is_other() {
        assert_eq!(
            classify("nothing to commit, working tree clean"),
            FailureClass::Other
        );
        assert_eq!(classify(""), FailureClass::Other);
    }

    #[test]
    fn stopped_detection() {
        assert!(reports_stopped("Node is stopped."));
        assert!(reports_stopped("✗ node is not running"));
        assert!(!reports_stopped("✓ Node is running and listening on 0.0.0.0:8776."));
    }
}
