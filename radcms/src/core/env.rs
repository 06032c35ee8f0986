//! Sandboxed environment for child processes.
//!
//! Children never inherit the host environment wholesale. They get the
//! allow-listed host variables that are actually set, the profile home, and
//! whatever the caller overlays on top.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::Path;

/// Variable the peer binary reads to locate its profile home.
pub const PROFILE_HOME_VAR: &str = "RAD_HOME";

/// Host variables copied into every child when present.
pub const ALLOWED_HOST_VARS: &[&str] = &[
    "PATH",
    "HOME",
    "LANG",
    "LC_ALL",
    "TERM",
    "SSH_AUTH_SOCK",
    "GIT_EXEC_PATH",
    "GIT_SSH",
    "GIT_SSH_COMMAND",
];

/// Build a child environment.
///
/// `lookup` resolves host variables (normally [`std::env::var_os`]). Overlay
/// entries win over both the allow-list and the profile home.
pub fn sandboxed_env<F>(
    lookup: F,
    profile_home: &Path,
    overlay: &BTreeMap<String, String>,
) -> BTreeMap<String, OsString>
where
    F: Fn(&str) -> Option<OsString>,
{
    let mut env = BTreeMap::new();
    for key in ALLOWED_HOST_VARS {
        if let Some(value) = lookup(key) {
            env.insert((*key).to_string(), value);
        }
    }
    env.insert(
        PROFILE_HOME_VAR.to_string(),
        profile_home.as_os_str().to_os_string(),
    );
    for (key, value) in overlay {
        env.insert(key.clone(), OsString::from(value));
    }
    env
}

/// Variables a child may legally observe for the given overlay.
pub fn permitted_keys(overlay: &BTreeMap<String, String>) -> Vec<String> {
    let mut keys: Vec<String> = ALLOWED_HOST_VARS.iter().map(|k| k.to_string()).collect();
    keys.push(PROFILE_HOME_VAR.to_string());
    keys.extend(overlay.keys().cloned());
    keys.sort();
    keys.dedup();
    keys
}
