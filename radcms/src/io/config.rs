//! Deployment configuration stored in `radcms.toml`.
//!
//! Precedence, highest first: CLI flags (applied by the binaries), environment
//! variables ([`Config::apply_env`]), the config file, built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::{BinaryAlias, InitPolicy, PollPolicy};

/// Overrides the user-data root.
pub const USER_DATA_ENV: &str = "RAD_CMS_USER_DATA";
/// Overrides the `git` binary location.
pub const GIT_BINARY_ENV: &str = "GIT_BINARY_PATH";
/// Overrides the `rad` binary location.
pub const RAD_BINARY_ENV: &str = "RAD_BINARY_PATH";

/// Directory under the home directory used when no user-data root is set.
pub const DEFAULT_USER_DATA_DIR: &str = ".rad-cms";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Root under which the profile home (`radicle-env`) lives.
    pub user_data: Option<PathBuf>,

    /// Alias given to the identity created on first run.
    pub identity_alias: String,

    /// Commit message used when a publish request carries none.
    pub publish_message: String,

    pub init_policy: InitPolicy,

    pub binaries: BinaryPaths,

    pub node: NodeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_data: None,
            identity_alias: "rad-cms-user".to_string(),
            publish_message: "Updated via Sovereign UI".to_string(),
            init_policy: InitPolicy::default(),
            binaries: BinaryPaths::default(),
            node: NodeConfig::default(),
        }
    }
}

/// Locations of the two external binaries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BinaryPaths {
    pub git: PathBuf,
    pub rad: PathBuf,
}

impl Default for BinaryPaths {
    fn default() -> Self {
        Self {
            git: PathBuf::from(BinaryAlias::Vcs.default_program()),
            rad: PathBuf::from(BinaryAlias::Peer.default_program()),
        }
    }
}

impl BinaryPaths {
    pub fn resolve(&self, alias: BinaryAlias) -> &Path {
        match alias {
            BinaryAlias::Vcs => &self.git,
            BinaryAlias::Peer => &self.rad,
        }
    }
}

/// Node daemon readiness polling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NodeConfig {
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
    pub ready_grace_ms: u64,
    pub probe_timeout_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            poll_attempts: 20,
            poll_interval_ms: 500,
            ready_grace_ms: 1000,
            probe_timeout_secs: 5,
        }
    }
}

impl NodeConfig {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            attempts: self.poll_attempts,
            interval: Duration::from_millis(self.poll_interval_ms),
            grace: Duration::from_millis(self.ready_grace_ms),
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.identity_alias.trim().is_empty() {
            return Err(anyhow!("identity_alias must not be empty"));
        }
        if self.publish_message.trim().is_empty() {
            return Err(anyhow!("publish_message must not be empty"));
        }
        if self.binaries.git.as_os_str().is_empty() || self.binaries.rad.as_os_str().is_empty() {
            return Err(anyhow!("binaries.git and binaries.rad must be non-empty"));
        }
        if self.node.poll_attempts == 0 {
            return Err(anyhow!("node.poll_attempts must be > 0"));
        }
        if self.node.probe_timeout_secs == 0 {
            return Err(anyhow!("node.probe_timeout_secs must be > 0"));
        }
        Ok(())
    }

    /// Apply environment overrides. `lookup` is normally `std::env::var`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup(USER_DATA_ENV).filter(|v| !v.is_empty()) {
            self.user_data = Some(PathBuf::from(root));
        }
        if let Some(git) = lookup(GIT_BINARY_ENV).filter(|v| !v.is_empty()) {
            self.binaries.git = PathBuf::from(git);
        }
        if let Some(rad) = lookup(RAD_BINARY_ENV).filter(|v| !v.is_empty()) {
            self.binaries.rad = PathBuf::from(rad);
        }
    }

    /// The configured user-data root, or `~/.rad-cms`.
    pub fn user_data_root(&self) -> Result<PathBuf> {
        if let Some(root) = &self.user_data {
            return Ok(root.clone());
        }
        let home = dirs::home_dir().context("cannot determine home directory for user data")?;
        Ok(home.join(DEFAULT_USER_DATA_DIR))
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `Config::default()`.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        let cfg = Config::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Load config from `path` and layer environment overrides on top.
pub fn load_effective_config(path: &Path) -> Result<Config> {
    let mut cfg = load_config(path)?;
    cfg.apply_env(|key| std::env::var(key).ok());
    cfg.validate()?;
    Ok(cfg)
}
