//! Test-only helpers.
//!
//! [`ScriptedRunner`] answers requests from per-command response queues and
//! records every call, so orchestration can be tested without `git` or `rad`.
//! [`TestRepo`] is a throwaway real git working copy.

use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tempfile::TempDir;

use crate::core::types::ExecRequest;
use crate::error::{ExecError, ExecResult};
use crate::io::executor::CommandRunner;

/// Scripted answer for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok(String),
    Fail { code: i32, output: String },
    SpawnError,
}

impl Response {
    pub fn ok(stdout: &str) -> Self {
        Response::Ok(stdout.to_string())
    }

    pub fn fail(code: i32, output: &str) -> Self {
        Response::Fail {
            code,
            output: output.to_string(),
        }
    }
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub command: String,
    pub cwd: PathBuf,
    pub extra_env: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
    pub detached: bool,
}

struct Rule {
    prefix: String,
    responses: VecDeque<Response>,
}

/// Runner that replays scripted responses.
///
/// Rules match on the rendered command (`"rad sync --fetch"`); the longest
/// matching prefix wins. Each call pops the rule's next response, and the
/// last response repeats once the queue is down to one. Unmatched commands
/// succeed with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<I>(self, prefix: &str, responses: I) -> Self
    where
        I: IntoIterator<Item = Response>,
    {
        lock(&self.rules).push(Rule {
            prefix: prefix.to_string(),
            responses: responses.into_iter().collect(),
        });
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    /// Rendered commands in call order; detached launches end in " &".
    pub fn commands(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .map(|call| {
                if call.detached {
                    format!("{} &", call.command)
                } else {
                    call.command.clone()
                }
            })
            .collect()
    }

    /// Number of blocking calls whose command equals `command`.
    pub fn count(&self, command: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| !call.detached && call.command == command)
            .count()
    }

    /// Number of detached launches whose command equals `command`.
    pub fn detached_count(&self, command: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.detached && call.command == command)
            .count()
    }

    fn respond(&self, request: &ExecRequest, detached: bool) -> Response {
        let command = request.display_command();
        lock(&self.calls).push(Call {
            command: command.clone(),
            cwd: request.cwd.clone(),
            extra_env: request.extra_env.clone(),
            timeout: request.timeout,
            detached,
        });

        let mut rules = lock(&self.rules);
        let rule = rules
            .iter_mut()
            .filter(|rule| command.starts_with(&rule.prefix))
            .max_by_key(|rule| rule.prefix.len());
        match rule {
            Some(rule) if rule.responses.len() > 1 => rule
                .responses
                .pop_front()
                .unwrap_or_else(|| Response::ok("")),
            Some(rule) => rule
                .responses
                .front()
                .cloned()
                .unwrap_or_else(|| Response::ok("")),
            None => Response::ok(""),
        }
    }
}

impl CommandRunner for ScriptedRunner {
    fn exec(&self, request: &ExecRequest) -> ExecResult {
        match self.respond(request, false) {
            Response::Ok(stdout) => Ok(stdout.trim().to_string()),
            Response::Fail { code, output } => Err(ExecError::Command {
                command: request.display_command(),
                code,
                output,
            }),
            Response::SpawnError => Err(spawn_error(request)),
        }
    }

    fn spawn_detached(&self, request: &ExecRequest) -> Result<(), ExecError> {
        match self.respond(request, true) {
            Response::SpawnError => Err(spawn_error(request)),
            _ => Ok(()),
        }
    }
}

fn spawn_error(request: &ExecRequest) -> ExecError {
    ExecError::Spawn {
        program: request.alias.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A temporary git repository with a local committer identity.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp repo")?;
        let repo = Self { dir };
        repo.git(&["init", "-q"])?;
        repo.git(&["config", "user.email", "tests@example.com"])?;
        repo.git(&["config", "user.name", "radcms tests"])?;
        repo.git(&["config", "commit.gpgsign", "false"])?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, rel: &str, contents: &str) -> Result<()> {
        let path = self.path().join(rel);
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    /// Stage and commit everything directly with the host `git`.
    pub fn commit_all(&self, message: &str) -> Result<()> {
        self.git(&["add", "."])?;
        self.git(&["commit", "-q", "-m", message])
    }

    /// Number of commits on HEAD.
    pub fn commit_count(&self) -> Result<usize> {
        let output = Command::new("git")
            .args(["rev-list", "--count", "HEAD"])
            .current_dir(self.path())
            .output()
            .context("spawn git rev-list")?;
        if !output.status.success() {
            return Ok(0);
        }
        String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse()
            .context("parse commit count")
    }

    fn git(&self, args: &[&str]) -> Result<()> {
        let status = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .status()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !status.success() {
            bail!("git {} failed: {status}", args.join(" "));
        }
        Ok(())
    }
}

/// Shell stand-in for `rad`, keeping its state under `$RAD_HOME`.
///
/// The node is "running" once `node.up` exists; `node start` creates it
/// after a short delay. Every invocation is appended to `calls.log`.
#[cfg(unix)]
const FAKE_RAD: &str = r#"#!/bin/sh
marker="$RAD_HOME/node.up"
echo "$*" >> "$RAD_HOME/calls.log"
case "$*" in
  "node start")
    sleep 0.1
    touch "$marker" ;;
  "node status")
    if [ -f "$marker" ]; then echo "Node is running."; else echo "Node is stopped."; fi ;;
  "sync"|"sync --fetch")
    if [ -f "$marker" ]; then echo "Synced"; else echo "Error: your node must be running" >&2; exit 1; fi ;;
  "self")
    if [ -f "$RAD_HOME/keys/radicle" ]; then echo "DID did:key:z6MkFakeIdentity"; else echo "Error: Radicle profile not found" >&2; exit 1; fi ;;
  "auth --alias "*)
    [ "${RAD_PASSPHRASE-unset}" = "" ] || { echo "passphrase prompt" >&2; exit 3; }
    mkdir -p "$RAD_HOME/keys" && touch "$RAD_HOME/keys/radicle"
    echo "Authenticated" ;;
  "init --private --no-confirm")
    echo "Initialized" ;;
  *)
    echo "unexpected: $*" >&2
    exit 64 ;;
esac
"#;

/// Write the fake `rad` into `dir` and return its path.
#[cfg(unix)]
pub fn write_fake_rad(dir: &Path) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("rad");
    fs::write(&path, FAKE_RAD).with_context(|| format!("write {}", path.display()))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("chmod {}", path.display()))?;
    Ok(path)
}

/// Lines the fake `rad` logged under `profile_home`.
pub fn fake_rad_calls(profile_home: &Path) -> Vec<String> {
    fs::read_to_string(profile_home.join("calls.log"))
        .map(|log| log.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
