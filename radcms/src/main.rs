//! `radcms`: drive `git` and `rad` for a content working copy.
//!
//! Every subcommand goes through the orchestrator, so a stopped node or a
//! missing identity is repaired the same way the HTTP server repairs it.

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use radcms::Orchestrator;
use radcms::daemon::SupervisorState;
use radcms::exit_codes;
use radcms::io::config::{Config, load_effective_config};
use radcms::io::executor::CommandRunner;

#[derive(Parser, Debug)]
#[command(
    name = "radcms",
    version,
    about = "Publish and fetch a working copy over the Radicle network"
)]
struct Cli {
    /// Directory holding the isolated `rad` profile (default `~/.rad-cms`).
    #[arg(long, global = true)]
    user_data: Option<PathBuf>,

    /// Config file.
    #[arg(long, global = true, default_value = "radcms.toml")]
    config: PathBuf,

    /// Path to the `git` binary.
    #[arg(long, global = true)]
    git_bin: Option<PathBuf>,

    /// Path to the `rad` binary.
    #[arg(long, global = true)]
    rad_bin: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Make a directory a git repository and a private rad project.
    Init { dir: PathBuf },
    /// Stage everything, commit and sync.
    Publish {
        dir: PathBuf,
        /// Commit message (defaults to `publish_message` from config).
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Pull updates from the network.
    Fetch { dir: PathBuf },
    /// Exit 0 when clean, 2 when there are uncommitted changes.
    Status {
        dir: PathBuf,
        /// Print each changed path.
        #[arg(long)]
        list: bool,
        /// Print changes as JSON (implies --list).
        #[arg(long)]
        json: bool,
    },
    /// Print the local identity, creating it on first run.
    Identity,
    /// Start the node daemon and wait for it to come up.
    NodeStart,
}

fn main() {
    radcms::logging::init();
    match run() {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            process::exit(exit_codes::FAILED);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let cfg = effective_config(&cli)?;
    let orch = Orchestrator::from_config(&cfg)?;

    match cli.command {
        Command::Init { dir } => {
            orch.init(&dir)
                .with_context(|| format!("init {}", dir.display()))?;
            println!("initialized {}", dir.display());
        }
        Command::Publish { dir, message } => {
            let message = message.unwrap_or_else(|| cfg.publish_message.clone());
            orch.publish(&dir, &message)
                .with_context(|| format!("publish {}", dir.display()))?;
            println!("published {}", dir.display());
        }
        Command::Fetch { dir } => {
            orch.fetch(&dir)
                .with_context(|| format!("fetch {}", dir.display()))?;
            println!("fetched {}", dir.display());
        }
        Command::Status { dir, list, json } => return cmd_status(&orch, &dir, list, json),
        Command::Identity => {
            let identity = orch.get_identity().context("identity")?;
            println!("{identity}");
        }
        Command::NodeStart => match orch.node_start().context("node start")? {
            SupervisorState::TimedOut => {
                eprintln!("node did not report running in time; it may still be starting");
            }
            _ => println!("node running"),
        },
    }
    Ok(exit_codes::OK)
}

fn cmd_status<R: CommandRunner>(
    orch: &Orchestrator<R>,
    dir: &Path,
    list: bool,
    json: bool,
) -> Result<i32> {
    let context = || format!("status {}", dir.display());
    let dirty = orch.status(dir).with_context(context)?;
    if json || list {
        let entries = orch.changes(dir).with_context(context)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        } else {
            for entry in &entries {
                println!("{} {}", entry.code, entry.path);
            }
        }
    }
    Ok(if dirty {
        exit_codes::DIRTY
    } else {
        exit_codes::OK
    })
}

/// Config file, then environment, then command-line flags.
fn effective_config(cli: &Cli) -> Result<Config> {
    let mut cfg = load_effective_config(&cli.config)?;
    if let Some(root) = &cli.user_data {
        cfg.user_data = Some(root.clone());
    }
    if let Some(git) = &cli.git_bin {
        cfg.binaries.git = git.clone();
    }
    if let Some(rad) = &cli.rad_bin {
        cfg.binaries.rad = rad.clone();
    }
    cfg.validate()?;
    Ok(cfg)
}
