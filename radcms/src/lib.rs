//! Orchestration and recovery for the `git` and `rad` command-line tools.
//!
//! The crate drives two external binaries that signal success only through
//! exit codes and free text, repairing the two failures it knows how to fix:
//! a missing peer identity and a stopped node daemon.
//!
//! - **[`core`]**: Pure logic (requests, environment sandboxing, failure
//!   classification). No I/O.
//! - **[`io`]**: Process execution, tool adapters, configuration, profile home.
//!
//! The components [`repo`], [`identity`] and [`daemon`] are composed by
//! [`orchestrator`], which is what the CLI and HTTP server call.

pub mod core;
pub mod daemon;
pub mod error;
pub mod exit_codes;
pub mod identity;
pub mod io;
pub mod logging;
pub mod orchestrator;
pub mod repo;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::{Error, ExecError, Result};
pub use orchestrator::{Orchestrator, Settings};
