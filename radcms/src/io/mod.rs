//! Side-effecting adapters: processes, configuration, profile home.

pub mod config;
pub mod executor;
pub mod git;
pub mod process;
pub mod profile;
pub mod rad;
