//! Deterministic logic shared by the orchestration layer.
//!
//! Core modules perform no I/O. They build requests, classify output and
//! derive environments, so they can be tested without spawning anything.

pub mod classifier;
pub mod env;
pub mod types;
