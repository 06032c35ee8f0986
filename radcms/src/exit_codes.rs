//! Stable exit codes for the `radcms` CLI.

/// Command succeeded (for `status`: working copy is clean).
pub const OK: i32 = 0;
/// Command failed; the error was printed to stderr.
pub const FAILED: i32 = 1;
/// `radcms status` found uncommitted changes.
pub const DIRTY: i32 = 2;
