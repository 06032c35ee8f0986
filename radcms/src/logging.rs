//! Diagnostic tracing for the CLI.
//!
//! Everything the library logs (spawned commands, recovery decisions, poll
//! progress) goes through `tracing`. Output is stderr so stdout stays
//! reserved for command results such as the identity text.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise only warnings are shown.
///
/// # Example
/// ```bash
/// RUST_LOG=radcms=debug radcms publish ./notes
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
