//! radcms-server: JSON API over the `git`/`rad` orchestrator.

mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use radcms::io::config::load_effective_config;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "radcms-server")]
#[command(about = "HTTP API for publishing content over the Radicle network")]
struct Args {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Config file
    #[arg(long, default_value = "radcms.toml")]
    config: PathBuf,

    /// Directory holding the isolated `rad` profile (default `~/.rad-cms`)
    #[arg(long)]
    user_data: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("radcms_server=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut cfg = load_effective_config(&args.config)?;
    if let Some(root) = args.user_data {
        cfg.user_data = Some(root);
    }
    let state = AppState::from_config(&cfg)?;
    info!(user_data = %state.user_data.display(), "starting radcms-server");

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router().layer(cors).with_state(state);

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
