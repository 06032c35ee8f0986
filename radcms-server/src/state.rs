//! Shared application state for the API server.

use std::path::PathBuf;
use std::sync::Arc;

use radcms::io::config::Config;
use radcms::io::executor::{CommandRunner, ProcessExecutor};
use radcms::io::profile::ProfileHome;
use radcms::{Orchestrator, Settings};

use crate::routes::ApiError;

/// Runner behind the orchestrator; boxed so tests can swap in a script.
pub type BoxedRunner = Box<dyn CommandRunner>;

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator<BoxedRunner>>,
    /// User-data root reported by `/api/config`.
    pub user_data: PathBuf,
    /// Commit message used when a publish request omits one.
    pub publish_message: String,
}

impl AppState {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let user_data = cfg.user_data_root()?;
        let profile = ProfileHome::from_user_data(&user_data);
        let runner: BoxedRunner =
            Box::new(ProcessExecutor::new(cfg.binaries.clone(), profile.path()));
        let orchestrator = Orchestrator::new(runner, profile, Settings::from(cfg));
        Ok(Self::new(orchestrator, user_data, cfg.publish_message.clone()))
    }

    pub fn new(
        orchestrator: Orchestrator<BoxedRunner>,
        user_data: PathBuf,
        publish_message: String,
    ) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            user_data,
            publish_message,
        }
    }

    /// Run a blocking orchestrator call off the async runtime.
    pub async fn run<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Orchestrator<BoxedRunner>) -> radcms::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::task::spawn_blocking(move || op(&orchestrator))
            .await
            .map_err(ApiError::from_join)?
            .map_err(ApiError::from)
    }
}
