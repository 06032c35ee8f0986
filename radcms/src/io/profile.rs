//! Profile home: the directory scoping one user's peer identity and node.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// Name of the profile home below the user-data root.
pub const PROFILE_DIR_NAME: &str = "radicle-env";
/// Key storage the peer binary creates inside the profile home.
pub const KEYS_DIR_NAME: &str = "keys";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileHome {
    path: PathBuf,
}

impl ProfileHome {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<user_data>/radicle-env`.
    pub fn from_user_data(user_data: &Path) -> Self {
        Self::new(user_data.join(PROFILE_DIR_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.path.join(KEYS_DIR_NAME)
    }

    /// Create the directory if missing. `rad` refuses a missing home.
    pub fn ensure(&self) -> Result<()> {
        if !self.path.is_dir() {
            debug!(path = %self.path.display(), "creating profile home");
        }
        fs::create_dir_all(&self.path).map_err(|source| Error::ProfileHome {
            path: self.path.clone(),
            source,
        })
    }
}
