//! Staging directory for one run

use crate::error::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Name of the profile backup directory inside the staging directory
pub const PROFILE_DIR_NAME: &str = "flash-b2g-profile";

/// Where downloads and the profile backup live
///
/// A user-supplied directory is kept after the run; a temporary one is
/// deleted when the `Staging` is dropped.
#[derive(Debug)]
pub enum Staging {
    /// Directory named by the user
    User(PathBuf),
    /// Self-deleting temporary directory
    Temporary(TempDir),
}

impl Staging {
    /// Open the staging directory, creating `dir` with its parents when needed
    ///
    /// A relative `dir` is resolved against the current directory, so paths
    /// derived from [`Staging::path`] stay valid for tools started elsewhere.
    /// With no `dir` a fresh temporary directory is created.
    pub fn open(dir: Option<&Path>) -> Result<Self> {
        match dir {
            Some(dir) => {
                let dir = std::path::absolute(dir)?;
                if !dir.exists() {
                    std::fs::create_dir_all(&dir)?;
                    tracing::info!(path = %dir.display(), "Created directory");
                }
                Ok(Staging::User(dir))
            }
            None => {
                let temp = tempfile::Builder::new().prefix("flash-b2g").tempdir()?;
                tracing::debug!(path = %temp.path().display(), "using temporary staging directory");
                Ok(Staging::Temporary(temp))
            }
        }
    }

    /// Staging directory path
    pub fn path(&self) -> &Path {
        match self {
            Staging::User(path) => path,
            Staging::Temporary(temp) => temp.path(),
        }
    }

    /// Profile backup directory (not created here)
    pub fn profile_dir(&self) -> PathBuf {
        self.path().join(PROFILE_DIR_NAME)
    }

    /// Whether the directory is removed on drop
    pub fn is_temporary(&self) -> bool {
        matches!(self, Staging::Temporary(_))
    }
}
