//! Build directory and platform package discovery

use super::{RemoteEntry, RemoteIndex, RemoteLocation};
use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::selector::MatchPattern;
use std::sync::Arc;
use std::time::Duration;

/// Finds the remote directory of a build and the platform package inside it
pub struct Locator {
    index: Arc<dyn RemoteIndex>,
    timeout: Duration,
    gaia_name: String,
    gecko_suffix: String,
}

impl Locator {
    /// Create a locator over `index` using the server settings in `config`
    pub fn new(index: Arc<dyn RemoteIndex>, config: &RemoteConfig) -> Self {
        Self {
            index,
            timeout: config.listing_timeout,
            gaia_name: config.gaia_name.clone(),
            gecko_suffix: config.gecko_suffix.clone(),
        }
    }

    /// Locate the build matching `pattern` below `base_path`
    ///
    /// When several directories match, the first one in listing order wins.
    ///
    /// # Errors
    ///
    /// - [`Error::Listing`] if a listing fails or times out
    /// - [`Error::NoMatchingDirectory`] if no entry matches `pattern`
    /// - [`Error::NoArtifactFound`] if the build holds no platform package
    pub async fn locate(&self, base_path: &str, pattern: &MatchPattern) -> Result<RemoteLocation> {
        let mut location = RemoteLocation::new(base_path, &self.gaia_name);

        tracing::info!(index = self.index.name(), path = %location.directory(), "listing builds");
        let entries = self.list(location.directory()).await?;

        let mut matching = entries.iter().filter(|e| pattern.matches(&e.name));
        let Some(build) = matching.next() else {
            return Err(Error::NoMatchingDirectory {
                pattern: pattern.to_string(),
                path: location.directory().to_string(),
            });
        };
        let others = matching.count();
        if others > 0 {
            tracing::warn!(
                build = %build.name,
                others,
                "several builds match, using the first one listed"
            );
        }
        location.enter(&build.name);

        tracing::info!(path = %location.directory(), "listing build files");
        let files = self.list(location.directory()).await?;
        let gecko = files
            .iter()
            .find(|f| f.name.ends_with(&self.gecko_suffix))
            .ok_or_else(|| Error::NoArtifactFound {
                path: location.directory().to_string(),
                suffix: self.gecko_suffix.clone(),
            })?;
        location.set_gecko(&gecko.name);

        tracing::debug!(
            directory = %location.directory(),
            gecko = %gecko.name,
            "build located"
        );
        Ok(location)
    }

    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        match tokio::time::timeout(self.timeout, self.index.list(path)).await {
            Ok(Ok(entries)) => Ok(entries),
            Ok(Err(e)) => Err(Error::Listing {
                path: path.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(Error::Listing {
                path: path.to_string(),
                reason: format!("timed out after {:?}", self.timeout),
            }),
        }
    }
}
