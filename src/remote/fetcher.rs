//! Concurrent artifact download

use super::{ArtifactSource, RemoteLocation};
use crate::error::{Error, Result};
use crate::selector::ArtifactPaths;
use crate::types::{ArtifactKind, Event};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;

/// A file written to disk by a finished transfer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferredFile {
    /// Local path
    pub path: PathBuf,
    /// Bytes written
    pub bytes: u64,
}

/// Both artifacts, flushed and closed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferResult {
    /// UI bundle
    pub gaia: TransferredFile,
    /// Platform bundle
    pub gecko: TransferredFile,
}

/// Downloads the two build artifacts
///
/// Both transfers are started together and awaited together. A failure in one
/// does not stop the other, and nothing written is removed: a failed fetch may
/// leave a complete file for one artifact and a partial file for the other.
pub struct Fetcher {
    source: Arc<dyn ArtifactSource>,
    event_tx: Option<broadcast::Sender<Event>>,
}

impl Fetcher {
    /// Create a fetcher reading from `source`
    pub fn new(source: Arc<dyn ArtifactSource>) -> Self {
        Self {
            source,
            event_tx: None,
        }
    }

    /// Publish [`Event::TransferCompleted`] on `event_tx` as each file is closed
    pub fn with_events(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Download both artifacts of `location` into `paths`, overwriting existing files
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransferFailed`] naming the failed artifact. If both
    /// fail, the UI bundle's failure is reported.
    pub async fn fetch(
        &self,
        base_url: &str,
        location: &RemoteLocation,
        paths: &ArtifactPaths,
    ) -> Result<TransferResult> {
        let gecko_name = location.gecko_name().ok_or_else(|| Error::TransferFailed {
            artifact: ArtifactKind::Gecko,
            url: location.url(base_url, ""),
            reason: "platform package was not located".to_string(),
        })?;
        let gaia_url = location.url(base_url, location.gaia_name());
        let gecko_url = location.url(base_url, gecko_name);

        tracing::info!(directory = %location.url(base_url, ""), "downloading artifacts");
        let (gaia, gecko) = tokio::join!(
            self.transfer(ArtifactKind::Gaia, &gaia_url, &paths.gaia),
            self.transfer(ArtifactKind::Gecko, &gecko_url, &paths.gecko),
        );

        Ok(TransferResult {
            gaia: gaia?,
            gecko: gecko?,
        })
    }

    async fn transfer(
        &self,
        artifact: ArtifactKind,
        url: &str,
        dest: &Path,
    ) -> Result<TransferredFile> {
        let failed = |reason: String| Error::TransferFailed {
            artifact,
            url: url.to_string(),
            reason,
        };

        let mut stream = self
            .source
            .open(url)
            .await
            .map_err(|e| failed(e.to_string()))?;
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| failed(format!("cannot create {}: {}", dest.display(), e)))?;

        let mut bytes = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| failed(e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| failed(format!("cannot write {}: {}", dest.display(), e)))?;
            bytes += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| failed(format!("cannot flush {}: {}", dest.display(), e)))?;
        file.sync_all()
            .await
            .map_err(|e| failed(format!("cannot sync {}: {}", dest.display(), e)))?;
        drop(file);

        tracing::info!(%artifact, path = %dest.display(), bytes, "transfer complete");
        if let Some(tx) = &self.event_tx {
            tx.send(Event::TransferCompleted {
                artifact,
                path: dest.to_path_buf(),
                bytes,
            })
            .ok();
        }
        Ok(TransferredFile {
            path: dest.to_path_buf(),
            bytes,
        })
    }
}
