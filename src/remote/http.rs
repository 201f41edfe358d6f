//! HTTP directory index and file transfer

use super::{ArtifactSource, ByteStream, RemoteEntry, RemoteIndex};
use crate::error::Result;
use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

#[allow(clippy::expect_used)]
static HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s[^>]*?href\s*=\s*["']([^"']+)["']"#).expect("static regex")
});

/// Lists directories by reading the server's HTML directory index
pub struct HttpIndex {
    client: reqwest::Client,
    base_url: String,
}

impl HttpIndex {
    /// Create an index for the server at `base_url`
    ///
    /// `timeout` bounds every listing request; when it expires the connection
    /// is dropped and the listing fails.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("flash-b2g/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RemoteIndex for HttpIndex {
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let url = format!("{}{}", self.base_url, path);
        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(parse_index(&body, path))
    }

    fn name(&self) -> &'static str {
        "http-index"
    }
}

/// Extract the entries of directory `dir` from its HTML index, in document order
///
/// Links leaving `dir` (parent, external), sort links (`?C=N;O=D`) and
/// duplicates are skipped. A trailing slash marks a directory.
pub fn parse_index(html: &str, dir: &str) -> Vec<RemoteEntry> {
    let mut entries: Vec<RemoteEntry> = Vec::new();
    for capture in HREF.captures_iter(html) {
        let href = &capture[1];
        if href.starts_with('?') || href.starts_with('#') || href.contains("://") {
            continue;
        }
        let href = href.split(['?', '#']).next().unwrap_or_default();
        let href = match href.strip_prefix('/') {
            Some(_) => match href.strip_prefix(dir) {
                Some(relative) => relative,
                None => continue,
            },
            None => href,
        };
        if href.starts_with("..") {
            continue;
        }
        let is_dir = href.ends_with('/');
        let Some(name) = href.trim_end_matches('/').rsplit('/').next() else {
            continue;
        };
        if name.is_empty() || name == "." || name == ".." {
            continue;
        }
        if entries.iter().any(|e| e.name == name) {
            continue;
        }
        entries.push(RemoteEntry {
            name: name.to_string(),
            is_dir,
        });
    }
    entries
}

/// Streams files over HTTP
///
/// Transfers have no timeout of their own; they run until the body ends or
/// the connection fails.
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    /// Create a source with a fresh HTTP client
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("flash-b2g/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArtifactSource for HttpSource {
    async fn open(&self, url: &str) -> Result<ByteStream> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(std::io::Error::other));
        Ok(stream.boxed())
    }
}
