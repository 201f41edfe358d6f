//! Remote build server access
//!
//! The server is reached through two capabilities:
//! - [`RemoteIndex`] lists the entries of a remote directory
//! - [`ArtifactSource`] opens a byte stream for a remote file
//!
//! [`HttpIndex`] and [`HttpSource`] implement both over HTTP. On top of them,
//! [`Locator`] finds the build directory and platform package for a
//! [`MatchPattern`](crate::selector::MatchPattern) and [`Fetcher`] downloads
//! both artifacts concurrently.

mod fetcher;
mod http;
mod locator;


pub use fetcher::{Fetcher, TransferResult, TransferredFile};
pub use http::{HttpIndex, HttpSource, parse_index};
pub use locator::Locator;

use async_trait::async_trait;
use futures::stream::BoxStream;

/// Stream of body chunks for one remote file
pub type ByteStream = BoxStream<'static, std::io::Result<Vec<u8>>>;

/// One entry of a remote directory listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Entry name (no slashes)
    pub name: String,
    /// Whether the entry is a directory
    pub is_dir: bool,
}

impl RemoteEntry {
    /// Directory entry
    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }

    /// File entry
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }
}

/// Lists remote directories
///
/// Entries are returned in the order the server lists them; callers rely on
/// that order for tie-breaking.
#[async_trait]
pub trait RemoteIndex: Send + Sync {
    /// List the entries of the directory at `path` (absolute, trailing slash)
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached or answers with a
    /// failure status.
    async fn list(&self, path: &str) -> crate::Result<Vec<RemoteEntry>>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Opens remote files for reading
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Open a stream over the body of the file at `url`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server answers with a
    /// failure status. Errors while reading the body surface as stream items.
    async fn open(&self, url: &str) -> crate::Result<ByteStream>;
}

/// Where a build lives on the server
///
/// Starts at the base directory, gains the build directory once it is matched
/// and the platform package name once that is discovered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteLocation {
    directory: String,
    build: Option<String>,
    gaia_name: String,
    gecko_name: Option<String>,
}

impl RemoteLocation {
    /// Start at `base_path` with the fixed UI bundle name
    pub fn new(base_path: &str, gaia_name: &str) -> Self {
        let mut directory = base_path.to_string();
        if !directory.ends_with('/') {
            directory.push('/');
        }
        Self {
            directory,
            build: None,
            gaia_name: gaia_name.to_string(),
            gecko_name: None,
        }
    }

    pub(crate) fn enter(&mut self, build: &str) {
        self.directory.push_str(build.trim_matches('/'));
        self.directory.push('/');
        self.build = Some(build.trim_matches('/').to_string());
    }

    pub(crate) fn set_gecko(&mut self, name: &str) {
        self.gecko_name = Some(name.to_string());
    }

    /// Current remote directory (absolute, trailing slash)
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Matched build directory name
    pub fn build(&self) -> Option<&str> {
        self.build.as_deref()
    }

    /// Fixed UI bundle name
    pub fn gaia_name(&self) -> &str {
        &self.gaia_name
    }

    /// Discovered platform bundle name
    pub fn gecko_name(&self) -> Option<&str> {
        self.gecko_name.as_deref()
    }

    /// Full URL of a file in the current directory
    pub fn url(&self, base_url: &str, name: &str) -> String {
        format!("{}{}{}", base_url.trim_end_matches('/'), self.directory, name)
    }
}
