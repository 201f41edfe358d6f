//! Error types for flash-b2g
//!
//! Every failure in the pipeline maps to one variant of [`Error`]. Errors raised
//! inside a pipeline step are wrapped in [`Error::Step`] so callers always learn
//! which step failed, while [`Error::root_cause`] gives access to the underlying
//! variant.

use crate::types::{ArtifactKind, DeviceState, Step};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for flash-b2g operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for flash-b2g
#[derive(Debug, Error)]
pub enum Error {
    /// Selector arguments could not be resolved (bad date, missing device)
    #[error("invalid selector: {message}")]
    InvalidSelector {
        /// What was wrong with the input
        message: String,
    },

    /// Listing a remote directory failed or timed out
    #[error("failed to list {path}: {reason}")]
    Listing {
        /// Remote directory that was being listed
        path: String,
        /// Transport error or timeout description
        reason: String,
    },

    /// No entry in the remote listing matched the build pattern
    #[error(
        "could not find a directory matching {pattern} in {path}; verify the device, channel and date"
    )]
    NoMatchingDirectory {
        /// Pattern source that was matched against
        pattern: String,
        /// Remote directory that was listed
        path: String,
    },

    /// The build directory holds no platform package
    #[error("could not find a package ending in {suffix} in {path}")]
    NoArtifactFound {
        /// Remote build directory
        path: String,
        /// Expected filename suffix
        suffix: String,
    },

    /// Downloading an artifact failed
    #[error("transfer of {artifact} from {url} failed: {reason}")]
    TransferFailed {
        /// Which artifact failed
        artifact: ArtifactKind,
        /// Source URL
        url: String,
        /// Network or file I/O error description
        reason: String,
    },

    /// Local-only mode was requested but an artifact is absent
    #[error("local file not found: {}", path.display())]
    MissingLocalArtifact {
        /// Expected local path
        path: PathBuf,
    },

    /// External executable exited unsuccessfully
    #[error("{tool} failed with {}", describe_exit(*code))]
    ProcessFailed {
        /// Tool label
        tool: String,
        /// Exit code (None when terminated by a signal)
        code: Option<i32>,
        /// Last lines of output
        tail: Vec<String>,
    },

    /// A device session step failed on the command channel
    #[error("device step {step} failed: {reason}")]
    DeviceShell {
        /// Device session state being entered
        step: DeviceState,
        /// Underlying shell error
        reason: String,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "remote.base_url")
        key: Option<String>,
    },

    /// External tool could not be started or talked to
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A pipeline step failed
    #[error("{step} failed: {source}")]
    Step {
        /// The failing step
        step: Step,
        /// What went wrong
        #[source]
        source: Box<Error>,
    },
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "termination by signal".to_string(),
    }
}

impl Error {
    /// Tag this error with the pipeline step it came from
    ///
    /// Already-tagged errors keep their original step.
    pub fn at(self, step: Step) -> Self {
        match self {
            Error::Step { .. } => self,
            other => Error::Step {
                step,
                source: Box::new(other),
            },
        }
    }

    /// Step the error was raised in, if it was raised inside the pipeline
    pub fn step(&self) -> Option<Step> {
        match self {
            Error::Step { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The innermost error, with step tagging removed
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Step { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidSelector { .. } => "invalid_selector",
            Error::Listing { .. } => "listing_error",
            Error::NoMatchingDirectory { .. } => "no_matching_directory",
            Error::NoArtifactFound { .. } => "no_artifact_found",
            Error::TransferFailed { .. } => "transfer_failed",
            Error::MissingLocalArtifact { .. } => "missing_local_artifact",
            Error::ProcessFailed { .. } => "process_failed",
            Error::DeviceShell { .. } => "device_shell_error",
            Error::Config { .. } => "config_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Step { source, .. } => source.error_code(),
        }
    }
}
