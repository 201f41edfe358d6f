//! Core types and events for flash-b2g

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A stage of the flashing pipeline
///
/// Steps execute in declaration order. Every error surfaced by
/// [`Flasher::run`](crate::Flasher::run) is tagged with the step that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Turning selector arguments into a pattern and local paths
    Resolve,
    /// Finding the build directory and platform package on the server
    Locate,
    /// Downloading both artifacts
    Fetch,
    /// Checking that both artifacts exist locally
    VerifyLocal,
    /// Waiting for a device to attach
    AwaitDevice,
    /// Backing up the device profile
    BackupProfile,
    /// Running the flash script
    Flash,
    /// Restoring the device profile
    RestoreProfile,
    /// Putting the device into development mode
    Provision,
}

impl Step {
    /// Stable snake_case name of the step
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Resolve => "resolve",
            Step::Locate => "locate",
            Step::Fetch => "fetch",
            Step::VerifyLocal => "verify_local",
            Step::AwaitDevice => "await_device",
            Step::BackupProfile => "backup_profile",
            Step::Flash => "flash",
            Step::RestoreProfile => "restore_profile",
            Step::Provision => "provision",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two downloadable build components
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// UI bundle (fixed name, `gaia.zip`)
    Gaia,
    /// Platform bundle (name discovered in the build directory)
    Gecko,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Gaia => f.write_str("gaia"),
            ArtifactKind::Gecko => f.write_str("gecko"),
        }
    }
}

/// State of a device provisioning session
///
/// Sessions move strictly forward through these states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    /// Waiting for a device to answer
    AwaitingDevice,
    /// System partition remounted and the OS process stopped
    Stopped,
    /// Settings document merged and pushed
    SettingsPatched,
    /// Preferences appended to the profile
    PreferencesPatched,
    /// OS process started again
    Restarted,
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeviceState::AwaitingDevice => "awaiting_device",
            DeviceState::Stopped => "stopped",
            DeviceState::SettingsPatched => "settings_patched",
            DeviceState::PreferencesPatched => "preferences_patched",
            DeviceState::Restarted => "restarted",
        };
        f.write_str(name)
    }
}

/// Which output stream of an external tool a line came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

/// Event emitted while a flash run progresses
///
/// Subscribe with [`Flasher::subscribe`](crate::Flasher::subscribe).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A pipeline step started
    StepStarted {
        /// The step
        step: Step,
    },

    /// A pipeline step finished successfully
    StepCompleted {
        /// The step
        step: Step,
    },

    /// Selectors were resolved
    Resolved {
        /// Directory match pattern source
        pattern: String,
        /// Local UI bundle path
        gaia_path: PathBuf,
        /// Local platform bundle path
        gecko_path: PathBuf,
    },

    /// Build directory and package were found on the server
    Located {
        /// Remote directory holding the build (with trailing slash)
        directory: String,
        /// Discovered platform package name
        artifact: String,
    },

    /// One artifact was fully written to disk
    TransferCompleted {
        /// Which artifact
        artifact: ArtifactKind,
        /// Local destination
        path: PathBuf,
        /// Bytes written
        bytes: u64,
    },

    /// A line of output from an external tool
    ToolOutput {
        /// Tool label (e.g. "shallow_flash")
        tool: String,
        /// Stream the line came from
        stream: OutputStream,
        /// The line, without trailing newline
        line: String,
    },
}
