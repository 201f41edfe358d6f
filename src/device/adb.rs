//! `adb`-backed device shell

use super::{DeviceShell, ShellScript};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Largest stdout accepted from a single adb call
pub const MAX_OUTPUT_BYTES: usize = 512 * 1024;

/// Talks to the attached device through the `adb` binary
///
/// Arguments are passed to adb as a vector; no local shell is involved.
pub struct AdbShell {
    binary_path: PathBuf,
}

impl AdbShell {
    /// Create a shell with an explicit adb binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Path of the adb binary in use
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    async fn adb<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = Command::new(&self.binary_path)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                Error::ExternalTool(format!(
                    "Failed to execute {}: {}",
                    self.binary_path.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ExternalTool(format!(
                "adb exited with {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }
        if output.stdout.len() > MAX_OUTPUT_BYTES {
            return Err(Error::ExternalTool(format!(
                "adb output exceeded {} bytes",
                MAX_OUTPUT_BYTES
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl DeviceShell for AdbShell {
    async fn wait_for_device(&self) -> Result<()> {
        self.adb(["wait-for-device"]).await.map(|_| ())
    }

    async fn remount(&self) -> Result<()> {
        self.adb(["remount"]).await.map(|_| ())
    }

    async fn shell(&self, script: &ShellScript) -> Result<String> {
        let rendered = script.render();
        tracing::debug!(command = %rendered, "adb shell");
        self.adb(["shell", rendered.as_str()]).await
    }

    async fn push(&self, local: &Path, remote: &str) -> Result<()> {
        let args: [&OsStr; 3] = [OsStr::new("push"), local.as_os_str(), OsStr::new(remote)];
        self.adb(args).await.map(|_| ())
    }
}
