//! Device provisioning
//!
//! A [`DeviceSession`] puts a freshly flashed device into development mode: it
//! stops the OS, merges debugging overrides into the settings document,
//! appends debugging preferences to the active profile and starts the OS
//! again. All device access goes through the [`DeviceShell`] trait; [`AdbShell`]
//! implements it with the `adb` binary.

mod adb;
mod command;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use adb::{AdbShell, MAX_OUTPUT_BYTES};
pub use command::{ShellCommand, ShellScript};

use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::types::DeviceState;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

/// Request/response command channel to the attached device
#[async_trait]
pub trait DeviceShell: Send + Sync {
    /// Block until a device is attached
    async fn wait_for_device(&self) -> crate::Result<()>;

    /// Remount the system partition read-write
    async fn remount(&self) -> crate::Result<()>;

    /// Run a script in the device shell and return its stdout
    async fn shell(&self, script: &ShellScript) -> crate::Result<String>;

    /// Copy a local file onto the device
    async fn push(&self, local: &Path, remote: &str) -> crate::Result<()>;
}

/// Linear provisioning sequence against one device
///
/// No step is retried and nothing is rolled back: if a later step fails the
/// device stays in whatever state the earlier steps left it (for example
/// stopped, when restarting fails).
pub struct DeviceSession {
    shell: Arc<dyn DeviceShell>,
    config: DeviceConfig,
    state: Option<DeviceState>,
}

impl DeviceSession {
    /// Create a session
    pub fn new(shell: Arc<dyn DeviceShell>, config: DeviceConfig) -> Self {
        Self {
            shell,
            config,
            state: None,
        }
    }

    /// Last state reached, None before the device answered
    pub fn state(&self) -> Option<DeviceState> {
        self.state
    }

    /// Run the whole sequence
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceShell`] naming the state that could not be
    /// reached.
    pub async fn provision(&mut self) -> Result<()> {
        tracing::info!("waiting for device (is remote debugging on?)");
        let result = self.shell.wait_for_device().await;
        self.advance(DeviceState::AwaitingDevice, result)?;

        tracing::info!(service = %self.config.service, "stopping system");
        let result = self.stop().await;
        self.advance(DeviceState::Stopped, result)?;

        tracing::info!(settings = ?self.config.settings, "patching settings");
        let result = self.patch_settings().await;
        self.advance(DeviceState::SettingsPatched, result)?;

        tracing::info!(prefs = ?self.config.prefs, "appending preferences");
        let result = self
            .shell
            .shell(&prefs_script(&self.config))
            .await
            .map(|_| ());
        self.advance(DeviceState::PreferencesPatched, result)?;

        tracing::info!("restarting system");
        let result = self.restart().await;
        self.advance(DeviceState::Restarted, result)
    }

    fn advance(&mut self, target: DeviceState, result: Result<()>) -> Result<()> {
        result.map_err(|e| Error::DeviceShell {
            step: target,
            reason: e.to_string(),
        })?;
        tracing::debug!(state = %target, "device state reached");
        self.state = Some(target);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.shell.remount().await?;
        self.shell
            .shell(&ShellCommand::new("stop").arg(&self.config.service).into())
            .await?;
        Ok(())
    }

    async fn patch_settings(&self) -> Result<()> {
        let config = &self.config;
        let raw = self
            .shell
            .shell(&ShellCommand::new("cat").arg(&config.settings_path).into())
            .await?;
        let merged = merge_settings(&raw, &config.settings)?;

        let scratch = tempfile::Builder::new().prefix("flash-b2g").tempdir()?;
        let local = scratch.path().join("settings.json");
        tokio::fs::write(&local, serde_json::to_vec(&merged)?).await?;

        self.shell.shell(&remount_system("rw")).await?;
        self.shell.push(&local, &config.settings_path).await?;
        self.shell.shell(&remount_system("ro")).await?;
        Ok(())
    }

    async fn restart(&self) -> Result<()> {
        self.shell.shell(&ShellCommand::new("sync").into()).await?;
        self.shell
            .shell(&ShellCommand::new("start").arg(&self.config.service).into())
            .await?;
        Ok(())
    }
}

fn remount_system(mode: &str) -> ShellScript {
    ShellCommand::new("mount")
        .args(["-o".to_string(), format!("{},remount", mode)])
        .arg("/system")
        .into()
}

/// Merge `overrides` into the top level of the settings document `raw`
pub fn merge_settings(raw: &str, overrides: &Map<String, Value>) -> Result<Value> {
    let mut document: Value = serde_json::from_str(raw)?;
    let Some(object) = document.as_object_mut() else {
        return Err(Error::ExternalTool(
            "settings document is not a JSON object".to_string(),
        ));
    };
    for (key, value) in overrides {
        object.insert(key.clone(), value.clone());
    }
    Ok(document)
}

/// One `user_pref(...)` line with JSON-encoded key and value
pub fn pref_line(key: &str, value: &Value) -> String {
    format!("user_pref({}, {});", Value::String(key.to_string()), value)
}

/// Script appending every preference to the active profile's prefs file
pub fn prefs_script(config: &DeviceConfig) -> ShellScript {
    let mut script = ShellScript::new().then(ShellCommand::new("cd").glob(&config.profile_glob));
    for (key, value) in &config.prefs {
        script = script.then(
            ShellCommand::new("echo")
                .arg(pref_line(key, value))
                .append_to(&config.prefs_file),
        );
    }
    script
}
