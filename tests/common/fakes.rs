//! Test doubles for the device and the helper scripts

use async_trait::async_trait;
use flash_b2g::{DeviceShell, Result, ShellScript};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Device shell that records every call and answers `cat` with `{}`
#[derive(Default)]
pub struct RecordingShell {
    calls: Mutex<Vec<String>>,
}

impl RecordingShell {
    /// Calls made so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl DeviceShell for RecordingShell {
    async fn wait_for_device(&self) -> Result<()> {
        self.record("wait-for-device".to_string());
        Ok(())
    }

    async fn remount(&self) -> Result<()> {
        self.record("remount".to_string());
        Ok(())
    }

    async fn shell(&self, script: &ShellScript) -> Result<String> {
        let rendered = script.render();
        self.record(format!("shell {}", rendered));
        if rendered.starts_with("cat ") {
            return Ok("{}".to_string());
        }
        Ok(String::new())
    }

    async fn push(&self, _local: &Path, remote: &str) -> Result<()> {
        self.record(format!("push {}", remote));
        Ok(())
    }
}

/// Install a script that writes its arguments, one per line, to `log` and exits with `exit`
#[cfg(unix)]
pub fn install_script(dir: &Path, name: &str, log: &Path, exit: i32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    let body = format!(
        "#!/bin/sh\nfor a in \"$@\"; do echo \"$a\" >> '{log}'; done\necho \"flashing with {name}\"\necho 'progress: 100%' >&2\nexit {exit}\n",
        log = log.display(),
        name = name,
        exit = exit,
    );
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
