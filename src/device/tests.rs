use super::*;
use serde_json::json;
use std::sync::Mutex;

/// Records every call; fails the first call whose description contains `fail_on`
#[derive(Default)]
struct RecordingShell {
    calls: Mutex<Vec<String>>,
    pushed: Mutex<Option<String>>,
    settings: String,
    fail_on: Option<String>,
}

impl RecordingShell {
    fn with_settings(settings: &str) -> Self {
        Self {
            settings: settings.to_string(),
            ..Default::default()
        }
    }

    fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    fn record(&self, call: String) -> Result<()> {
        let fail = self
            .fail_on
            .as_deref()
            .is_some_and(|needle| call.contains(needle));
        self.calls.lock().unwrap().push(call.clone());
        if fail {
            return Err(Error::ExternalTool(format!("device refused: {call}")));
        }
        Ok(())
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeviceShell for RecordingShell {
    async fn wait_for_device(&self) -> Result<()> {
        self.record("wait-for-device".to_string())
    }

    async fn remount(&self) -> Result<()> {
        self.record("remount".to_string())
    }

    async fn shell(&self, script: &ShellScript) -> Result<String> {
        let rendered = script.render();
        self.record(format!("shell {rendered}"))?;
        if rendered.starts_with("cat ") {
            return Ok(self.settings.clone());
        }
        Ok(String::new())
    }

    async fn push(&self, local: &Path, remote: &str) -> Result<()> {
        // the scratch file is gone once provision returns
        let content = std::fs::read_to_string(local).unwrap();
        *self.pushed.lock().unwrap() = Some(content);
        self.record(format!("push {remote}"))
    }
}

fn session(shell: &Arc<RecordingShell>) -> DeviceSession {
    DeviceSession::new(shell.clone(), DeviceConfig::default())
}

#[tokio::test]
async fn test_provision_runs_full_sequence() {
    let shell = Arc::new(RecordingShell::with_settings(
        r#"{"language.current": "en-US", "screen.timeout": 60}"#,
    ));
    let mut session = session(&shell);

    session.provision().await.unwrap();

    assert_eq!(session.state(), Some(DeviceState::Restarted));
    let calls = shell.calls();
    assert_eq!(
        calls,
        vec![
            "wait-for-device".to_string(),
            "remount".to_string(),
            "shell stop b2g".to_string(),
            "shell cat /system/b2g/defaults/settings.json".to_string(),
            "shell mount -o rw,remount /system".to_string(),
            "push /system/b2g/defaults/settings.json".to_string(),
            "shell mount -o ro,remount /system".to_string(),
            format!("shell {}", prefs_script(&DeviceConfig::default()).render()),
            "shell sync".to_string(),
            "shell start b2g".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_pushed_settings_keep_unrelated_keys() {
    let shell = Arc::new(RecordingShell::with_settings(
        r#"{"language.current": "en-US", "screen.timeout": 60}"#,
    ));
    session(&shell).provision().await.unwrap();

    let pushed = shell.pushed.lock().unwrap().clone().unwrap();
    let document: Value = serde_json::from_str(&pushed).unwrap();
    assert_eq!(document["language.current"], json!("en-US"));
    assert_eq!(document["screen.timeout"], json!(600));
    assert_eq!(document["developer.menu.enabled"], json!(true));
    assert_eq!(document["debugger.remote-mode"], json!("adb-devtools"));
    assert!(document["ftu.manifestURL"].is_null());
}

#[tokio::test]
async fn test_failure_reports_unreached_state_and_stops() {
    let shell = Arc::new(RecordingShell::with_settings("{}").failing_on("shell stop"));
    let mut session = session(&shell);

    let err = session.provision().await.unwrap_err();

    assert!(matches!(
        err,
        Error::DeviceShell {
            step: DeviceState::Stopped,
            ..
        }
    ));
    assert_eq!(session.state(), Some(DeviceState::AwaitingDevice));
    assert_eq!(shell.calls().last().unwrap(), "shell stop b2g");
}

#[tokio::test]
async fn test_restart_failure_leaves_device_patched() {
    let shell = Arc::new(RecordingShell::with_settings("{}").failing_on("shell start"));
    let mut session = session(&shell);

    let err = session.provision().await.unwrap_err();

    assert!(matches!(
        err,
        Error::DeviceShell {
            step: DeviceState::Restarted,
            ..
        }
    ));
    assert_eq!(session.state(), Some(DeviceState::PreferencesPatched));
}

#[tokio::test]
async fn test_no_device_means_nothing_else_runs() {
    let shell = Arc::new(RecordingShell::with_settings("{}").failing_on("wait-for-device"));
    let mut session = session(&shell);

    let err = session.provision().await.unwrap_err();

    assert!(matches!(
        err,
        Error::DeviceShell {
            step: DeviceState::AwaitingDevice,
            ..
        }
    ));
    assert_eq!(session.state(), None);
    assert_eq!(shell.calls().len(), 1);
}

#[tokio::test]
async fn test_non_object_settings_document_is_not_pushed() {
    let shell = Arc::new(RecordingShell::with_settings("[1, 2, 3]"));
    let mut session = session(&shell);

    let err = session.provision().await.unwrap_err();

    assert!(matches!(
        err,
        Error::DeviceShell {
            step: DeviceState::SettingsPatched,
            ..
        }
    ));
    assert!(shell.pushed.lock().unwrap().is_none());
}

#[test]
fn test_merge_settings_overrides_top_level_keys() {
    let mut overrides = Map::new();
    overrides.insert("a".into(), json!(2));
    overrides.insert("c".into(), json!({"nested": true}));

    let merged = merge_settings(r#"{"a": 1, "b": "keep"}"#, &overrides).unwrap();
    assert_eq!(merged, json!({"a": 2, "b": "keep", "c": {"nested": true}}));
}

#[test]
fn test_merge_settings_rejects_invalid_json() {
    let err = merge_settings("not json", &Map::new()).unwrap_err();
    assert_eq!(err.error_code(), "serialization_error");
}

#[test]
fn test_pref_line_is_json_encoded() {
    assert_eq!(
        pref_line("b2g.adb.timeout", &json!(0)),
        r#"user_pref("b2g.adb.timeout", 0);"#
    );
    assert_eq!(
        pref_line("devtools.debugger.prompt-connection", &json!(false)),
        r#"user_pref("devtools.debugger.prompt-connection", false);"#
    );
}

#[test]
fn test_prefs_script_enters_profile_then_appends() {
    let mut config = DeviceConfig::default();
    config.prefs = Map::new();
    config.prefs.insert("b2g.adb.timeout".into(), json!(0));

    assert_eq!(
        prefs_script(&config).render(),
        r#"cd /data/b2g/mozilla/*.default/ && echo 'user_pref("b2g.adb.timeout", 0);' >> prefs.js"#
    );
}
