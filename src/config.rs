//! Configuration types for flash-b2g

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Remote build server settings
///
/// Groups settings for where nightly builds are listed and downloaded from.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Server root URL (default: "http://ftp.mozilla.org")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Directory holding one subdirectory per nightly build
    /// (default: "/pub/mozilla.org/b2g/nightly/")
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// Timeout for a single directory listing (default: 1 hour)
    ///
    /// When it expires the request is dropped and the listing fails. It is not
    /// retried.
    #[serde(default = "default_listing_timeout", with = "duration_serde")]
    pub listing_timeout: Duration,

    /// Fixed name of the UI bundle inside a build directory (default: "gaia.zip")
    #[serde(default = "default_gaia_name")]
    pub gaia_name: String,

    /// Suffix identifying the platform bundle (default: "android-arm.tar.gz")
    #[serde(default = "default_gecko_suffix")]
    pub gecko_suffix: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            base_path: default_base_path(),
            listing_timeout: default_listing_timeout(),
            gaia_name: default_gaia_name(),
            gecko_suffix: default_gecko_suffix(),
        }
    }
}

/// Convention for passing values to optional script flags
///
/// Linux getopt only accepts `--opt=value` for options with optional
/// arguments, other platforms want `--opt value`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagStyle {
    /// `--gaia=/path`
    Equals,
    /// `--gaia /path`
    Space,
}

impl Default for FlagStyle {
    fn default() -> Self {
        if cfg!(target_os = "linux") {
            FlagStyle::Equals
        } else {
            FlagStyle::Space
        }
    }
}

impl FlagStyle {
    /// Render a flag with a value as one or two arguments
    pub fn option(&self, flag: &str, value: impl AsRef<Path>) -> Vec<String> {
        let value = value.as_ref().display().to_string();
        match self {
            FlagStyle::Equals => vec![format!("{}={}", flag, value)],
            FlagStyle::Space => vec![flag.to_string(), value],
        }
    }
}

/// External tool paths
///
/// Groups settings for the flash and backup scripts and the `adb` binary.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Directory holding the helper scripts (default: "./scripts")
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: PathBuf,

    /// Flash script path (default: `<scripts_dir>/shallow_flash.sh`)
    #[serde(default)]
    pub flash_script: Option<PathBuf>,

    /// Profile backup script path (default: `<scripts_dir>/backup_restore_profile.sh`)
    #[serde(default)]
    pub backup_script: Option<PathBuf>,

    /// Path to adb executable (falls back to the `ADB` environment variable, then PATH)
    #[serde(default)]
    pub adb_path: Option<PathBuf>,

    /// Whether to search PATH for adb if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Flag convention for the scripts (default depends on the host OS)
    #[serde(default)]
    pub flag_style: FlagStyle,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            scripts_dir: default_scripts_dir(),
            flash_script: None,
            backup_script: None,
            adb_path: None,
            search_path: true,
            flag_style: FlagStyle::default(),
        }
    }
}

impl ToolsConfig {
    /// Flash script to execute
    ///
    /// Relative paths are resolved against the current directory; the script
    /// runs inside the staging directory, where they would no longer hold.
    pub fn flash_script(&self) -> PathBuf {
        resolve_script(
            self.flash_script
                .clone()
                .unwrap_or_else(|| self.scripts_dir.join("shallow_flash.sh")),
        )
    }

    /// Backup/restore script to execute, resolved like [`Self::flash_script`]
    pub fn backup_script(&self) -> PathBuf {
        resolve_script(
            self.backup_script
                .clone()
                .unwrap_or_else(|| self.scripts_dir.join("backup_restore_profile.sh")),
        )
    }

    /// Locate the adb binary
    ///
    /// Order: explicit `adb_path`, the `ADB` environment variable, a PATH
    /// search (when enabled), and finally the bare name `adb`.
    pub fn adb(&self) -> PathBuf {
        if let Some(path) = &self.adb_path {
            return path.clone();
        }
        if let Some(path) = std::env::var_os("ADB").filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }
        if self.search_path
            && let Ok(path) = which::which("adb")
        {
            return path;
        }
        PathBuf::from("adb")
    }
}

/// On-device paths and the overrides applied when enabling development mode
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Settings document on the device
    #[serde(default = "default_settings_path")]
    pub settings_path: String,

    /// Glob matching the active profile directory
    #[serde(default = "default_profile_glob")]
    pub profile_glob: String,

    /// Preferences file inside the profile directory
    #[serde(default = "default_prefs_file")]
    pub prefs_file: String,

    /// Name of the OS service to stop and start
    #[serde(default = "default_service")]
    pub service: String,

    /// Keys merged into the top level of the settings document
    #[serde(default = "default_settings_overrides")]
    pub settings: Map<String, Value>,

    /// Preferences appended to the preferences file
    #[serde(default = "default_prefs")]
    pub prefs: Map<String, Value>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            settings_path: default_settings_path(),
            profile_glob: default_profile_glob(),
            prefs_file: default_prefs_file(),
            service: default_service(),
            settings: default_settings_overrides(),
            prefs: default_prefs(),
        }
    }
}

/// Main configuration for [`Flasher`](crate::Flasher)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Build server settings
    #[serde(default)]
    pub remote: RemoteConfig,

    /// External tool paths
    #[serde(default)]
    pub tools: ToolsConfig,

    /// On-device paths and development-mode overrides
    #[serde(default)]
    pub device: DeviceConfig,
}

impl Config {
    /// Load configuration from a JSON file
    ///
    /// Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&content).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that cannot be caught by deserialization
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.remote.base_url).map_err(|e| Error::Config {
            message: format!("invalid base URL {}: {}", self.remote.base_url, e),
            key: Some("remote.base_url".to_string()),
        })?;
        if !self.remote.base_path.starts_with('/') {
            return Err(Error::Config {
                message: format!("base path must be absolute: {}", self.remote.base_path),
                key: Some("remote.base_path".to_string()),
            });
        }
        if self.remote.gecko_suffix.is_empty() {
            return Err(Error::Config {
                message: "platform package suffix must not be empty".to_string(),
                key: Some("remote.gecko_suffix".to_string()),
            });
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "http://ftp.mozilla.org".to_string()
}

fn default_base_path() -> String {
    "/pub/mozilla.org/b2g/nightly/".to_string()
}

fn default_listing_timeout() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_gaia_name() -> String {
    "gaia.zip".to_string()
}

fn default_gecko_suffix() -> String {
    "android-arm.tar.gz".to_string()
}

fn default_scripts_dir() -> PathBuf {
    PathBuf::from("./scripts")
}

/// Anchor a script path to the current directory
///
/// A bare program name is left alone so it is still looked up on PATH.
fn resolve_script(path: PathBuf) -> PathBuf {
    if path.is_absolute() || path.components().count() < 2 {
        return path;
    }
    match std::path::absolute(&path) {
        Ok(absolute) => absolute,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot resolve script path");
            path
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_settings_path() -> String {
    "/system/b2g/defaults/settings.json".to_string()
}

fn default_profile_glob() -> String {
    "/data/b2g/mozilla/*.default/".to_string()
}

fn default_prefs_file() -> String {
    "prefs.js".to_string()
}

fn default_service() -> String {
    "b2g".to_string()
}

fn default_settings_overrides() -> Map<String, Value> {
    let mut settings = Map::new();
    settings.insert("developer.menu.enabled".into(), json!(true));
    settings.insert("ftu.manifestURL".into(), Value::Null);
    settings.insert("debugger.remote-mode".into(), json!("adb-devtools"));
    settings.insert("devtools.debugger.remote-enabled".into(), json!(true));
    // 10 minutes
    settings.insert("screen.timeout".into(), json!(600));
    settings.insert("lockscreen.locked".into(), json!(false));
    settings.insert("lockscreen.enabled".into(), json!(false));
    settings
}

fn default_prefs() -> Map<String, Value> {
    let mut prefs = Map::new();
    prefs.insert(
        "devtools.debugger.forbid-certified-apps".into(),
        json!(false),
    );
    prefs.insert("devtools.debugger.prompt-connection".into(), json!(false));
    prefs.insert("b2g.adb.timeout".into(), json!(0));
    // less noise in logcat
    prefs.insert("layout.css.report_errors".into(), json!(false));
    prefs
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_yields_defaults() {
        let config: Config = serde_json::from_str("{}").expect("deserialize failed");
        assert_eq!(config.remote.base_url, "http://ftp.mozilla.org");
        assert_eq!(config.remote.base_path, "/pub/mozilla.org/b2g/nightly/");
        assert_eq!(config.remote.listing_timeout, Duration::from_secs(3600));
        assert_eq!(config.remote.gaia_name, "gaia.zip");
        assert_eq!(config.device.settings.len(), 7);
        assert_eq!(config.device.prefs.len(), 4);
        config.validate().expect("defaults must validate");
    }

    #[test]
    fn test_partial_json_keeps_other_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"remote": {"base_url": "https://archive.mozilla.org", "listing_timeout": 30}}"#,
        )
        .unwrap();
        assert_eq!(config.remote.base_url, "https://archive.mozilla.org");
        assert_eq!(config.remote.listing_timeout, Duration::from_secs(30));
        assert_eq!(config.remote.gecko_suffix, "android-arm.tar.gz");
        assert_eq!(config.tools.scripts_dir, PathBuf::from("./scripts"));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = Config::default();
        config.remote.base_url = "not a url".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config { key: Some(ref k), .. } if k == "remote.base_url"));
    }

    #[test]
    fn test_validate_rejects_relative_base_path() {
        let mut config = Config::default();
        config.remote.base_path = "pub/b2g/".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_relative_scripts_dir_resolves_against_current_dir() {
        let cwd = std::env::current_dir().unwrap();
        let tools = ToolsConfig::default();

        let flash = tools.flash_script();
        assert!(flash.is_absolute());
        assert_eq!(flash, cwd.join("scripts").join("shallow_flash.sh"));
        assert_eq!(
            tools.backup_script(),
            cwd.join("scripts").join("backup_restore_profile.sh")
        );
    }

    #[test]
    fn test_bare_script_name_is_left_for_path_lookup() {
        let tools = ToolsConfig {
            flash_script: Some(PathBuf::from("shallow_flash")),
            ..Default::default()
        };
        assert_eq!(tools.flash_script(), PathBuf::from("shallow_flash"));
    }

    #[test]
    fn test_script_paths_follow_scripts_dir() {
        let mut tools = ToolsConfig {
            scripts_dir: PathBuf::from("/opt/b2g-scripts"),
            ..Default::default()
        };
        assert_eq!(
            tools.flash_script(),
            PathBuf::from("/opt/b2g-scripts/shallow_flash.sh")
        );
        assert_eq!(
            tools.backup_script(),
            PathBuf::from("/opt/b2g-scripts/backup_restore_profile.sh")
        );

        tools.flash_script = Some(PathBuf::from("/usr/local/bin/flash"));
        assert_eq!(tools.flash_script(), PathBuf::from("/usr/local/bin/flash"));
    }

    #[test]
    fn test_explicit_adb_path_wins() {
        let tools = ToolsConfig {
            adb_path: Some(PathBuf::from("/sdk/platform-tools/adb")),
            ..Default::default()
        };
        assert_eq!(tools.adb(), PathBuf::from("/sdk/platform-tools/adb"));
    }

    #[test]
    fn test_flag_styles() {
        assert_eq!(
            FlagStyle::Equals.option("--gaia", "/tmp/gaia.zip"),
            vec!["--gaia=/tmp/gaia.zip".to_string()]
        );
        assert_eq!(
            FlagStyle::Space.option("--gecko", "/tmp/b2g.tar.gz"),
            vec!["--gecko".to_string(), "/tmp/b2g.tar.gz".to_string()]
        );
    }

    #[test]
    fn test_from_file_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flash-b2g.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert_eq!(err.error_code(), "config_error");
    }
}
