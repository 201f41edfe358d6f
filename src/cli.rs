//! CLI argument parsing

use crate::config::Config;
use crate::error::Result;
use crate::pipeline::FlashRequest;
use crate::selector::SelectorArgs;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "flash-b2g")]
#[command(version, about = "Flash nightly B2G builds onto a device", long_about = None)]
pub struct Cli {
    /// Device name (flame, helix, hamachi, ...)
    #[arg(value_name = "DEVICE")]
    pub device_positional: Option<String>,

    /// Channel name or version (central, aurora, 1.4, 2, ...)
    #[arg(value_name = "CHANNEL")]
    pub channel_positional: Option<String>,

    /// Device name
    #[arg(short = 'i', long = "device")]
    pub device: Option<String>,

    /// Channel name or version [default: central]
    #[arg(short, long)]
    pub channel: Option<String>,

    /// Build date (YYYY-MM-DD) [default: latest]
    #[arg(short = 't', long)]
    pub date: Option<String>,

    /// Engineering build
    #[arg(short, long)]
    pub eng: bool,

    /// Directory to keep downloads in [default: temporary directory]
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Use the files already in --dir instead of downloading
    #[arg(short, long, requires = "dir")]
    pub local: bool,

    /// Back up the device profile before flashing and restore it afterwards
    #[arg(short, long)]
    pub profile: bool,

    /// Keep the device profile across the flash
    #[arg(long)]
    pub keep_profile: bool,

    /// Enable development mode after flashing
    #[arg(short, long)]
    pub remotify: bool,

    /// Only enable development mode, do not flash
    #[arg(long, conflicts_with_all = ["local", "profile", "keep_profile"])]
    pub only_remotify: bool,

    /// Configuration file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Build server URL (overrides the configuration)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Directory holding the flash and backup scripts (overrides the configuration)
    #[arg(long)]
    pub scripts_dir: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Device name, flag first
    pub fn device_name(&self) -> Option<&str> {
        self.device
            .as_deref()
            .or(self.device_positional.as_deref())
    }

    /// Channel, flag first
    pub fn channel_name(&self) -> Option<&str> {
        self.channel
            .as_deref()
            .or(self.channel_positional.as_deref())
    }

    /// Default log filter for the verbosity level
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Load the configuration file (or defaults) and apply overrides
    ///
    /// # Errors
    /// Returns error if the file cannot be read or the result is invalid
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(base_url) = &self.base_url {
            config.remote.base_url = base_url.clone();
        }
        if let Some(scripts_dir) = &self.scripts_dir {
            config.tools.scripts_dir = scripts_dir.clone();
        }
        config.validate()?;
        Ok(config)
    }

    /// Build the request for one run
    ///
    /// A relative `--dir` is resolved against the current directory.
    pub fn request(&self) -> FlashRequest {
        FlashRequest {
            selector: SelectorArgs {
                device: self.device_name().unwrap_or_default().to_string(),
                channel: self.channel_name().map(str::to_string),
                date: self.date.clone(),
                eng: self.eng,
            },
            dir: self
                .dir
                .as_deref()
                .map(|dir| std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf())),
            local: self.local,
            backup_profile: self.profile,
            keep_profile: self.keep_profile,
            remotify: self.remotify,
            only_remotify: self.only_remotify,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("flash-b2g").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_positional_selectors() {
        let request = parse(&["flame", "1.4"]).request();
        assert_eq!(request.selector.device, "flame");
        assert_eq!(request.selector.channel.as_deref(), Some("1.4"));
        assert_eq!(request.selector.date, None);
        assert!(!request.selector.eng);
        assert!(request.dir.is_none());
    }

    #[test]
    fn test_flags_win_over_positionals() {
        let cli = parse(&["flame", "central", "-i", "helix", "-c", "aurora", "-t", "2014-05-01", "-e"]);
        let request = cli.request();
        assert_eq!(request.selector.device, "helix");
        assert_eq!(request.selector.channel.as_deref(), Some("aurora"));
        assert_eq!(request.selector.date.as_deref(), Some("2014-05-01"));
        assert!(request.selector.eng);
    }

    #[test]
    fn test_local_requires_dir() {
        let err = Cli::try_parse_from(["flash-b2g", "flame", "-l"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let request = parse(&["flame", "-l", "-d", "/tmp/b2g"]).request();
        assert!(request.local);
        assert_eq!(request.dir, Some(PathBuf::from("/tmp/b2g")));
    }

    #[test]
    fn test_relative_dir_resolves_to_absolute_paths() {
        let cwd = std::env::current_dir().unwrap();
        let request = parse(&["flame", "1.4", "-d", "downloads"]).request();

        let dir = request.dir.unwrap();
        assert!(dir.is_absolute());
        assert_eq!(dir, cwd.join("downloads"));

        let resolved = crate::selector::resolve(&request.selector, &dir).unwrap();
        assert!(resolved.paths.gaia.is_absolute());
        assert_eq!(
            resolved.paths.gecko,
            cwd.join("downloads").join("b2g-flame-1.4-latest.tar.gz")
        );
    }

    #[test]
    fn test_profile_and_remotify_flags() {
        let request = parse(&["flame", "-p", "--keep-profile", "-r"]).request();
        assert!(request.backup_profile);
        assert!(request.keep_profile);
        assert!(request.remotify);
        assert!(!request.only_remotify);

        let request = parse(&["--only-remotify"]).request();
        assert!(request.only_remotify);
        assert!(request.selector.device.is_empty());
    }

    #[test]
    fn test_verbosity_sets_log_level() {
        assert_eq!(parse(&["flame"]).log_level(), "info");
        assert_eq!(parse(&["flame", "-v"]).log_level(), "debug");
        assert_eq!(parse(&["flame", "-vv"]).log_level(), "trace");
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let config = parse(&[
            "flame",
            "--base-url",
            "http://mirror.example.org",
            "--scripts-dir",
            "/opt/b2g/scripts",
        ])
        .load_config()
        .unwrap();
        assert_eq!(config.remote.base_url, "http://mirror.example.org");
        assert_eq!(
            config.tools.flash_script(),
            PathBuf::from("/opt/b2g/scripts/shallow_flash.sh")
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let err = parse(&["flame", "--base-url", "not a url"])
            .load_config()
            .unwrap_err();
        assert_eq!(err.error_code(), "config_error");
    }
}
