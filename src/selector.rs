//! Build selector resolution
//!
//! Turns the user's device/channel/date/eng arguments into the pattern used to
//! pick a nightly build directory and the local paths both artifacts are stored
//! under. Everything here is pure: the same input always yields the same
//! [`MatchPattern`] and [`ArtifactPaths`].

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate};
use regex::{Regex, RegexBuilder};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Channel used when none is given
pub const DEFAULT_CHANNEL: &str = "central";

#[allow(clippy::expect_used)]
static UNSAFE_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w.-]+").expect("static regex"));

/// Raw selector arguments as given by the user
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectorArgs {
    /// Device name (case-insensitive)
    pub device: String,
    /// Channel name or version (None = "central")
    pub channel: Option<String>,
    /// Build date, "latest" or None for the latest build
    pub date: Option<String>,
    /// Engineering build
    pub eng: bool,
}

/// Which build date to look for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildDate {
    /// The `latest-*` directories
    Latest,
    /// A dated nightly
    On(NaiveDate),
}

impl BuildDate {
    /// Parse a date argument
    ///
    /// Accepts `latest`, `YYYY-MM-DD` and RFC 3339 timestamps.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("latest") {
            return Ok(BuildDate::Latest);
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Ok(BuildDate::On(date));
        }
        if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
            return Ok(BuildDate::On(timestamp.date_naive()));
        }
        Err(Error::InvalidSelector {
            message: format!("invalid date `{}` (expected YYYY-MM-DD or latest)", raw),
        })
    }

    fn segment(&self) -> String {
        match self {
            BuildDate::Latest => "latest".to_string(),
            BuildDate::On(date) => date.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Normalized build selector
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    /// Lower-cased device name
    pub device: String,
    /// Normalized channel (`"2"` becomes `"2.0"`)
    pub channel: String,
    /// Build date
    pub date: BuildDate,
    /// Engineering build
    pub engineering_build: bool,
}

impl Selector {
    /// Normalize raw arguments
    pub fn from_args(args: &SelectorArgs) -> Result<Self> {
        let device = args.device.trim().to_lowercase();
        if device.is_empty() {
            return Err(Error::InvalidSelector {
                message: "a device is required (flame, helix, hamachi, ...)".to_string(),
            });
        }
        let date = match &args.date {
            Some(raw) => BuildDate::parse(raw)?,
            None => BuildDate::Latest,
        };
        Ok(Self {
            device,
            channel: normalize_channel(args.channel.as_deref().unwrap_or(DEFAULT_CHANNEL)),
            date,
            engineering_build: args.eng,
        })
    }

    /// Whether the channel names a version rather than a branch
    pub fn is_versioned(&self) -> bool {
        self.channel.chars().any(|c| c.is_ascii_digit())
    }

    fn channel_segment(&self) -> String {
        if self.is_versioned() {
            format!(".*v{}", regex::escape(&self.channel.replace('.', "_")))
        } else {
            regex::escape(&self.channel)
        }
    }

    /// Build the directory match pattern
    pub fn pattern(&self) -> Result<MatchPattern> {
        let mut segments = vec![
            self.date.segment(),
            ".*".to_string(),
            self.channel_segment(),
            regex::escape(&self.device),
        ];
        if self.engineering_build {
            segments.push("eng".to_string());
        }
        MatchPattern::new(&format!("^{}$", segments.join("-")))
    }

    /// Local artifact paths inside `dir`
    pub fn artifact_paths(&self, dir: &Path) -> ArtifactPaths {
        let mut bits = vec![self.device.clone(), self.channel.clone()];
        if self.engineering_build {
            bits.push("eng".to_string());
        }
        bits.push(self.date.segment());
        let name = sanitize_name(&bits.join("-"));
        ArtifactPaths {
            gaia: dir.join(format!("gaia-{}.zip", name)),
            gecko: dir.join(format!("b2g-{}.tar.gz", name)),
        }
    }
}

/// Anchored, case-insensitive build directory pattern
#[derive(Clone, Debug)]
pub struct MatchPattern {
    regex: Regex,
}

impl MatchPattern {
    pub(crate) fn new(source: &str) -> Result<Self> {
        let regex = RegexBuilder::new(source)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::InvalidSelector {
                message: format!("cannot build pattern {}: {}", source, e),
            })?;
        Ok(Self { regex })
    }

    /// Pattern source
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Whether a directory name matches in full
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

impl PartialEq for MatchPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for MatchPattern {}

impl std::fmt::Display for MatchPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/i", self.as_str())
    }
}

/// Local destinations of both artifacts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// UI bundle (`gaia-<bits>.zip`)
    pub gaia: PathBuf,
    /// Platform bundle (`b2g-<bits>.tar.gz`)
    pub gecko: PathBuf,
}

impl ArtifactPaths {
    /// First path that does not exist on disk
    pub fn first_missing(&self) -> Option<&Path> {
        [self.gaia.as_path(), self.gecko.as_path()]
            .into_iter()
            .find(|path| !path.is_file())
    }
}

/// Everything derived from one set of selector arguments
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    /// Normalized selector
    pub selector: Selector,
    /// Build directory pattern
    pub pattern: MatchPattern,
    /// Local artifact paths
    pub paths: ArtifactPaths,
}

/// Resolve selector arguments against a staging directory
pub fn resolve(args: &SelectorArgs, dir: &Path) -> Result<Resolved> {
    let selector = Selector::from_args(args)?;
    let pattern = selector.pattern()?;
    let paths = selector.artifact_paths(dir);
    Ok(Resolved {
        selector,
        pattern,
        paths,
    })
}

/// A bare integer channel is a release line: `2` means `2.0`
pub fn normalize_channel(raw: &str) -> String {
    let channel = raw.trim();
    if !channel.is_empty() && channel.chars().all(|c| c.is_ascii_digit()) {
        format!("{}.0", channel)
    } else {
        channel.to_string()
    }
}

fn sanitize_name(name: &str) -> String {
    UNSAFE_NAME_CHARS.replace_all(name, "_").into_owned()
}
