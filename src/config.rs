//! Configuration types for timeline-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::PathBuf, time::Duration};

/// Variables recognised in [`Config::filename_format`]
pub const FILENAME_VARIABLES: &[&str] = &["iso_date", "time", "title", "doc_num", "subtitle", "id"];

/// Log verbosity for a run
///
/// Passed explicitly to [`crate::logging::init`] and to the components that
/// adjust their diagnostics to it, instead of living in process-wide state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Warnings and errors only
    Warning,
    /// Progress messages (default)
    #[default]
    Info,
    /// Per-event and per-document diagnostics
    Debug,
}

impl Verbosity {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_directive(&self) -> &'static str {
        match self {
            Verbosity::Warning => "warn",
            Verbosity::Info => "info",
            Verbosity::Debug => "debug",
        }
    }

    /// Whether full payload dumps should be attached to diagnostics
    pub fn is_debug(&self) -> bool {
        *self == Verbosity::Debug
    }
}

impl std::str::FromStr for Verbosity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "warning" | "warn" => Ok(Verbosity::Warning),
            "info" => Ok(Verbosity::Info),
            "debug" => Ok(Verbosity::Debug),
            other => Err(Error::config(
                "verbosity",
                format!("unknown verbosity '{other}' (expected warning, info or debug)"),
            )),
        }
    }
}

/// Document download settings (Phase 2)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Number of simultaneous document fetches (default: 8)
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Produce file names that are valid on every major platform (default: false)
    #[serde(default)]
    pub universal_filepath: bool,

    /// Timeout for a single document fetch (default: 60 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Headers sent with every document request (session cookies, user agent)
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            universal_filepath: false,
            timeout: default_timeout(),
            headers: HashMap::new(),
        }
    }
}

/// Main configuration for a sync run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Output root for documents, exports and the history file (default: "./downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// History file name, relative to `output_dir` (default: "pytr_history")
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,

    /// Document file name template (default: "{iso_date}{time} {title}{doc_num}")
    ///
    /// See [`FILENAME_VARIABLES`] for the recognised placeholders.
    #[serde(default = "default_filename_format")]
    pub filename_format: String,

    /// Only consider events at or after this unix timestamp in seconds (0 = unbounded)
    #[serde(default)]
    pub since_timestamp: i64,

    /// Maximum number of outstanding detail requests (default: 5)
    #[serde(default = "default_detail_window")]
    pub detail_window: usize,

    /// Log verbosity (default: info)
    #[serde(default)]
    pub verbosity: Verbosity,

    /// Document download settings
    #[serde(default)]
    pub download: DownloadConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            history_file: default_history_file(),
            filename_format: default_filename_format(),
            since_timestamp: 0,
            detail_window: default_detail_window(),
            verbosity: Verbosity::default(),
            download: DownloadConfig::default(),
        }
    }
}

impl Config {
    /// Full path of the history file
    pub fn history_path(&self) -> PathBuf {
        self.output_dir.join(&self.history_file)
    }

    /// Age cutoff converted to event timestamp units (milliseconds), if configured
    pub fn cutoff_millis(&self) -> Option<i64> {
        if self.since_timestamp == 0 {
            None
        } else {
            Some(self.since_timestamp.saturating_mul(1000))
        }
    }

    /// Check the configuration for values that would make a run meaningless
    pub fn validate(&self) -> Result<()> {
        if self.detail_window == 0 {
            return Err(Error::config("detail_window", "must be at least 1"));
        }
        if self.download.max_workers == 0 {
            return Err(Error::config("download.max_workers", "must be at least 1"));
        }
        if self.since_timestamp < 0 {
            return Err(Error::config("since_timestamp", "must not be negative"));
        }
        if self.history_file.as_os_str().is_empty() {
            return Err(Error::config("history_file", "must not be empty"));
        }
        for variable in placeholders(&self.filename_format) {
            if !FILENAME_VARIABLES.contains(&variable) {
                return Err(Error::config(
                    "filename_format",
                    format!(
                        "unknown variable '{{{variable}}}' (available: {})",
                        FILENAME_VARIABLES.join(", ")
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Iterate over the `{name}` placeholders of a format string
pub(crate) fn placeholders(format: &str) -> impl Iterator<Item = &str> {
    format.split('{').skip(1).filter_map(|rest| rest.split_once('}').map(|(name, _)| name))
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_history_file() -> PathBuf {
    PathBuf::from("pytr_history")
}

fn default_filename_format() -> String {
    "{iso_date}{time} {title}{doc_num}".to_string()
}

fn default_detail_window() -> usize {
    5
}

fn default_max_workers() -> usize {
    8
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

// Duration serialization helper (whole seconds)
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

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.output_dir, PathBuf::from("downloads"));
        assert_eq!(config.history_path(), PathBuf::from("downloads/pytr_history"));
        assert_eq!(config.filename_format, "{iso_date}{time} {title}{doc_num}");
        assert_eq!(config.detail_window, 5);
        assert_eq!(config.download.max_workers, 8);
        assert_eq!(config.download.timeout, Duration::from_secs(60));
        assert!(!config.download.universal_filepath);
        assert_eq!(config.cutoff_millis(), None);
        config.validate().unwrap();
    }

    #[test]
    fn empty_json_deserializes_to_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.detail_window, 5);
        assert_eq!(config.download.max_workers, 8);
        assert_eq!(config.verbosity, Verbosity::Info);
    }

    #[test]
    fn cutoff_is_converted_to_milliseconds() {
        let config = Config {
            since_timestamp: 1_700_000_000,
            ..Default::default()
        };
        assert_eq!(config.cutoff_millis(), Some(1_700_000_000_000));
    }

    #[test]
    fn validate_rejects_zero_window_and_workers() {
        let config = Config {
            detail_window: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::Config { key: Some(ref k), .. }) if k == "detail_window"
        ));

        let mut config = Config::default();
        config.download.max_workers = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::Config { key: Some(ref k), .. }) if k == "download.max_workers"
        ));
    }

    #[test]
    fn validate_rejects_unknown_format_variable() {
        let config = Config {
            filename_format: "{iso_date} {isin}".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("{isin}"), "got: {err}");
    }

    #[test]
    fn placeholders_are_extracted_in_order() {
        let names: Vec<_> = placeholders("{iso_date}{time} {title}{doc_num}").collect();
        assert_eq!(names, vec!["iso_date", "time", "title", "doc_num"]);
        assert_eq!(placeholders("no variables").count(), 0);
    }

    #[test]
    fn verbosity_parses_case_insensitively() {
        assert_eq!("DEBUG".parse::<Verbosity>().unwrap(), Verbosity::Debug);
        assert_eq!("warn".parse::<Verbosity>().unwrap(), Verbosity::Warning);
        assert!("loud".parse::<Verbosity>().is_err());
        assert_eq!(Verbosity::Debug.as_directive(), "debug");
    }
}
