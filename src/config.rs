//! Application configuration.
//!
//! Configuration is read from YAML. Every field has a default so a partial
//! file (or none at all) yields a usable setup:
//!
//! ```yaml
//! logger:
//!   level: debug
//!   format: json
//! classifier:
//!   worker_threads: 8
//!   stamp:
//!     author: 1
//!     module: 2
//!     path: 3
//! ```

use std::fmt::{self, Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::store::Nid;
use crate::Result;

/// Root configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logger: Logger,
    pub classifier: ClassifierSettings,
}

impl Config {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|err| {
            Error::Message(format!("cannot read config `{}`: {err}", path.display()))
        })?;
        content.parse()
    }
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }
}

/// Logger configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Logger {
    /// Install a subscriber at all.
    pub enable: bool,
    pub level: LogLevel,
    pub format: Format,
    /// Full `EnvFilter` directive overriding `level`.
    pub override_filter: Option<String>,
    pub file_appender: Option<FileAppender>,
}

impl Default for Logger {
    fn default() -> Self {
        Self {
            enable: true,
            level: LogLevel::Info,
            format: Format::Compact,
            override_filter: None,
            file_appender: None,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        })
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Daily rolling log file written in addition to stdout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAppender {
    pub enable: bool,
    pub dir: PathBuf,
    pub filename_prefix: String,
}

impl Default for FileAppender {
    fn default() -> Self {
        Self {
            enable: false,
            dir: PathBuf::from("./logs"),
            filename_prefix: "termclass".to_string(),
        }
    }
}

/// Classifier backend selection.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierBackend {
    /// Built-in told-subsumption EL classifier.
    #[default]
    Structural,
}

/// Settings of the classification pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub backend: ClassifierBackend,
    /// Size of the data-parallel pool. `None` uses the available parallelism.
    pub worker_threads: Option<usize>,
    /// Emit a progress report every N concepts.
    pub progress_interval: usize,
    pub stamp: StampSettings,
    pub patterns: PatternSettings,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            backend: ClassifierBackend::default(),
            worker_threads: None,
            progress_interval: 1_000,
            stamp: StampSettings::default(),
            patterns: PatternSettings::default(),
        }
    }
}

/// Stamp fields used for versions written by classification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StampSettings {
    pub author: Nid,
    pub module: Nid,
    pub path: Nid,
}

impl Default for StampSettings {
    fn default() -> Self {
        Self {
            author: Nid::new(-1_000_001),
            module: Nid::new(-1_000_002),
            path: Nid::new(-1_000_003),
        }
    }
}

/// Patterns holding stated and inferred definitions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternSettings {
    pub stated: Nid,
    pub inferred: Nid,
}

impl Default for PatternSettings {
    fn default() -> Self {
        Self {
            stated: Nid::new(-1_000_101),
            inferred: Nid::new(-1_000_102),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: Config = "{}".parse().expect("config");
        assert_eq!(config, Config::default());
        assert!(config.logger.enable);
        assert_eq!(config.classifier.progress_interval, 1_000);
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config: Config = r"
logger:
  level: debug
  format: json
  file_appender:
    enable: true
classifier:
  worker_threads: 4
  stamp:
    path: 42
"
        .parse()
        .expect("config");
        assert_eq!(config.logger.level, LogLevel::Debug);
        assert_eq!(config.logger.format, Format::Json);
        let appender = config.logger.file_appender.expect("appender");
        assert!(appender.enable);
        assert_eq!(appender.filename_prefix, "termclass");
        assert_eq!(config.classifier.worker_threads, Some(4));
        assert_eq!(config.classifier.stamp.path, Nid::new(42));
        assert_eq!(config.classifier.stamp.author, StampSettings::default().author);
    }

    #[test]
    fn rejects_unknown_backend() {
        let err = "classifier:\n  backend: snorocket\n"
            .parse::<Config>()
            .expect_err("unknown backend");
        assert!(matches!(err, Error::Yaml(_)));
    }
}
