//! Runtime configuration loaded from TOML.
//!
//! # Responsibility
//! - Describe every knob the attendance core reads at startup.
//! - Validate values once so services receive typed settings.
//!
//! # Invariants
//! - Every field has a default; an empty file is a valid configuration.
//! - `validate()` has run on any config returned by `load`/`from_toml_str`.

use crate::clock::LocalZone;
use crate::logging::default_log_level;
use crate::model::schedule::{LessonSchedule, DEFAULT_END_TIME, DEFAULT_START_TIME};
use crate::model::validation::ValidationError;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 60;
/// One day.
pub const MAX_TICK_INTERVAL_SECS: u64 = 86_400;
pub const DEFAULT_LEDGER_CAPACITY: usize = 50;
pub const DEFAULT_DB_FILE_NAME: &str = "rollcall.sqlite3";

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

impl From<ValidationError> for ConfigError {
    fn from(value: ValidationError) -> Self {
        Self::Invalid(value.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RollcallConfig {
    pub clock: ClockConfig,
    pub schedule: ScheduleConfig,
    pub reconciliation: ReconciliationConfig,
    pub ledger: LedgerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClockConfig {
    /// Fixed offset of the school, e.g. `+03:00`.
    pub utc_offset: String,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            utc_offset: "+00:00".to_string(),
        }
    }
}

/// Global schedule used until an administrator stores one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleConfig {
    pub default_start: String,
    pub default_end: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            default_start: DEFAULT_START_TIME.to_string(),
            default_end: DEFAULT_END_TIME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconciliationConfig {
    pub tick_interval_secs: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: DEFAULT_TICK_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    pub capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_LEDGER_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE_NAME),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

impl RollcallConfig {
    /// Reads and validates a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.zone()?;
        self.default_schedule()?;
        if self.reconciliation.tick_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "reconciliation.tick_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.reconciliation.tick_interval_secs > MAX_TICK_INTERVAL_SECS {
            return Err(ConfigError::Invalid(format!(
                "reconciliation.tick_interval_secs must be at most {MAX_TICK_INTERVAL_SECS}"
            )));
        }
        if self.ledger.capacity == 0 {
            return Err(ConfigError::Invalid(
                "ledger.capacity must be greater than zero".to_string(),
            ));
        }
        if let Some(dir) = &self.logging.dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "logging.dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    pub fn zone(&self) -> Result<LocalZone, ValidationError> {
        LocalZone::parse(&self.clock.utc_offset)
    }

    pub fn default_schedule(&self) -> Result<LessonSchedule, ValidationError> {
        LessonSchedule::parse(&self.schedule.default_start, &self.schedule.default_end)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.reconciliation.tick_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, RollcallConfig, DEFAULT_LEDGER_CAPACITY};
    use std::time::Duration;

    #[test]
    fn empty_document_uses_defaults() {
        let config = RollcallConfig::from_toml_str("").unwrap();
        assert_eq!(config, RollcallConfig::default());
        assert_eq!(config.tick_interval(), Duration::from_secs(60));
        assert_eq!(config.ledger.capacity, DEFAULT_LEDGER_CAPACITY);
        let schedule = config.default_schedule().unwrap();
        assert_eq!(schedule.start_time.as_str(), "09:00");
        assert_eq!(schedule.end_time.as_str(), "10:00");
    }

    #[test]
    fn sections_override_defaults() {
        let config = RollcallConfig::from_toml_str(
            r#"
            [clock]
            utc_offset = "+03:00"

            [schedule]
            default_start = "08:30"
            default_end = "09:15"

            [reconciliation]
            tick_interval_secs = 30

            [storage]
            db_path = "/var/lib/rollcall/attendance.sqlite3"
            "#,
        )
        .unwrap();

        assert_eq!(config.zone().unwrap().offset().local_minus_utc(), 3 * 3600);
        assert_eq!(config.default_schedule().unwrap().start_time.as_str(), "08:30");
        assert_eq!(config.tick_interval(), Duration::from_secs(30));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cases = [
            "[clock]\nutc_offset = \"local\"",
            "[schedule]\ndefault_start = \"10:00\"\ndefault_end = \"09:00\"",
            "[reconciliation]\ntick_interval_secs = 0",
            "[reconciliation]\ntick_interval_secs = 86401",
            "[ledger]\ncapacity = 0",
            "[logging]\ndir = \"relative/logs\"",
        ];
        for case in cases {
            let err = RollcallConfig::from_toml_str(case).expect_err(case);
            assert!(matches!(err, ConfigError::Invalid(_)), "{case}: {err}");
        }
    }

    #[test]
    fn unknown_keys_fail_to_parse() {
        let err = RollcallConfig::from_toml_str("[clock]\ntimezone = \"+01:00\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
