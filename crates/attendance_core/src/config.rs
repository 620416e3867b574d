//! Runtime configuration for embedding the core.
//!
//! # Invariants
//! - Configuration is a plain value handed to constructors; nothing here is
//!   cached in a global.
//! - Blank environment values count as unset.

use crate::clock::SystemClock;
use crate::logging::{default_log_level, normalize_level};
use crate::model::time::parse_utc_offset;
use chrono::FixedOffset;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "ATTENDANCE_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "ATTENDANCE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "ATTENDANCE_LOG_DIR";
pub const ENV_UTC_OFFSET: &str = "ATTENDANCE_UTC_OFFSET";

const DEFAULT_DB_FILE_NAME: &str = "attendance.sqlite3";

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub key: &'static str,
    pub message: String,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid `{}`: {}", self.key, self.message)
    }
}

impl Error for ConfigError {}

/// Store location, logging and calendar offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    /// Normalized level name (`trace|debug|info|warn|error`).
    pub log_level: &'static str,
    /// File logging is off when `None`.
    pub log_dir: Option<PathBuf>,
    /// Offset defining calendar days; `None` means the host's local offset.
    pub utc_offset: Option<FixedOffset>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            log_level: default_log_level(),
            log_dir: None,
            utc_offset: None,
        }
    }
}

impl CoreConfig {
    /// Reads `ATTENDANCE_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(path) = read(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            config.log_level = normalize_level(&level).map_err(|err| ConfigError {
                key: ENV_LOG_LEVEL,
                message: err.to_string(),
            })?;
        }
        if let Some(dir) = read(ENV_LOG_DIR) {
            config.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(offset) = read(ENV_UTC_OFFSET) {
            config.utc_offset = Some(parse_utc_offset(&offset).map_err(|err| ConfigError {
                key: ENV_UTC_OFFSET,
                message: err.to_string(),
            })?);
        }

        Ok(config)
    }

    /// System clock in the configured offset, or the host's local offset.
    pub fn clock(&self) -> SystemClock {
        self.utc_offset
            .map_or_else(SystemClock::local, SystemClock::new)
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreConfig, ENV_DB_PATH, ENV_LOG_LEVEL, ENV_UTC_OFFSET};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = CoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, CoreConfig::default());
        assert!(config.db_path.ends_with("attendance.sqlite3"));
    }

    #[test]
    fn values_are_trimmed_and_parsed() {
        let config = CoreConfig::from_lookup(lookup(&[
            (ENV_DB_PATH, " /var/lib/attendance.db "),
            (ENV_LOG_LEVEL, "Warning"),
            (ENV_UTC_OFFSET, "+02:00"),
        ]))
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/var/lib/attendance.db"));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.utc_offset.unwrap().local_minus_utc(), 7200);
        assert_eq!(config.clock().offset().local_minus_utc(), 7200);
    }

    #[test]
    fn bad_offset_names_the_variable() {
        let err = CoreConfig::from_lookup(lookup(&[(ENV_UTC_OFFSET, "noon")])).unwrap_err();
        assert_eq!(err.key, ENV_UTC_OFFSET);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = CoreConfig::from_lookup(lookup(&[(ENV_LOG_LEVEL, "   ")])).unwrap();
        assert_eq!(config.log_level, CoreConfig::default().log_level);
    }
}
