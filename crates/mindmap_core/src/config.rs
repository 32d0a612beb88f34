//! Core configuration: retention window, database location, logging.
//!
//! Values are layered defaults → optional TOML file → `MINDMAP__*`
//! environment variables (`MINDMAP__DELETE_AFTER_DAYS`,
//! `MINDMAP__LOGGING__LEVEL`, ...).

use crate::logging::{normalize_level, LoggingConfig};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "MINDMAP";
const DEFAULT_DELETE_AFTER_DAYS: u32 = 30;
/// Upper bound keeps deadline arithmetic far from chrono's range limits.
const MAX_DELETE_AFTER_DAYS: u32 = 36_500;

/// Source of the retention window used by the map service.
pub trait RetentionSettings {
    /// Days of inactivity after which a map becomes eligible for deletion.
    fn delete_after_days(&self) -> u32;
}

impl RetentionSettings for u32 {
    fn delete_after_days(&self) -> u32 {
        *self
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Load(config::ConfigError),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load(err) => write!(f, "failed to load configuration: {err}"),
            Self::Invalid(message) => write!(f, "invalid configuration: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Load(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(value: config::ConfigError) -> Self {
        Self::Load(value)
    }
}

/// Root configuration for the map store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub delete_after_days: u32,
    /// SQLite file; callers decide the fallback when unset.
    pub database_path: Option<PathBuf>,
    pub logging: LoggingConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            delete_after_days: DEFAULT_DELETE_AFTER_DAYS,
            database_path: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl RetentionSettings for CoreConfig {
    fn delete_after_days(&self) -> u32 {
        self.delete_after_days
    }
}

impl CoreConfig {
    /// Loads configuration from an optional TOML file plus the environment.
    ///
    /// A path that is given must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that deserialization cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delete_after_days > MAX_DELETE_AFTER_DAYS {
            return Err(ConfigError::Invalid(format!(
                "delete_after_days must be at most {MAX_DELETE_AFTER_DAYS}, got {}",
                self.delete_after_days
            )));
        }
        normalize_level(&self.logging.level).map_err(ConfigError::Invalid)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, RetentionSettings};
    use std::io::Write;

    #[test]
    fn defaults_to_thirty_day_retention() {
        let config = CoreConfig::default();
        assert_eq!(config.delete_after_days(), 30);
        assert!(config.database_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn loads_values_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "delete_after_days = 7\ndatabase_path = \"/var/lib/mindmap/maps.db\"\n\n[logging]\nlevel = \"warn\""
        )
        .unwrap();

        let config = CoreConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.delete_after_days, 7);
        assert_eq!(
            config.database_path.as_deref(),
            Some(std::path::Path::new("/var/lib/mindmap/maps.db"))
        );
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn rejects_out_of_range_retention() {
        let config = CoreConfig {
            delete_after_days: 100_000,
            ..CoreConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = CoreConfig::default();
        config.logging.level = "chatty".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CoreConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
