use crate::error::{ConfigError, CoreError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_DIR_NAME: &str = "tidal";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const PREFERENCES_FILE_NAME: &str = "preferences.json";
pub const CONFIG_ENV_VAR: &str = "TIDAL_CONFIG";

/// Application settings read from `config.toml`.
///
/// These are operator settings; everything the user edits lives in the
/// preferences document instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Defaults to `preferences.json` next to the config file.
    pub preferences_path: Option<PathBuf>,
    /// Defaults to `logs/` next to the config file.
    pub log_dir: Option<PathBuf>,
    pub log_level: String,
    pub log_to_console: bool,
    pub cycle_timeout_secs: u64,
    pub llm_call_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub activity_log_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            preferences_path: None,
            log_dir: None,
            log_level: "info".to_string(),
            log_to_console: true,
            cycle_timeout_secs: 10,
            llm_call_timeout_secs: 5,
            http_timeout_secs: 30,
            activity_log_capacity: 200,
        }
    }
}

impl AppConfig {
    /// Loads the file at `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents).map_err(ConfigError::from)?;
        config.validate()?;

        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Path named by `TIDAL_CONFIG`, or the platform config directory.
    pub fn resolve_path() -> Result<PathBuf, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => Ok(default_config_dir()?.join(CONFIG_FILE_NAME)),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("cycle_timeout_secs", self.cycle_timeout_secs),
            ("llm_call_timeout_secs", self.llm_call_timeout_secs),
            ("http_timeout_secs", self.http_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                });
            }
        }
        if self.llm_call_timeout_secs > self.cycle_timeout_secs {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "llm_call_timeout_secs ({}) exceeds cycle_timeout_secs ({})",
                    self.llm_call_timeout_secs, self.cycle_timeout_secs
                ),
            });
        }
        if self.activity_log_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "activity_log_capacity".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }

    pub fn llm_call_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_call_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Resolves relative and missing paths against the directory holding the config file.
    pub fn preferences_path(&self, config_path: &Path) -> PathBuf {
        let base = config_base_dir(config_path);
        match &self.preferences_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => base.join(path),
            None => base.join(PREFERENCES_FILE_NAME),
        }
    }

    pub fn log_dir(&self, config_path: &Path) -> PathBuf {
        let base = config_base_dir(config_path);
        match &self.log_dir {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => base.join(path),
            None => base.join("logs"),
        }
    }
}

fn config_base_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or(ConfigError::NoConfigDirectory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.cycle_timeout(), Duration::from_secs(10));
        assert_eq!(config.llm_call_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "log_level = \"debug\"\ncycle_timeout_secs = 20\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.cycle_timeout_secs, 20);
        assert_eq!(config.http_timeout_secs, 30);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "cycle_timeout_secs = \"soon\"").unwrap();

        let err = AppConfig::load(&path).unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validation() {
        let zero = AppConfig {
            http_timeout_secs: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "http_timeout_secs"
        ));

        let llm_too_long = AppConfig {
            llm_call_timeout_secs: 11,
            ..Default::default()
        };
        assert!(matches!(
            llm_too_long.validate(),
            Err(ConfigError::ValidationFailed { .. })
        ));

        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_paths_resolve_next_to_config() {
        let config_path = Path::new("/etc/tidal/config.toml");
        let mut config = AppConfig::default();
        assert_eq!(
            config.preferences_path(config_path),
            PathBuf::from("/etc/tidal/preferences.json")
        );
        assert_eq!(config.log_dir(config_path), PathBuf::from("/etc/tidal/logs"));

        config.preferences_path = Some(PathBuf::from("state/prefs.json"));
        config.log_dir = Some(PathBuf::from("/var/log/tidal"));
        assert_eq!(
            config.preferences_path(config_path),
            PathBuf::from("/etc/tidal/state/prefs.json")
        );
        assert_eq!(config.log_dir(config_path), PathBuf::from("/var/log/tidal"));
    }
}
