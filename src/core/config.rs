/*
 * Manages the application configuration: the history size ceiling, the
 * autosave interval, the safety alert threshold, the terminal log level and
 * an optional override of where the store slots live. The configuration is
 * a small JSON document (`config.json`) in the platform local config
 * directory.
 *
 * It uses a trait-based approach (`ConfigManagerOperations`) so tests and
 * callers can substitute another location. Loading never fails on bad
 * content: a missing or malformed file yields the defaults, and fields
 * absent from the file fall back to their defaults one by one.
 */
use crate::core::autosave::DEFAULT_AUTOSAVE_INTERVAL;
use crate::core::path_utils;
use crate::core::size_guard::DEFAULT_HISTORY_CEILING_MB;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "config.json";
pub const DEFAULT_SAFETY_ALERT_HISTORY_LEN: usize = 2000;

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Serde(serde_json::Error),
    NoConfigDirectory,
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Serde(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Configuration I/O error: {e}"),
            ConfigError::Serde(e) => write!(f, "Configuration JSON error: {e}"),
            ConfigError::NoConfigDirectory => {
                write!(f, "Could not determine the configuration directory")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Serde(e) => Some(e),
            ConfigError::NoConfigDirectory => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub history_ceiling_mb: f64,
    pub autosave_interval_secs: u64,
    pub safety_alert_history_len: usize,
    pub log_level: String,
    pub data_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            history_ceiling_mb: DEFAULT_HISTORY_CEILING_MB,
            autosave_interval_secs: DEFAULT_AUTOSAVE_INTERVAL.as_secs(),
            safety_alert_history_len: DEFAULT_SAFETY_ALERT_HISTORY_LEN,
            log_level: "info".to_string(),
            data_dir: None,
        }
    }
}

impl AppConfig {
    /* Zero would spin the timer, so it is treated as the default. */
    pub fn autosave_interval(&self) -> Duration {
        if self.autosave_interval_secs == 0 {
            DEFAULT_AUTOSAVE_INTERVAL
        } else {
            Duration::from_secs(self.autosave_interval_secs)
        }
    }

    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level
            .parse::<log::LevelFilter>()
            .unwrap_or(log::LevelFilter::Info)
    }
}

pub trait ConfigManagerOperations: Send + Sync {
    fn load_config(&self, app_name: &str) -> Result<AppConfig>;
    fn save_config(&self, app_name: &str, config: &AppConfig) -> Result<()>;
}

/* Reads `config.json` from `config_dir`, falling back to defaults. */
fn load_config_from_dir(config_dir: &Path) -> Result<AppConfig> {
    let file_path = config_dir.join(CONFIG_FILENAME);
    if !file_path.exists() {
        log::debug!("ConfigManager: Config file {file_path:?} does not exist. Using defaults.");
        return Ok(AppConfig::default());
    }

    let contents = fs::read_to_string(&file_path)?;
    match serde_json::from_str::<AppConfig>(&contents) {
        Ok(config) => {
            log::debug!("ConfigManager: Loaded config from {file_path:?}: {config:?}");
            Ok(config)
        }
        Err(e) => {
            log::warn!("ConfigManager: Malformed config file {file_path:?} ({e}). Using defaults.");
            Ok(AppConfig::default())
        }
    }
}

fn save_config_to_dir(config_dir: &Path, config: &AppConfig) -> Result<()> {
    let file_path = config_dir.join(CONFIG_FILENAME);
    let json = serde_json::to_string_pretty(config)?;
    fs::write(&file_path, json)?;
    log::debug!("ConfigManager: Saved config to {file_path:?}.");
    Ok(())
}

pub struct CoreConfigManager {}

impl CoreConfigManager {
    pub fn new() -> Self {
        CoreConfigManager {}
    }
}

impl Default for CoreConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManagerOperations for CoreConfigManager {
    fn load_config(&self, app_name: &str) -> Result<AppConfig> {
        log::trace!("CoreConfigManager: Loading config for app '{app_name}'");
        let config_dir = path_utils::get_base_app_config_local_dir(app_name)
            .ok_or(ConfigError::NoConfigDirectory)?;
        load_config_from_dir(&config_dir)
    }

    fn save_config(&self, app_name: &str, config: &AppConfig) -> Result<()> {
        log::trace!("CoreConfigManager: Saving config for app '{app_name}'");
        let config_dir = path_utils::get_base_app_config_local_dir(app_name)
            .ok_or(ConfigError::NoConfigDirectory)?;
        save_config_to_dir(&config_dir, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // Config manager rooted in a given directory instead of the platform one.
    struct TestConfigManager {
        mock_config_dir: PathBuf,
    }

    impl ConfigManagerOperations for TestConfigManager {
        fn load_config(&self, _app_name: &str) -> Result<AppConfig> {
            load_config_from_dir(&self.mock_config_dir)
        }

        fn save_config(&self, _app_name: &str, config: &AppConfig) -> Result<()> {
            save_config_to_dir(&self.mock_config_dir, config)
        }
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let manager = TestConfigManager {
            mock_config_dir: dir.path().to_path_buf(),
        };

        let config = manager.load_config("AnyApp").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.history_ceiling_mb, 4.5);
        assert_eq!(config.autosave_interval(), Duration::from_secs(5));
        assert_eq!(config.safety_alert_history_len, 2000);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let manager = TestConfigManager {
            mock_config_dir: dir.path().to_path_buf(),
        };
        let config = AppConfig {
            history_ceiling_mb: 1.0,
            autosave_interval_secs: 30,
            safety_alert_history_len: 10,
            log_level: "debug".to_string(),
            data_dir: Some(PathBuf::from("/tmp/grocery")),
        };

        manager.save_config("AnyApp", &config).unwrap();
        assert!(dir.path().join(CONFIG_FILENAME).exists());
        assert_eq!(manager.load_config("AnyApp").unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_missing_fields() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILENAME),
            r#"{ "autosave_interval_secs": 12 }"#,
        )
        .unwrap();
        let manager = TestConfigManager {
            mock_config_dir: dir.path().to_path_buf(),
        };

        let config = manager.load_config("AnyApp").unwrap();
        assert_eq!(config.autosave_interval_secs, 12);
        assert_eq!(config.history_ceiling_mb, DEFAULT_HISTORY_CEILING_MB);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.data_dir, None);
    }

    #[test]
    fn test_malformed_file_yields_defaults() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "{ not json").unwrap();
        let manager = TestConfigManager {
            mock_config_dir: dir.path().to_path_buf(),
        };

        assert_eq!(manager.load_config("AnyApp").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_log_level_and_interval_fallbacks() {
        let config = AppConfig {
            log_level: "chatty".to_string(),
            autosave_interval_secs: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.log_level_filter(), log::LevelFilter::Info);
        assert_eq!(config.autosave_interval(), DEFAULT_AUTOSAVE_INTERVAL);

        let config = AppConfig {
            log_level: "trace".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(config.log_level_filter(), log::LevelFilter::Trace);
    }

    #[test]
    fn test_core_config_manager_round_trip() {
        let unique_app_name = format!("TestApp_CoreConfig_{}", rand::random::<u64>());
        let manager = CoreConfigManager::new();
        let config = AppConfig {
            autosave_interval_secs: 9,
            ..AppConfig::default()
        };

        if manager.save_config(&unique_app_name, &config).is_err() {
            // No usable home directory in this environment.
            return;
        }
        assert_eq!(manager.load_config(&unique_app_name).unwrap(), config);

        if let Some(config_dir) = path_utils::get_base_app_config_local_dir(&unique_app_name) {
            if let Err(e) = fs::remove_dir_all(&config_dir) {
                eprintln!("Test cleanup failed for {config_dir:?}: {e}");
            }
        }
    }
}
