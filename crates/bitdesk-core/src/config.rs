//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/bitdesk/config.toml)
//! 3. Environment variables (BITDESK_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix
const ENV_PREFIX: &str = "BITDESK";

/// Default MakeCode editor for micro:bit
pub const DEFAULT_EDITOR_URL: &str = "https://makecode.microbit.org/";

/// Origin the MakeCode editor posts messages from
pub const DEFAULT_EDITOR_ORIGIN: &str = "https://makecode.microbit.org";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (SQLite db, logs)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Remote persistence service base URL (optional, local SQLite otherwise)
    #[serde(default)]
    pub store_url: Option<String>,

    /// WebSocket relay hosting the editor frame (optional)
    #[serde(default)]
    pub relay_url: Option<String>,

    /// URL the editor frame is loaded from
    #[serde(default = "default_editor_url")]
    pub editor_url: String,

    /// Origin every editor message must come from
    #[serde(default = "default_editor_origin")]
    pub editor_origin: String,

    /// Controller id announced to the editor
    #[serde(default = "default_controller_id")]
    pub controller_id: String,

    /// How long to wait for the editor to confirm a project import
    #[serde(default = "default_import_timeout_secs")]
    pub import_timeout_secs: u64,

    /// Address `bitdesk serve` listens on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Log file for the editor TUI (defaults to <data_dir>/debug.log)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            store_url: None,
            relay_url: None,
            editor_url: default_editor_url(),
            editor_origin: default_editor_origin(),
            controller_id: default_controller_id(),
            import_timeout_secs: default_import_timeout_secs(),
            listen_addr: default_listen_addr(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (BITDESK_DATA_DIR, BITDESK_STORE_URL, ...)
    /// 2. Config file (~/.config/bitdesk/config.toml or BITDESK_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // Empty string clears the optional URLs
        if let Ok(val) = std::env::var(format!("{}_STORE_URL", ENV_PREFIX)) {
            self.store_url = non_empty(val);
        }

        if let Ok(val) = std::env::var(format!("{}_RELAY_URL", ENV_PREFIX)) {
            self.relay_url = non_empty(val);
        }

        if let Ok(val) = std::env::var(format!("{}_EDITOR_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.editor_url = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_EDITOR_ORIGIN", ENV_PREFIX)) {
            if !val.is_empty() {
                self.editor_origin = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_IMPORT_TIMEOUT_SECS", ENV_PREFIX)) {
            match val.parse::<u64>() {
                Ok(0) | Err(_) => {
                    tracing::warn!(value = %val, "Ignoring invalid BITDESK_IMPORT_TIMEOUT_SECS")
                }
                Ok(secs) => self.import_timeout_secs = secs,
            }
        }

        if let Ok(val) = std::env::var(format!("{}_LISTEN_ADDR", ENV_PREFIX)) {
            if !val.is_empty() {
                self.listen_addr = val;
            }
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with BITDESK_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bitdesk")
            .join("config.toml")
    }

    /// Get the path to the SQLite database
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("bitdesk.db")
    }

    /// Get the path of the TUI log file
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("debug.log"))
    }

    /// Import timeout as a `Duration`, never shorter than one second
    pub fn import_timeout(&self) -> Duration {
        Duration::from_secs(self.import_timeout_secs.max(MIN_IMPORT_TIMEOUT_SECS))
    }
}

fn non_empty(val: String) -> Option<String> {
    if val.is_empty() {
        None
    } else {
        Some(val)
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bitdesk")
}

fn default_editor_url() -> String {
    DEFAULT_EDITOR_URL.to_string()
}

fn default_editor_origin() -> String {
    DEFAULT_EDITOR_ORIGIN.to_string()
}

fn default_controller_id() -> String {
    "microbit-replica".to_string()
}

const MIN_IMPORT_TIMEOUT_SECS: u64 = 1;

fn default_import_timeout_secs() -> u64 {
    10
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "BITDESK_DATA_DIR",
        "BITDESK_STORE_URL",
        "BITDESK_RELAY_URL",
        "BITDESK_EDITOR_URL",
        "BITDESK_EDITOR_ORIGIN",
        "BITDESK_IMPORT_TIMEOUT_SECS",
        "BITDESK_LISTEN_ADDR",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.store_url.is_none());
        assert!(config.relay_url.is_none());
        assert_eq!(config.editor_origin, "https://makecode.microbit.org");
        assert_eq!(config.import_timeout(), Duration::from_secs(10));
        assert!(config.data_dir.ends_with("bitdesk"));
    }

    #[test]
    fn test_file_paths() {
        let config = Config::default();
        assert!(config.sqlite_path().ends_with("bitdesk.db"));
        assert!(config.log_path().ends_with("debug.log"));

        let config = Config {
            log_file: Some(PathBuf::from("/tmp/bitdesk.log")),
            ..Config::default()
        };
        assert_eq!(config.log_path(), PathBuf::from("/tmp/bitdesk.log"));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("BITDESK_DATA_DIR", "/tmp/bitdesk-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/bitdesk-test"));
    }

    #[test]
    fn test_env_override_store_url() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("BITDESK_STORE_URL", "http://localhost:3000");
        config.apply_env_overrides();
        assert_eq!(config.store_url, Some("http://localhost:3000".to_string()));

        // Empty string clears it
        env::set_var("BITDESK_STORE_URL", "");
        config.apply_env_overrides();
        assert!(config.store_url.is_none());
    }

    #[test]
    fn test_env_override_import_timeout() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();

        env::set_var("BITDESK_IMPORT_TIMEOUT_SECS", "3");
        config.apply_env_overrides();
        assert_eq!(config.import_timeout_secs, 3);

        env::set_var("BITDESK_IMPORT_TIMEOUT_SECS", "soon");
        config.apply_env_overrides();
        assert_eq!(config.import_timeout_secs, 3);

        env::set_var("BITDESK_IMPORT_TIMEOUT_SECS", "0");
        config.apply_env_overrides();
        assert_eq!(config.import_timeout_secs, 3);
        assert_eq!(config.import_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_zero_import_timeout_in_file_is_clamped() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config::load_from_str("import_timeout_secs = 0").unwrap();
        assert_eq!(config.import_timeout_secs, 0);
        assert_eq!(config.import_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            data_dir: PathBuf::from("/data/bitdesk"),
            relay_url: Some("ws://localhost:8787".to_string()),
            ..Config::default()
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("relay_url"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.data_dir, config.data_dir);
        assert_eq!(parsed.relay_url, config.relay_url);
        assert_eq!(parsed.editor_url, config.editor_url);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            store_url = "http://example.com"
            import_timeout_secs = 5
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.store_url, Some("http://example.com".to_string()));
        assert_eq!(config.import_timeout_secs, 5);
        assert_eq!(config.controller_id, "microbit-replica");
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let config = Config {
            data_dir: temp_dir.path().join("data"),
            listen_addr: "0.0.0.0:8080".to_string(),
            ..Config::default()
        };
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.listen_addr, "0.0.0.0:8080");
        assert!(loaded.data_dir.exists());
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        env::set_var("BITDESK_DATA_DIR", temp_dir.path());

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert!(config.store_url.is_none());
        assert_eq!(config.data_dir, temp_dir.path());
    }
}
