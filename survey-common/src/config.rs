//! Configuration loading and data folder resolution
//!
//! Every setting is resolved in the same priority order:
//! 1. Command-line argument or environment variable (clap merges the two)
//! 2. TOML config file
//! 3. OS-dependent compiled default

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory name used under the platform config/data directories
pub const APP_DIR_NAME: &str = "audio-survey";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8000;

/// Default bind host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Subdirectory of the data folder holding one JSON record per participant
pub const SESSIONS_DIR_NAME: &str = "sessions";

/// Shared CSV export file inside the data folder
pub const RESULTS_CSV_NAME: &str = "results.csv";

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub site_root: Option<PathBuf>,
    /// Explicit TOML file; skips the platform search when set
    pub config_file: Option<PathBuf>,
}

/// Contents of the optional TOML config file
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub data_dir: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub site_root: Option<PathBuf>,
}

impl TomlConfig {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Read and parse a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

/// Fully resolved server configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Base storage directory (contains `sessions/` and `results.csv`)
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    /// Static front-end files served as the router fallback
    pub site_root: Option<PathBuf>,
}

impl ServerConfig {
    /// Resolve configuration from overrides, the TOML file and compiled defaults
    ///
    /// A missing or unreadable config file is logged and ignored.
    pub fn resolve(overrides: ConfigOverrides) -> Self {
        let file = load_config_file(overrides.config_file.as_deref());
        Self::merge(overrides, file)
    }

    /// Combine overrides with an already-loaded TOML config
    pub fn merge(overrides: ConfigOverrides, file: TomlConfig) -> Self {
        Self {
            data_dir: overrides
                .data_dir
                .or(file.data_dir)
                .unwrap_or_else(default_data_dir),
            host: overrides
                .host
                .or(file.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: overrides.port.or(file.port).unwrap_or(DEFAULT_PORT),
            site_root: overrides.site_root.or(file.site_root),
        }
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join(SESSIONS_DIR_NAME)
    }

    pub fn results_csv_path(&self) -> PathBuf {
        self.data_dir.join(RESULTS_CSV_NAME)
    }

    /// `host:port` string suitable for binding a listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Load the TOML config, returning defaults when none is usable
fn load_config_file(explicit: Option<&Path>) -> TomlConfig {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match locate_config_file() {
            Some(path) => path,
            None => {
                debug!("No config file found, using defaults");
                return TomlConfig::default();
            }
        },
    };

    match TomlConfig::load(&path) {
        Ok(config) => {
            debug!("Loaded config file {}", path.display());
            config
        }
        Err(e) => {
            warn!("Ignoring config file {}: {}", path.display(), e);
            TomlConfig::default()
        }
    }
}

/// Search platform locations for a config file
fn locate_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc").join(APP_DIR_NAME).join("config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default data folder
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefers_overrides() {
        let overrides = ConfigOverrides {
            data_dir: Some(PathBuf::from("/cli/data")),
            port: Some(9100),
            ..Default::default()
        };
        let file = TomlConfig {
            data_dir: Some(PathBuf::from("/toml/data")),
            host: Some("127.0.0.1".to_string()),
            port: Some(9200),
            site_root: Some(PathBuf::from("/toml/site")),
        };

        let config = ServerConfig::merge(overrides, file);
        assert_eq!(config.data_dir, PathBuf::from("/cli/data"));
        assert_eq!(config.port, 9100);
        // Not overridden, so TOML wins over the compiled default
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.site_root, Some(PathBuf::from("/toml/site")));
    }

    #[test]
    fn test_merge_falls_back_to_defaults() {
        let config = ServerConfig::merge(ConfigOverrides::default(), TomlConfig::default());
        assert_eq!(config.data_dir, default_data_dir());
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.site_root.is_none());
        assert_eq!(config.bind_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn test_derived_paths() {
        let overrides = ConfigOverrides {
            data_dir: Some(PathBuf::from("/srv/survey")),
            ..Default::default()
        };
        let config = ServerConfig::merge(overrides, TomlConfig::default());
        assert_eq!(config.sessions_dir(), PathBuf::from("/srv/survey/sessions"));
        assert_eq!(config.results_csv_path(), PathBuf::from("/srv/survey/results.csv"));
    }

    #[test]
    fn test_toml_parsing_partial() {
        let config = TomlConfig::from_toml_str("port = 8123\n").unwrap();
        assert_eq!(config.port, Some(8123));
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_toml_parsing_rejects_bad_types() {
        let err = TomlConfig::from_toml_str("port = \"eighty\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
