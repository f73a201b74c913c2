//! Configuration loading and resolution
//!
//! Sources, highest priority first:
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. TOML config file (`~/.config/mlp/config.toml` by default)
//! 4. Compiled defaults
//!
//! The binary's clap definition covers 1 and 2 for most settings; the
//! library root is also resolved here so that the environment variable
//! works for every entry point.

use crate::{Error, Result};
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the file library root
pub const LIBRARY_ROOT_ENV: &str = "MLP_LIBRARY_ROOT";

/// Bootstrap configuration loaded from TOML
///
/// Every section is optional; a missing section takes its defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: default_port(),
        }
    }
}

/// PostgreSQL connection
///
/// Either `url` or the individual connection parts; `url` wins when both
/// are given.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub name: String,
    pub max_connections: u32,
    /// Seconds an idle pooled connection is kept
    pub idle_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            user: "mlp".to_string(),
            password: None,
            name: "mlp".to_string(),
            max_connections: 10,
            idle_timeout_secs: 10,
        }
    }
}

impl DatabaseConfig {
    /// Connection options; `url` is parsed when set, otherwise the parts
    /// are passed through unescaped
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        if let Some(url) = &self.url {
            return url
                .parse::<PgConnectOptions>()
                .map_err(|e| Error::Config(format!("Invalid database url: {}", e)));
        }
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.name);
        Ok(match &self.password {
            Some(password) => options.password(password),
            None => options,
        })
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Where uploaded files live on disk
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub library_root: Option<PathBuf>,
}

/// Login sessions
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub ttl_hours: i64,
    /// Add `Secure` to the session cookie (HTTPS deployments)
    pub secure_cookie: bool,
}

impl SessionConfig {
    /// Session lifetime; zero, negative and out-of-range hours are rejected
    pub fn ttl(&self) -> Result<chrono::Duration> {
        chrono::Duration::try_hours(self.ttl_hours)
            .filter(|ttl| *ttl > chrono::Duration::zero())
            .ok_or_else(|| {
                Error::Config(format!("session.ttl_hours out of range: {}", self.ttl_hours))
            })
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: 24,
            secure_cookie: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Load from `path`
    ///
    /// A missing file is not an error: a warning is logged and defaults are
    /// used. A file that exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: TomlConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Default config file location for the platform
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("mlp").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

/// OS-dependent default for the file library
pub fn default_library_root() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("mlp").join("library"))
        .unwrap_or_else(|| PathBuf::from("./mlp_library"))
}

/// Library root: CLI > `MLP_LIBRARY_ROOT` > TOML > OS default
pub fn resolve_library_root(cli_arg: Option<&Path>, toml: &StorageConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(LIBRARY_ROOT_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml.library_root {
        return path.clone();
    }

    default_library_root()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.database.idle_timeout(), Duration::from_secs(10));
        assert_eq!(config.session.ttl_hours, 24);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_sections() {
        let config: TomlConfig = toml::from_str(
            r#"
            [database]
            host = "db.internal"
            password = "secret"

            [session]
            ttl_hours = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 5432);
        let options = config.database.connect_options().unwrap();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_username(), "mlp");
        assert_eq!(config.session.ttl_hours, 8);
        assert!(!config.session.secure_cookie);
    }

    #[test]
    fn test_url_wins_over_parts() {
        let db = DatabaseConfig {
            url: Some("postgres://other:5433/archive".to_string()),
            ..DatabaseConfig::default()
        };
        let options = db.connect_options().unwrap();
        assert_eq!(options.get_host(), "other");
        assert_eq!(options.get_port(), 5433);
        assert_eq!(options.get_database(), Some("archive"));

        let defaults = DatabaseConfig::default().connect_options().unwrap();
        assert_eq!(defaults.get_host(), "localhost");
        assert_eq!(defaults.get_port(), 5432);
        assert_eq!(defaults.get_database(), Some("mlp"));
    }

    #[test]
    fn test_password_with_url_delimiters() {
        let db = DatabaseConfig {
            host: "db.internal".to_string(),
            password: Some("p@ss/word".to_string()),
            name: "archive".to_string(),
            ..DatabaseConfig::default()
        };
        let options = db.connect_options().unwrap();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 5432);
        assert_eq!(options.get_username(), "mlp");
        assert_eq!(options.get_database(), Some("archive"));
    }

    #[test]
    fn test_malformed_url_is_config_error() {
        let db = DatabaseConfig {
            url: Some("not a url".to_string()),
            ..DatabaseConfig::default()
        };
        assert!(matches!(db.connect_options(), Err(Error::Config(_))));
    }

    #[test]
    fn test_session_ttl_range() {
        assert_eq!(SessionConfig::default().ttl().unwrap(), chrono::Duration::hours(24));
        for ttl_hours in [0, -1, i64::MAX, i64::MIN] {
            let session = SessionConfig {
                ttl_hours,
                ..SessionConfig::default()
            };
            assert!(matches!(session.ttl(), Err(Error::Config(_))), "{}", ttl_hours);
        }
    }

    #[test]
    fn test_default_paths() {
        assert!(default_config_path().ends_with("config.toml"));
        assert!(!default_library_root().as_os_str().is_empty());
    }
}
