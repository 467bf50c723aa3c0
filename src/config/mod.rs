//! Configuration management
//!
//! Configuration is read from `config.yml` and can be overridden through
//! `TIMEPASS_*` environment variables. Every value has a default, so a
//! missing or empty file yields a runnable configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub stories: StoryConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:5173".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file path or URL, `:memory:` for an in-memory store
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "data/timepass.db".to_string()
}

fn default_max_connections() -> u32 {
    20
}

/// Object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding one sub-directory per bucket
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
    /// Prefix used when building public object URLs
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Maximum upload size in bytes (default: 50MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Accepted MIME type prefixes
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            public_base_url: default_public_base_url(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("data/storage")
}

fn default_public_base_url() -> String {
    "/storage".to_string()
}

fn default_max_file_size() -> u64 {
    50 * 1024 * 1024
}

fn default_allowed_types() -> Vec<String> {
    vec!["image/".to_string(), "video/".to_string()]
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_session_days")]
    pub session_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_days: default_session_days(),
        }
    }
}

fn default_session_days() -> i64 {
    7
}

/// Story lifetime and slideshow timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryConfig {
    #[serde(default = "default_story_ttl_hours")]
    pub ttl_hours: i64,
    #[serde(default = "default_image_duration_ms")]
    pub image_duration_ms: u64,
    #[serde(default = "default_video_duration_ms")]
    pub video_duration_ms: u64,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_story_ttl_hours(),
            image_duration_ms: default_image_duration_ms(),
            video_duration_ms: default_video_duration_ms(),
            tick_ms: default_tick_ms(),
        }
    }
}

fn default_story_ttl_hours() -> i64 {
    24
}

fn default_image_duration_ms() -> u64 {
    5_000
}

fn default_video_duration_ms() -> u64 {
    10_000
}

fn default_tick_ms() -> u64 {
    50
}

/// Profile search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_search_limit")]
    pub limit: i64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            limit: default_search_limit(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_search_limit() -> i64 {
    20
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file.
    ///
    /// A missing or empty file yields the defaults. Malformed YAML is an
    /// error carrying the line and column.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file, then apply `TIMEPASS_*` overrides:
    ///
    /// - TIMEPASS_SERVER_HOST
    /// - TIMEPASS_SERVER_PORT
    /// - TIMEPASS_SERVER_CORS_ORIGIN
    /// - TIMEPASS_DATABASE_URL
    /// - TIMEPASS_STORAGE_PATH
    /// - TIMEPASS_STORAGE_PUBLIC_BASE_URL
    /// - TIMEPASS_AUTH_SESSION_DAYS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.stories.tick_ms == 0 {
            return Err(ConfigError::ValidationError(
                "stories.tick_ms must be greater than zero".to_string(),
            ));
        }
        if self.auth.session_days <= 0 {
            return Err(ConfigError::ValidationError(
                "auth.session_days must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("TIMEPASS_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("TIMEPASS_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("TIMEPASS_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }
        if let Ok(url) = std::env::var("TIMEPASS_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(path) = std::env::var("TIMEPASS_STORAGE_PATH") {
            self.storage.path = PathBuf::from(path);
        }
        if let Ok(base) = std::env::var("TIMEPASS_STORAGE_PUBLIC_BASE_URL") {
            self.storage.public_base_url = base;
        }
        if let Ok(days) = std::env::var("TIMEPASS_AUTH_SESSION_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                self.auth.session_days = days;
            }
        }
    }
}

/// Format YAML parsing error with location
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by `tests` and `property_tests`; both touch process environment.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_KEYS: &[&str] = &[
    "TIMEPASS_SERVER_HOST",
    "TIMEPASS_SERVER_PORT",
    "TIMEPASS_SERVER_CORS_ORIGIN",
    "TIMEPASS_DATABASE_URL",
    "TIMEPASS_STORAGE_PATH",
    "TIMEPASS_STORAGE_PUBLIC_BASE_URL",
    "TIMEPASS_AUTH_SESSION_DAYS",
];

#[cfg(test)]
fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        super::CONFIG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let path = std::path::Path::new("nonexistent_timepass_config.yml");
        let config = Config::load(path).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.url, "data/timepass.db");
        assert_eq!(config.storage.path, PathBuf::from("data/storage"));
        assert_eq!(config.auth.session_days, 7);
        assert_eq!(config.stories.ttl_hours, 24);
        assert_eq!(config.stories.image_duration_ms, 5_000);
        assert_eq!(config.stories.video_duration_ms, 10_000);
        assert_eq!(config.stories.tick_ms, 50);
        assert_eq!(config.search.debounce_ms, 300);
        assert_eq!(config.search.limit, 20);
    }

    #[test]
    fn test_load_empty_file_returns_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "   \n").unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.search.limit, 20);
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "stories:\n  image_duration_ms: 3000\n").unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.stories.image_duration_ms, 3000);
        assert_eq!(config.stories.video_duration_ms, 10_000);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_load_full_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
server:
  host: "127.0.0.1"
  port: 9000
  cors_origin: "https://timepass.example"
database:
  url: "sqlite:/var/lib/timepass/db.sqlite"
  max_connections: 5
storage:
  path: "/var/lib/timepass/objects"
  public_base_url: "https://cdn.timepass.example"
  max_file_size: 1024
  allowed_types: ["image/"]
auth:
  session_days: 30
search:
  debounce_ms: 500
  limit: 10
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.cors_origin, "https://timepass.example");
        assert_eq!(config.database.url, "sqlite:/var/lib/timepass/db.sqlite");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.storage.public_base_url, "https://cdn.timepass.example");
        assert_eq!(config.storage.allowed_types, vec!["image/".to_string()]);
        assert_eq!(config.auth.session_days, 30);
        assert_eq!(config.search.debounce_ms, 500);
        assert_eq!(config.search.limit, 10);
    }

    #[test]
    fn test_load_invalid_yaml_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: not_a_number\n").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        let err_msg = err.to_string();
        assert!(err_msg.contains("parse"));
        assert!(err_msg.contains("line"));
    }

    #[test]
    fn test_load_zero_tick_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "stories:\n  tick_ms: 0\n").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("tick_ms"));
    }

    #[test]
    fn test_default_allowed_types_cover_images_and_videos() {
        let storage = StorageConfig::default();
        assert_eq!(storage.allowed_types, vec!["image/".to_string(), "video/".to_string()]);
    }

    #[test]
    fn test_env_override_server_and_database() {
        let _guard = lock_env();
        clear_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  host: \"0.0.0.0\"\n  port: 8080\n").unwrap();

        std::env::set_var("TIMEPASS_SERVER_HOST", "192.168.1.1");
        std::env::set_var("TIMEPASS_SERVER_PORT", "4000");
        std::env::set_var("TIMEPASS_DATABASE_URL", ":memory:");

        let config = Config::load_with_env(file.path()).unwrap();

        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.database.url, ":memory:");

        clear_env();
    }

    #[test]
    fn test_env_override_storage_and_auth() {
        let _guard = lock_env();
        clear_env();

        let file = NamedTempFile::new().unwrap();
        std::env::set_var("TIMEPASS_STORAGE_PATH", "/tmp/objects");
        std::env::set_var("TIMEPASS_STORAGE_PUBLIC_BASE_URL", "http://cdn");
        std::env::set_var("TIMEPASS_AUTH_SESSION_DAYS", "14");

        let config = Config::load_with_env(file.path()).unwrap();

        assert_eq!(config.storage.path, PathBuf::from("/tmp/objects"));
        assert_eq!(config.storage.public_base_url, "http://cdn");
        assert_eq!(config.auth.session_days, 14);

        clear_env();
    }

    #[test]
    fn test_env_override_invalid_port_ignored() {
        let _guard = lock_env();
        clear_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: 3000\n").unwrap();
        std::env::set_var("TIMEPASS_SERVER_PORT", "not_a_port");

        let config = Config::load_with_env(file.path()).unwrap();
        assert_eq!(config.server.port, 3000);

        clear_env();
    }
}
