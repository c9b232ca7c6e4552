//! Configuration loading: environment variables first, an optional TOML file
//! second, validated with `validator`. Mirrors the teacher codebase's
//! `config` crate (env-first 12-factor loading, `Validate` derives).

pub mod app_config;
pub mod env_loader;

pub use app_config::{
    AppConfig, AuthConfig, CorsConfig, DatabaseConfig, GeoConfig, HttpConfig, KvConfig,
    ObjectStoreBackend, ObjectStoreConfig, ParserConfig, QuotaConfig, RetentionConfig, WorkerConfig
};
pub use env_loader::{load_from_env, load_from_file_then_env};
use thiserror::Error;
use validator::Validate;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {reason}")]
    Io { reason: String },
    #[error("failed to parse config file: {reason}")]
    Parse { reason: String },
    #[error("configuration is invalid: {reason}")]
    Invalid { reason: String }
}

/// Load and validate configuration: env vars, then an optional file at
/// `path` (if it exists) filling anything env left unset.
pub fn load(path: Option<&std::path::Path>) -> Result<AppConfig, ConfigError> {
    let config = match path {
        Some(p) => load_from_file_then_env(p)?,
        None => load_from_env()
    };
    config.validate().map_err(|e| ConfigError::Invalid { reason: e.to_string() })?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_validate() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn env_override_wins_over_default() {
        unsafe {
            std::env::set_var("DATABASE_URL", "postgres://example/custom");
        }
        let config = load_from_env();
        assert_eq!(config.database.url, "postgres://example/custom");
        unsafe {
            std::env::remove_var("DATABASE_URL");
        }
    }

    #[test]
    #[serial]
    fn missing_file_falls_back_to_env() {
        let config = load(Some(std::path::Path::new("/nonexistent/path.toml"))).unwrap();
        assert_eq!(config.http.bind_address, AppConfig::default().http.bind_address);
    }
}
