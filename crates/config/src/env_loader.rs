//! Environment variable loader, env-var names per spec §6.
//!
//! Environment variables recognized: database URL, KV URL, object-store
//! backend selector, quota defaults, retention defaults, CORS origin list,
//! token signing/hashing secret, bind address/port, worker pool size,
//! per-mode parser binary paths (per-mode paths are loaded separately by the
//! `parsers` crate's registry, not here).

use std::env;

use crate::app_config::{
    AppConfig, AuthConfig, CorsConfig, DatabaseConfig, GeoConfig, HttpConfig, KvConfig,
    ObjectStoreBackend, ObjectStoreConfig, ParserConfig, QuotaConfig, RetentionConfig, WorkerConfig
};

fn env_str(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_num<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Load configuration purely from environment variables (12-factor style,
/// following `config/src/loader.rs` in the wider codebase this pattern is
/// drawn from).
pub fn load_from_env() -> AppConfig {
    let defaults = AppConfig::default();

    AppConfig {
        database: DatabaseConfig {
            url: env_str("DATABASE_URL", &defaults.database.url)
        },
        kv: KvConfig {
            url: env_str("KV_URL", &defaults.kv.url)
        },
        object_store: ObjectStoreConfig {
            backend: match env_str("OBJECT_STORE_BACKEND", "local").as_str() {
                "s3" | "s3_compatible" => ObjectStoreBackend::S3Compatible,
                _ => ObjectStoreBackend::LocalDisk
            },
            local_root: env_str("OBJECT_STORE_LOCAL_ROOT", &defaults.object_store.local_root),
            s3_bucket: env::var("OBJECT_STORE_S3_BUCKET").ok(),
            s3_endpoint: env::var("OBJECT_STORE_S3_ENDPOINT").ok(),
            scratch_dir: env_str("OBJECT_STORE_SCRATCH_DIR", &defaults.object_store.scratch_dir)
        },
        quota: QuotaConfig {
            default_quota_bytes: env_num("QUOTA_DEFAULT_BYTES", defaults.quota.default_quota_bytes),
            max_upload_bytes: env_num("QUOTA_MAX_UPLOAD_BYTES", defaults.quota.max_upload_bytes)
        },
        retention: RetentionConfig {
            soft_after_days: env_num("RETENTION_SOFT_AFTER_DAYS", defaults.retention.soft_after_days),
            hard_after_soft_days: env_num(
                "RETENTION_HARD_AFTER_SOFT_DAYS",
                defaults.retention.hard_after_soft_days
            ),
            soft_sweep_interval_secs: env_num(
                "RETENTION_SOFT_SWEEP_INTERVAL_SECS",
                defaults.retention.soft_sweep_interval_secs
            ),
            hard_sweep_interval_secs: env_num(
                "RETENTION_HARD_SWEEP_INTERVAL_SECS",
                defaults.retention.hard_sweep_interval_secs
            )
        },
        cors: CorsConfig {
            allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_default()
        },
        auth: AuthConfig {
            token_signing_secret: env_str("AUTH_TOKEN_SECRET", &defaults.auth.token_signing_secret),
            session_ttl_secs: env_num("AUTH_SESSION_TTL_SECS", defaults.auth.session_ttl_secs)
        },
        worker: WorkerConfig {
            pool_size: env_num("WORKER_POOL_SIZE", defaults.worker.pool_size),
            cancel_grace_secs: env_num("WORKER_CANCEL_GRACE_SECS", defaults.worker.cancel_grace_secs)
        },
        parser: ParserConfig {
            default_timeout_secs: env_num("PARSER_DEFAULT_TIMEOUT_SECS", defaults.parser.default_timeout_secs),
            default_memory_cap_bytes: env_num(
                "PARSER_DEFAULT_MEMORY_CAP_BYTES",
                defaults.parser.default_memory_cap_bytes
            ),
            free_text_max_lines: env_num("PARSER_FREE_TEXT_MAX_LINES", defaults.parser.free_text_max_lines)
        },
        http: HttpConfig {
            bind_address: env_str("HTTP_BIND_ADDRESS", &defaults.http.bind_address),
            request_timeout_secs: env_num("HTTP_REQUEST_TIMEOUT_SECS", defaults.http.request_timeout_secs),
            url_fetch_timeout_secs: env_num(
                "HTTP_URL_FETCH_TIMEOUT_SECS",
                defaults.http.url_fetch_timeout_secs
            )
        },
        geo: GeoConfig {
            local_db_path: env::var("GEO_LOCAL_DB_PATH").ok(),
            remote_lookup_url_template: env_str(
                "GEO_REMOTE_LOOKUP_URL_TEMPLATE",
                &defaults.geo.remote_lookup_url_template
            ),
            remote_timeout_secs: env_num("GEO_REMOTE_TIMEOUT_SECS", defaults.geo.remote_timeout_secs),
            cache_capacity: env_num("GEO_CACHE_CAPACITY", defaults.geo.cache_capacity)
        }
    }
}

/// Layer a TOML file over environment-derived defaults: env wins, file
/// fills gaps, hardcoded defaults fill whatever neither sets (§ambient
/// Configuration in SPEC_FULL.md).
pub fn load_from_file_then_env(path: &std::path::Path) -> Result<AppConfig, crate::ConfigError> {
    let from_env = load_from_env();
    if !path.exists() {
        return Ok(from_env);
    }
    let text = std::fs::read_to_string(path).map_err(|e| crate::ConfigError::Io {
        reason: e.to_string()
    })?;
    let file_config: AppConfig = toml::from_str(&text).map_err(|e| crate::ConfigError::Parse {
        reason: e.to_string()
    })?;

    let env_has_override = |key: &str| env::var(key).is_ok();

    Ok(AppConfig {
        database: if env_has_override("DATABASE_URL") {
            from_env.database
        } else {
            file_config.database
        },
        kv: if env_has_override("KV_URL") { from_env.kv } else { file_config.kv },
        ..file_config
    })
}
