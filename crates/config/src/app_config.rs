use serde::{Deserialize, Serialize};
use validator::Validate;

/// Top-level configuration, aggregating every subsystem's settings (§6).
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub kv: KvConfig,
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub geo: GeoConfig
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct DatabaseConfig {
    #[validate(length(min = 1))]
    pub url: String
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/logforge".to_string()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct KvConfig {
    #[validate(length(min = 1))]
    pub url: String
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string()
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ObjectStoreBackend {
    #[default]
    LocalDisk,
    S3Compatible
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ObjectStoreConfig {
    pub backend: ObjectStoreBackend,
    pub local_root: String,
    pub s3_bucket: Option<String>,
    pub s3_endpoint: Option<String>,
    pub scratch_dir: String
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            backend: ObjectStoreBackend::LocalDisk,
            local_root: "./data/objects".to_string(),
            s3_bucket: None,
            s3_endpoint: None,
            scratch_dir: "./data/scratch".to_string()
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate, PartialEq)]
pub struct QuotaConfig {
    pub default_quota_bytes: i64,
    pub max_upload_bytes: i64
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            default_quota_bytes: 10 * 1024 * 1024 * 1024,
            max_upload_bytes: 500 * 1024 * 1024
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate, PartialEq)]
pub struct RetentionConfig {
    pub soft_after_days: u32,
    pub hard_after_soft_days: u32,
    pub soft_sweep_interval_secs: u64,
    pub hard_sweep_interval_secs: u64
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            soft_after_days: 30,
            hard_after_soft_days: 90,
            soft_sweep_interval_secs: 3600,
            hard_sweep_interval_secs: 86_400
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct AuthConfig {
    #[validate(length(min = 16))]
    pub token_signing_secret: String,
    pub session_ttl_secs: i64
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_signing_secret: "change-me-in-production-please-0123".to_string(),
            session_ttl_secs: 24 * 3600
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate, PartialEq)]
pub struct WorkerConfig {
    pub pool_size: usize,
    pub cancel_grace_secs: u64
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pool_size: num_cpus(),
            cancel_grace_secs: 5
        }
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(4)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate, PartialEq)]
pub struct ParserConfig {
    pub default_timeout_secs: u64,
    pub default_memory_cap_bytes: u64,
    pub free_text_max_lines: usize
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 600,
            default_memory_cap_bytes: 512 * 1024 * 1024,
            free_text_max_lines: 1000
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct HttpConfig {
    pub bind_address: String,
    pub request_timeout_secs: u64,
    pub url_fetch_timeout_secs: u64
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            url_fetch_timeout_secs: 300
        }
    }
}

/// Two-tier IP geolocation (§4.8): a local offline database path consulted
/// first, a remote HTTP service as fallback.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct GeoConfig {
    pub local_db_path: Option<String>,
    pub remote_lookup_url_template: String,
    pub remote_timeout_secs: u64,
    pub cache_capacity: usize
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            local_db_path: None,
            remote_lookup_url_template: "https://ipwho.is/{ip}".to_string(),
            remote_timeout_secs: 2,
            cache_capacity: 2000
        }
    }
}
