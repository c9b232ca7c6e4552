//! Central registry of metric name constants so emitting and scraping code
//! can't drift out of sync.

pub const PARSER_WORKERS_ACTIVE: &str = "logforge_parser_workers_active";
pub const PARSER_QUEUE_DEPTH: &str = "logforge_parser_queue_depth";
pub const ANALYSES_COMPLETED_TOTAL: &str = "logforge_analyses_completed_total";
pub const ANALYSES_FAILED_TOTAL: &str = "logforge_analyses_failed_total";
pub const ANALYSES_CANCELLED_TOTAL: &str = "logforge_analyses_cancelled_total";
pub const RATE_LIMIT_REJECTIONS_TOTAL: &str = "logforge_rate_limit_rejections_total";
pub const RETENTION_SOFT_DELETED_TOTAL: &str = "logforge_retention_soft_deleted_total";
pub const RETENTION_HARD_DELETED_TOTAL: &str = "logforge_retention_hard_deleted_total";
pub const UPLOAD_BYTES_TOTAL: &str = "logforge_upload_bytes_total";
