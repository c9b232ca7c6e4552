//! Persistent data model (C10): Postgres repositories for every entity in
//! the domain model, built directly on `sqlx` query builders rather than
//! an ORM, matching the teacher codebase's `storage` crate.

pub mod analysis_repo;
pub mod audit_repo;
pub mod deletion_log_repo;
pub mod error;
pub mod log_file_repo;
pub mod parser_repo;
pub mod principal_repo;
pub mod retention_repo;
pub mod schema;
pub mod session_repo;

pub use analysis_repo::AnalysisRepository;
pub use audit_repo::AuditEventRepository;
pub use deletion_log_repo::{DeletionLogRepository, SweepKind};
pub use error::StorageError;
pub use log_file_repo::LogFileRepository;
pub use parser_repo::ParserDescriptorRepository;
pub use principal_repo::PrincipalRepository;
pub use retention_repo::RetentionPolicyRepository;
pub use schema::initialize_schema;
pub use session_repo::SessionRepository;

use sqlx::PgPool;

/// Bundles one repository per entity behind a single shared pool, the way
/// `api`'s router state aggregates component handles (§3).
#[derive(Clone)]
pub struct Repositories {
    pub principals: std::sync::Arc<PrincipalRepository>,
    pub sessions: std::sync::Arc<SessionRepository>,
    pub log_files: std::sync::Arc<LogFileRepository>,
    pub analyses: std::sync::Arc<AnalysisRepository>,
    pub retention_policies: std::sync::Arc<RetentionPolicyRepository>,
    pub parser_descriptors: std::sync::Arc<ParserDescriptorRepository>,
    pub audit_events: std::sync::Arc<AuditEventRepository>,
    pub deletion_log: std::sync::Arc<DeletionLogRepository>
}

impl Repositories {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            principals: std::sync::Arc::new(PrincipalRepository::new(pool.clone())),
            sessions: std::sync::Arc::new(SessionRepository::new(pool.clone())),
            log_files: std::sync::Arc::new(LogFileRepository::new(pool.clone())),
            analyses: std::sync::Arc::new(AnalysisRepository::new(pool.clone())),
            retention_policies: std::sync::Arc::new(RetentionPolicyRepository::new(pool.clone())),
            parser_descriptors: std::sync::Arc::new(ParserDescriptorRepository::new(pool.clone())),
            audit_events: std::sync::Arc::new(AuditEventRepository::new(pool.clone())),
            deletion_log: std::sync::Arc::new(DeletionLogRepository::new(pool))
        }
    }
}

pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new().max_connections(10).connect(database_url).await
}
