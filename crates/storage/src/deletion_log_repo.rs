use chrono::{DateTime, Utc};
use core::ids::LogFileId;
use sqlx::PgPool;

use crate::error::StorageError;

/// Which sweep produced a deletion-log row (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
    Soft,
    Hard
}

fn sweep_kind_str(kind: SweepKind) -> &'static str {
    match kind {
        SweepKind::Soft => "soft",
        SweepKind::Hard => "hard"
    }
}

pub struct DeletionLogRepository {
    pool: PgPool
}

impl DeletionLogRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends one row per deletion, independent of the `AuditEvent` also
    /// written for the same action — the deletion log is the retention
    /// engine's own record, scoped to `LogFile` lifecycle only (§4.5).
    pub async fn append(&self, log_file_id: LogFileId, kind: SweepKind, actor: &str, at: DateTime<Utc>) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO deletion_log (log_file_id, sweep_kind, actor, at) VALUES ($1, $2, $3, $4)")
            .bind(log_file_id.as_uuid())
            .bind(sweep_kind_str(kind))
            .bind(actor)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
