use core::analysis::{Analysis, AnalysisErrorKind, AnalysisResult, AnalysisStatus};
use core::ids::{AnalysisId, LogFileId, PrincipalId};
use sqlx::{PgPool, Row};

use crate::error::StorageError;

pub struct AnalysisRepository {
    pool: PgPool
}

fn status_str(status: AnalysisStatus) -> &'static str {
    match status {
        AnalysisStatus::Pending => "pending",
        AnalysisStatus::Running => "running",
        AnalysisStatus::Completed => "completed",
        AnalysisStatus::Failed => "failed",
        AnalysisStatus::Cancelled => "cancelled"
    }
}

fn parse_status(s: &str) -> AnalysisStatus {
    match s {
        "running" => AnalysisStatus::Running,
        "completed" => AnalysisStatus::Completed,
        "failed" => AnalysisStatus::Failed,
        "cancelled" => AnalysisStatus::Cancelled,
        _ => AnalysisStatus::Pending
    }
}

fn error_kind_str(kind: AnalysisErrorKind) -> &'static str {
    match kind {
        AnalysisErrorKind::ParserFailure => "parser_failure",
        AnalysisErrorKind::ParserTimeout => "parser_timeout",
        AnalysisErrorKind::ParserOom => "parser_oom",
        AnalysisErrorKind::QuotaRefused => "quota_refused",
        AnalysisErrorKind::Partial => "partial"
    }
}

fn parse_error_kind(s: &str) -> AnalysisErrorKind {
    match s {
        "parser_timeout" => AnalysisErrorKind::ParserTimeout,
        "parser_oom" => AnalysisErrorKind::ParserOom,
        "quota_refused" => AnalysisErrorKind::QuotaRefused,
        "partial" => AnalysisErrorKind::Partial,
        _ => AnalysisErrorKind::ParserFailure
    }
}

fn row_to_analysis(row: &sqlx::postgres::PgRow) -> Analysis {
    let mode_keys_json: serde_json::Value = row.get("mode_keys");
    let mode_keys: Vec<String> = serde_json::from_value(mode_keys_json).unwrap_or_default();
    let error_kind_raw: Option<String> = row.get("error_kind");

    Analysis {
        id: AnalysisId(row.get("id")),
        principal_id: PrincipalId(row.get("principal_id")),
        log_file_id: LogFileId(row.get("log_file_id")),
        mode_keys,
        timezone: row.get("timezone"),
        window_start: row.get("window_start"),
        window_end: row.get("window_end"),
        status: parse_status(row.get("status")),
        progress_pct: row.get::<i16, _>("progress_pct") as u8,
        started_at: row.get("started_at"),
        finished_at: row.get("finished_at"),
        duration_ms: row.get("duration_ms"),
        error_kind: error_kind_raw.as_deref().map(parse_error_kind),
        error_message: row.get("error_message"),
        session_label: row.get("session_label"),
        external_ref: row.get("external_ref"),
        cancel_requested: row.get("cancel_requested"),
        source_deleted: row.get("source_deleted")
    }
}

impl AnalysisRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, analysis: &Analysis) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO analyses
             (id, principal_id, log_file_id, mode_keys, timezone, window_start, window_end, status,
              progress_pct, started_at, finished_at, duration_ms, error_kind, error_message,
              session_label, external_ref, cancel_requested, source_deleted)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"
        )
        .bind(analysis.id.as_uuid())
        .bind(analysis.principal_id.as_uuid())
        .bind(analysis.log_file_id.as_uuid())
        .bind(serde_json::to_value(&analysis.mode_keys).expect("Vec<String> always serializes"))
        .bind(&analysis.timezone)
        .bind(analysis.window_start)
        .bind(analysis.window_end)
        .bind(status_str(analysis.status))
        .bind(i16::from(analysis.progress_pct))
        .bind(analysis.started_at)
        .bind(analysis.finished_at)
        .bind(analysis.duration_ms)
        .bind(analysis.error_kind.map(error_kind_str))
        .bind(&analysis.error_message)
        .bind(&analysis.session_label)
        .bind(&analysis.external_ref)
        .bind(analysis.cancel_requested)
        .bind(analysis.source_deleted)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: AnalysisId) -> Result<Option<Analysis>, StorageError> {
        let row = sqlx::query("SELECT * FROM analyses WHERE id = $1").bind(id.as_uuid()).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(row_to_analysis))
    }

    pub async fn list_for_principal(&self, principal_id: PrincipalId) -> Result<Vec<Analysis>, StorageError> {
        let rows = sqlx::query("SELECT * FROM analyses WHERE principal_id = $1 ORDER BY started_at DESC NULLS FIRST")
            .bind(principal_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_analysis).collect())
    }

    /// Compare-and-set transition: only succeeds if the row's current
    /// status still matches `expected_status`, so a worker that lost its
    /// claim cannot resurrect a job a cancel request already moved on from
    /// (§4.4).
    pub async fn try_transition(
        &self,
        id: AnalysisId,
        expected_status: AnalysisStatus,
        next_status: AnalysisStatus
    ) -> Result<bool, StorageError> {
        let result = sqlx::query("UPDATE analyses SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id.as_uuid())
            .bind(status_str(expected_status))
            .bind(status_str(next_status))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_started(&self, id: AnalysisId, at: chrono::DateTime<chrono::Utc>) -> Result<(), StorageError> {
        sqlx::query("UPDATE analyses SET started_at = $2 WHERE id = $1").bind(id.as_uuid()).bind(at).execute(&self.pool).await?;
        Ok(())
    }

    /// Progress is only persisted while `running`, and only forward —
    /// mirrors `Analysis::apply_progress`'s monotonic guard at the storage
    /// layer too (§8 property 2).
    pub async fn update_progress(&self, id: AnalysisId, pct: u8) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE analyses SET progress_pct = $2
             WHERE id = $1 AND status = 'running' AND progress_pct < $2"
        )
        .bind(id.as_uuid())
        .bind(i16::from(pct))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn finish(
        &self,
        id: AnalysisId,
        expected_status: AnalysisStatus,
        final_status: AnalysisStatus,
        finished_at: chrono::DateTime<chrono::Utc>,
        duration_ms: i64,
        error_kind: Option<AnalysisErrorKind>,
        error_message: Option<&str>
    ) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "UPDATE analyses SET status = $3, finished_at = $4, duration_ms = $5, error_kind = $6, error_message = $7
             WHERE id = $1 AND status = $2"
        )
        .bind(id.as_uuid())
        .bind(status_str(expected_status))
        .bind(status_str(final_status))
        .bind(finished_at)
        .bind(duration_ms)
        .bind(error_kind.map(error_kind_str))
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn request_cancel(&self, id: AnalysisId) -> Result<(), StorageError> {
        sqlx::query("UPDATE analyses SET cancel_requested = TRUE WHERE id = $1").bind(id.as_uuid()).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn mark_source_deleted(&self, log_file_id: LogFileId) -> Result<(), StorageError> {
        sqlx::query("UPDATE analyses SET source_deleted = TRUE WHERE log_file_id = $1")
            .bind(log_file_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn upsert_result(&self, result: &AnalysisResult) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO analysis_results (analysis_id, mode_key, raw_text_ref, structured_payload, schema_version, produced_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (analysis_id, mode_key) DO UPDATE SET
                raw_text_ref = EXCLUDED.raw_text_ref,
                structured_payload = EXCLUDED.structured_payload,
                schema_version = EXCLUDED.schema_version,
                produced_at = EXCLUDED.produced_at"
        )
        .bind(result.analysis_id.as_uuid())
        .bind(&result.mode_key)
        .bind(&result.raw_text_ref)
        .bind(&result.structured_payload)
        .bind(result.schema_version as i32)
        .bind(result.produced_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Clears `raw_text_ref` on every result that pointed into a
    /// hard-deleted file; `structured_payload` is untouched since it is
    /// independent of the backing bytes (§4.5).
    pub async fn clear_raw_text_ref(&self, raw_text_ref: &str) -> Result<u64, StorageError> {
        let result = sqlx::query("UPDATE analysis_results SET raw_text_ref = NULL WHERE raw_text_ref = $1")
            .bind(raw_text_ref)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_results(&self, analysis_id: AnalysisId) -> Result<Vec<AnalysisResult>, StorageError> {
        let rows = sqlx::query("SELECT * FROM analysis_results WHERE analysis_id = $1")
            .bind(analysis_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| AnalysisResult {
                analysis_id: AnalysisId(row.get("analysis_id")),
                mode_key: row.get("mode_key"),
                raw_text_ref: row.get("raw_text_ref"),
                structured_payload: row.get("structured_payload"),
                schema_version: row.get::<i32, _>("schema_version") as u32,
                produced_at: row.get("produced_at")
            })
            .collect())
    }
}
