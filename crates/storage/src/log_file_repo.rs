use core::ids::{LogFileId, PrincipalId};
use core::log_file::LogFile;
use sqlx::{PgConnection, PgPool, Row};

use crate::error::StorageError;

pub struct LogFileRepository {
    pool: PgPool
}

fn row_to_log_file(row: &sqlx::postgres::PgRow) -> LogFile {
    LogFile {
        id: LogFileId(row.get("id")),
        principal_id: PrincipalId(row.get("principal_id")),
        stored_path: row.get("stored_path"),
        original_name: row.get("original_name"),
        size_bytes: row.get("size_bytes"),
        content_sha256: row.get("content_sha256"),
        pinned: row.get("pinned"),
        created_at: row.get("created_at"),
        soft_deleted_at: row.get("soft_deleted_at"),
        hard_deleted_at: row.get("hard_deleted_at")
    }
}

impl LogFileRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts the `LogFile` row and charges the principal's quota in one
    /// transaction, so a crash between the two never leaves quota
    /// inconsistent with stored bytes (§4.4 precondition 3, §8 property 1).
    pub async fn create_with_quota_charge(&self, log_file: &LogFile) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;
        insert_log_file(&mut tx, log_file).await?;
        sqlx::query("UPDATE principals SET used_bytes = used_bytes + $2 WHERE id = $1")
            .bind(log_file.principal_id.as_uuid())
            .bind(log_file.size_bytes)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Inserts the `LogFile` row without charging quota, for an upload that's
    /// already over capacity — the row still backs the `failed`/
    /// `quota_refused` Analysis it's attached to, but `used_bytes` is left
    /// untouched (§4.4 precondition 3, §8 property 1).
    pub async fn create_without_quota_charge(&self, log_file: &LogFile) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await?;
        insert_log_file(&mut conn, log_file).await
    }

    pub async fn get(&self, id: LogFileId) -> Result<Option<LogFile>, StorageError> {
        let row = sqlx::query("SELECT * FROM log_files WHERE id = $1").bind(id.as_uuid()).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(row_to_log_file))
    }

    pub async fn list_for_principal(&self, principal_id: PrincipalId) -> Result<Vec<LogFile>, StorageError> {
        let rows = sqlx::query("SELECT * FROM log_files WHERE principal_id = $1 ORDER BY created_at DESC")
            .bind(principal_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_log_file).collect())
    }

    pub async fn set_pinned(&self, id: LogFileId, pinned: bool) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE log_files SET pinned = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(pinned)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    pub async fn soft_delete(&self, id: LogFileId, at: chrono::DateTime<chrono::Utc>) -> Result<(), StorageError> {
        sqlx::query("UPDATE log_files SET soft_deleted_at = $2 WHERE id = $1 AND soft_deleted_at IS NULL")
            .bind(id.as_uuid())
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Clears `stored_path` and stamps `hard_deleted_at`; the caller is
    /// responsible for deleting the backing object-store bytes first
    /// (§4.5 — this row update is the "point of no return" marker).
    pub async fn hard_delete(&self, id: LogFileId, at: chrono::DateTime<chrono::Utc>) -> Result<(), StorageError> {
        sqlx::query("UPDATE log_files SET stored_path = NULL, hard_deleted_at = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Soft-deleted, not pinned, older than the cutoff — candidates for the
    /// hard-delete sweep (§4.5).
    pub async fn list_hard_delete_candidates(
        &self,
        soft_deleted_before: chrono::DateTime<chrono::Utc>
    ) -> Result<Vec<LogFile>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM log_files
             WHERE soft_deleted_at IS NOT NULL AND soft_deleted_at <= $1
               AND hard_deleted_at IS NULL AND pinned = FALSE"
        )
        .bind(soft_deleted_before)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_log_file).collect())
    }

    /// Active (not pinned, not already soft-deleted), older than the
    /// cutoff — candidates for the soft-delete sweep (§4.5).
    pub async fn list_soft_delete_candidates(
        &self,
        created_before: chrono::DateTime<chrono::Utc>
    ) -> Result<Vec<LogFile>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM log_files
             WHERE created_at <= $1 AND soft_deleted_at IS NULL AND pinned = FALSE"
        )
        .bind(created_before)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_log_file).collect())
    }
}

async fn insert_log_file(conn: &mut PgConnection, log_file: &LogFile) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO log_files
         (id, principal_id, stored_path, original_name, size_bytes, content_sha256, pinned, created_at, soft_deleted_at, hard_deleted_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
    )
    .bind(log_file.id.as_uuid())
    .bind(log_file.principal_id.as_uuid())
    .bind(&log_file.stored_path)
    .bind(&log_file.original_name)
    .bind(log_file.size_bytes)
    .bind(&log_file.content_sha256)
    .bind(log_file.pinned)
    .bind(log_file.created_at)
    .bind(log_file.soft_deleted_at)
    .bind(log_file.hard_deleted_at)
    .execute(conn)
    .await?;
    Ok(())
}
