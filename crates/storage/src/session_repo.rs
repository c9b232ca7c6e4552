use core::ids::{PrincipalId, SessionId};
use core::session::Session;
use sqlx::{PgPool, Row};

use crate::error::StorageError;

pub struct SessionRepository {
    pool: PgPool
}

fn row_to_session(row: &sqlx::postgres::PgRow) -> Session {
    Session {
        id: SessionId(row.get("id")),
        principal_id: PrincipalId(row.get("principal_id")),
        token_fingerprint: row.get("token_fingerprint"),
        expires_at: row.get("expires_at"),
        issued_ip: row.get("issued_ip"),
        user_agent: row.get("user_agent")
    }
}

impl SessionRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, session: &Session) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO sessions (id, principal_id, token_fingerprint, expires_at, issued_ip, user_agent)
             VALUES ($1, $2, $3, $4, $5, $6)"
        )
        .bind(session.id.as_uuid())
        .bind(session.principal_id.as_uuid())
        .bind(&session.token_fingerprint)
        .bind(session.expires_at)
        .bind(&session.issued_ip)
        .bind(&session.user_agent)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_by_fingerprint(&self, fingerprint: &str) -> Result<Option<Session>, StorageError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE token_fingerprint = $1")
            .bind(fingerprint)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_session))
    }

    pub async fn delete(&self, id: SessionId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM sessions WHERE id = $1").bind(id.as_uuid()).execute(&self.pool).await?;
        Ok(())
    }

    /// Invalidates every live session for a principal — logout-all, password
    /// change (§4.6).
    pub async fn delete_all_for_principal(&self, principal_id: PrincipalId) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM sessions WHERE principal_id = $1")
            .bind(principal_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_expired(&self, now: chrono::DateTime<chrono::Utc>) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1").bind(now).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
