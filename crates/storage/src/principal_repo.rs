use core::ids::PrincipalId;
use core::principal::{Principal, Role};
use sqlx::{PgPool, Row};

use crate::error::StorageError;

pub struct PrincipalRepository {
    pool: PgPool
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Admin => "admin"
    }
}

fn parse_role(s: &str) -> Role {
    if s == "admin" { Role::Admin } else { Role::User }
}

fn row_to_principal(row: &sqlx::postgres::PgRow) -> Principal {
    Principal {
        id: PrincipalId(row.get("id")),
        handle: row.get("handle"),
        email: row.get("email"),
        role: parse_role(row.get("role")),
        password_verifier: row.get("password_verifier"),
        quota_bytes: row.get("quota_bytes"),
        used_bytes: row.get("used_bytes"),
        quota_grace: row.get("quota_grace"),
        active: row.get("active"),
        created_at: row.get("created_at"),
        last_login_at: row.get("last_login_at")
    }
}

impl PrincipalRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, principal: &Principal) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO principals
             (id, handle, email, role, password_verifier, quota_bytes, used_bytes, quota_grace, active, created_at, last_login_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        )
        .bind(principal.id.as_uuid())
        .bind(&principal.handle)
        .bind(&principal.email)
        .bind(role_str(principal.role))
        .bind(&principal.password_verifier)
        .bind(principal.quota_bytes)
        .bind(principal.used_bytes)
        .bind(principal.quota_grace)
        .bind(principal.active)
        .bind(principal.created_at)
        .bind(principal.last_login_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: PrincipalId) -> Result<Option<Principal>, StorageError> {
        let row = sqlx::query("SELECT * FROM principals WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_principal))
    }

    pub async fn get_by_handle(&self, handle: &str) -> Result<Option<Principal>, StorageError> {
        let row = sqlx::query("SELECT * FROM principals WHERE handle = $1")
            .bind(handle)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_principal))
    }

    pub async fn list(&self) -> Result<Vec<Principal>, StorageError> {
        let rows = sqlx::query("SELECT * FROM principals ORDER BY created_at").fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_principal).collect())
    }

    /// Atomically increments `used_bytes` by `delta` (can be negative on
    /// deletion), used on the upload path inside the same transaction as
    /// the `LogFile` insert (§4.4 precondition 3).
    pub async fn adjust_used_bytes(
        &self,
        executor: &mut sqlx::PgConnection,
        id: PrincipalId,
        delta: i64
    ) -> Result<(), StorageError> {
        sqlx::query("UPDATE principals SET used_bytes = used_bytes + $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(delta)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn set_quota(&self, id: PrincipalId, quota_bytes: i64) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE principals SET quota_bytes = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(quota_bytes)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    pub async fn set_role(&self, id: PrincipalId, role: Role) -> Result<(), StorageError> {
        sqlx::query("UPDATE principals SET role = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(role_str(role))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_quota_grace(&self, id: PrincipalId, quota_grace: bool) -> Result<(), StorageError> {
        sqlx::query("UPDATE principals SET quota_grace = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(quota_grace)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_active(&self, id: PrincipalId, active: bool) -> Result<(), StorageError> {
        sqlx::query("UPDATE principals SET active = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(active)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_password_verifier(&self, id: PrincipalId, verifier: &str) -> Result<(), StorageError> {
        sqlx::query("UPDATE principals SET password_verifier = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(verifier)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn touch_last_login(&self, id: PrincipalId, at: chrono::DateTime<chrono::Utc>) -> Result<(), StorageError> {
        sqlx::query("UPDATE principals SET last_login_at = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
