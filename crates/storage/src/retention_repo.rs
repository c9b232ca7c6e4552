use core::retention_policy::{PolicyScope, RetentionPolicy};
use sqlx::{PgPool, Row};

use crate::error::StorageError;

pub struct RetentionPolicyRepository {
    pool: PgPool
}

fn scope_str(scope: PolicyScope) -> &'static str {
    match scope {
        PolicyScope::Global => "global",
        PolicyScope::Principal => "principal",
        PolicyScope::Role => "role"
    }
}

fn parse_scope(s: &str) -> PolicyScope {
    match s {
        "principal" => PolicyScope::Principal,
        "role" => PolicyScope::Role,
        _ => PolicyScope::Global
    }
}

fn row_to_policy(row: &sqlx::postgres::PgRow) -> RetentionPolicy {
    let scope_id: String = row.get("scope_id");
    RetentionPolicy {
        scope: parse_scope(row.get("scope")),
        scope_id: if scope_id.is_empty() { None } else { Some(scope_id) },
        soft_after_days: row.get::<i32, _>("soft_after_days") as u32,
        hard_after_soft_days: row.get::<i32, _>("hard_after_soft_days") as u32
    }
}

impl RetentionPolicyRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, policy: &RetentionPolicy) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO retention_policies (scope, scope_id, soft_after_days, hard_after_soft_days)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (scope, scope_id) DO UPDATE SET
                soft_after_days = EXCLUDED.soft_after_days,
                hard_after_soft_days = EXCLUDED.hard_after_soft_days"
        )
        .bind(scope_str(policy.scope))
        .bind(policy.scope_id.as_deref().unwrap_or(""))
        .bind(policy.soft_after_days as i32)
        .bind(policy.hard_after_soft_days as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_all(&self) -> Result<Vec<RetentionPolicy>, StorageError> {
        let rows = sqlx::query("SELECT * FROM retention_policies").fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_policy).collect())
    }
}
