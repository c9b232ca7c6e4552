use core::ids::PrincipalId;
use core::parser_descriptor::{ParserDescriptor, ParserPermission};
use sqlx::{PgPool, Row};

use crate::error::StorageError;

pub struct ParserDescriptorRepository {
    pool: PgPool
}

fn row_to_descriptor(row: &sqlx::postgres::PgRow) -> ParserDescriptor {
    ParserDescriptor {
        mode_key: row.get("mode_key"),
        display_name: row.get("display_name"),
        description: row.get("description"),
        enabled: row.get("enabled"),
        visible_to_users: row.get("visible_to_users"),
        admin_only: row.get("admin_only")
    }
}

impl ParserDescriptorRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, descriptor: &ParserDescriptor) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO parser_descriptors (mode_key, display_name, description, enabled, visible_to_users, admin_only)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (mode_key) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                description = EXCLUDED.description,
                enabled = EXCLUDED.enabled,
                visible_to_users = EXCLUDED.visible_to_users,
                admin_only = EXCLUDED.admin_only"
        )
        .bind(&descriptor.mode_key)
        .bind(&descriptor.display_name)
        .bind(&descriptor.description)
        .bind(descriptor.enabled)
        .bind(descriptor.visible_to_users)
        .bind(descriptor.admin_only)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_all(&self) -> Result<Vec<ParserDescriptor>, StorageError> {
        let rows = sqlx::query("SELECT * FROM parser_descriptors ORDER BY mode_key").fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_descriptor).collect())
    }

    pub async fn get_permission_override(
        &self,
        principal_id: PrincipalId,
        mode_key: &str
    ) -> Result<Option<bool>, StorageError> {
        let row = sqlx::query("SELECT allow FROM parser_permissions WHERE principal_id = $1 AND mode_key = $2")
            .bind(principal_id.as_uuid())
            .bind(mode_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("allow")))
    }

    pub async fn set_permission(&self, permission: &ParserPermission, mode_key: &str) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO parser_permissions (principal_id, mode_key, allow)
             VALUES ($1, $2, $3)
             ON CONFLICT (principal_id, mode_key) DO UPDATE SET allow = EXCLUDED.allow"
        )
        .bind(permission.principal_id.as_uuid())
        .bind(mode_key)
        .bind(permission.allow)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn clear_permission(&self, principal_id: PrincipalId, mode_key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM parser_permissions WHERE principal_id = $1 AND mode_key = $2")
            .bind(principal_id.as_uuid())
            .bind(mode_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
