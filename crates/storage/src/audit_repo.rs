use core::audit_event::{AuditEvent, AuditOutcome, GeoLocation};
use core::ids::{AuditEventId, PrincipalId};
use sqlx::{PgPool, Row};

use crate::error::StorageError;

pub struct AuditEventRepository {
    pool: PgPool
}

fn outcome_str(outcome: AuditOutcome) -> &'static str {
    match outcome {
        AuditOutcome::Success => "success",
        AuditOutcome::Failure => "failure"
    }
}

fn parse_outcome(s: &str) -> AuditOutcome {
    if s == "failure" { AuditOutcome::Failure } else { AuditOutcome::Success }
}

fn row_to_event(row: &sqlx::postgres::PgRow) -> AuditEvent {
    let principal_id: Option<uuid::Uuid> = row.get("principal_id");
    let geo_json: Option<serde_json::Value> = row.get("geo");

    AuditEvent {
        id: AuditEventId(row.get("id")),
        principal_id: principal_id.map(PrincipalId),
        at: row.get("at"),
        action: row.get("action"),
        entity_kind: row.get("entity_kind"),
        entity_id: row.get("entity_id"),
        ip: row.get("ip"),
        geo: geo_json.and_then(|v| serde_json::from_value::<GeoLocation>(v).ok()),
        user_agent: row.get("user_agent"),
        outcome: parse_outcome(row.get("outcome")),
        detail_json: row.get("detail_json")
    }
}

impl AuditEventRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append-only: there is deliberately no update or delete method here
    /// (§3, §4.8 — audit rows outlive the principal that produced them).
    pub async fn append(&self, event: &AuditEvent) -> Result<AuditEventId, StorageError> {
        let geo_json = event.geo.as_ref().map(|g| serde_json::to_value(g).expect("GeoLocation always serializes"));

        let row = sqlx::query(
            "INSERT INTO audit_events (principal_id, at, action, entity_kind, entity_id, ip, geo, user_agent, outcome, detail_json)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING id"
        )
        .bind(event.principal_id.map(|p| p.as_uuid()))
        .bind(event.at)
        .bind(&event.action)
        .bind(&event.entity_kind)
        .bind(&event.entity_id)
        .bind(&event.ip)
        .bind(&geo_json)
        .bind(&event.user_agent)
        .bind(outcome_str(event.outcome))
        .bind(&event.detail_json)
        .fetch_one(&self.pool)
        .await?;

        Ok(AuditEventId(row.get("id")))
    }

    pub async fn list_range(
        &self,
        from: chrono::DateTime<chrono::Utc>,
        to: chrono::DateTime<chrono::Utc>,
        limit: i64
    ) -> Result<Vec<AuditEvent>, StorageError> {
        let rows = sqlx::query("SELECT * FROM audit_events WHERE at >= $1 AND at <= $2 ORDER BY at DESC LIMIT $3")
            .bind(from)
            .bind(to)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_event).collect())
    }

    /// Streams every row in `(from, to]` in ascending order for CSV export,
    /// one row fetched from the database connection at a time rather than
    /// the `fetch_all` + `LIMIT` the UI-facing `list_range` uses.
    pub fn stream_range_for_export(
        &self,
        from: chrono::DateTime<chrono::Utc>,
        to: chrono::DateTime<chrono::Utc>
    ) -> impl futures_util::Stream<Item = Result<AuditEvent, StorageError>> + '_ {
        use futures_util::StreamExt;

        sqlx::query("SELECT * FROM audit_events WHERE at >= $1 AND at <= $2 ORDER BY at ASC")
            .bind(from)
            .bind(to)
            .fetch(&self.pool)
            .map(|row_result| row_result.map(|row| row_to_event(&row)).map_err(StorageError::from))
    }
}
