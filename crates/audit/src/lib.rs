//! Audit log & geo enrichment (C8): an append-only event writer with
//! two-tier IP geolocation, meta-audit of the audit log itself, and a
//! streaming CSV export that never buffers the full result set.

pub mod forwarded;
pub mod geo;

use std::net::IpAddr;
use std::sync::Arc;

use core::audit_event::{AuditEvent, AuditOutcome};
use core::ids::{AuditEventId, PrincipalId};
use errors::CoreError;
use futures_util::StreamExt;
use geo::GeoResolver;
use storage::Repositories;

pub use forwarded::resolve_client_ip;
pub use geo::{classify_private, GeoSource, LocalGeoSource, RemoteGeoSource};

pub struct AuditService {
    repos: Repositories,
    geo: Arc<GeoResolver>
}

impl AuditService {
    #[must_use]
    pub fn new(repos: Repositories, geo: Arc<GeoResolver>) -> Self {
        Self { repos, geo }
    }

    /// Appends one audit event, resolving `ip`'s geolocation through the
    /// cached two-tier resolver first (§4.8).
    #[allow(clippy::too_many_arguments)]
    pub async fn record(
        &self,
        principal_id: Option<PrincipalId>,
        action: &str,
        entity_kind: Option<&str>,
        entity_id: Option<&str>,
        ip: IpAddr,
        user_agent: &str,
        outcome: AuditOutcome,
        detail: serde_json::Value
    ) -> Result<AuditEventId, CoreError> {
        let geo = self.geo.resolve(ip).await;
        let event = AuditEvent {
            id: AuditEventId(0),
            principal_id,
            at: chrono::Utc::now(),
            action: action.to_string(),
            entity_kind: entity_kind.map(str::to_string),
            entity_id: entity_id.map(str::to_string),
            ip: ip.to_string(),
            geo: Some(geo),
            user_agent: user_agent.to_string(),
            outcome,
            detail_json: detail
        };
        self.repos.audit_events.append(&event).await.map_err(CoreError::from)
    }

    /// Lists events in `[from, to]`, recording the viewing itself as a
    /// `audit.view` event — viewing the audit log is an audited action
    /// (§4.8 meta-audit).
    pub async fn list_range(
        &self,
        viewer: PrincipalId,
        viewer_ip: IpAddr,
        viewer_user_agent: &str,
        from: chrono::DateTime<chrono::Utc>,
        to: chrono::DateTime<chrono::Utc>,
        limit: i64
    ) -> Result<Vec<AuditEvent>, CoreError> {
        self.record(
            Some(viewer),
            "audit.view",
            None,
            None,
            viewer_ip,
            viewer_user_agent,
            AuditOutcome::Success,
            serde_json::json!({ "from": from, "to": to, "limit": limit })
        )
        .await?;
        self.repos.audit_events.list_range(from, to, limit).await.map_err(CoreError::from)
    }

    /// Streams events in `[from, to]` as CSV rows directly into `sink`,
    /// never materializing the full result set (§4.8). The export itself
    /// is recorded as `audit.export`, same meta-audit rule as viewing.
    pub async fn export_csv(
        &self,
        viewer: PrincipalId,
        viewer_ip: IpAddr,
        viewer_user_agent: &str,
        from: chrono::DateTime<chrono::Utc>,
        to: chrono::DateTime<chrono::Utc>,
        sink: impl std::io::Write
    ) -> Result<(), CoreError> {
        self.record(
            Some(viewer),
            "audit.export",
            None,
            None,
            viewer_ip,
            viewer_user_agent,
            AuditOutcome::Success,
            serde_json::json!({ "from": from, "to": to })
        )
        .await?;

        let mut writer = csv::Writer::from_writer(sink);
        writer
            .write_record(["id", "principal_id", "at", "action", "entity_kind", "entity_id", "ip", "geo", "user_agent", "outcome"])
            .map_err(|e| CoreError::internal(e.to_string()))?;

        let mut rows = std::pin::pin!(self.repos.audit_events.stream_range_for_export(from, to));
        while let Some(row) = rows.next().await {
            let event = row.map_err(CoreError::from)?;
            writer
                .write_record([
                    event.id.to_string(),
                    event.principal_id.map(|p| p.to_string()).unwrap_or_default(),
                    event.at.to_rfc3339(),
                    event.action,
                    event.entity_kind.unwrap_or_default(),
                    event.entity_id.unwrap_or_default(),
                    event.ip,
                    event.geo.map(|g| format!("{g:?}")).unwrap_or_default(),
                    event.user_agent,
                    format!("{:?}", event.outcome)
                ])
                .map_err(|e| CoreError::internal(e.to_string()))?;
        }
        writer.flush().map_err(|e| CoreError::internal(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ip_resolution_is_reexported() {
        let remote: IpAddr = "203.0.113.1".parse().unwrap();
        assert_eq!(resolve_client_ip(None, &[], remote), remote);
    }
}
