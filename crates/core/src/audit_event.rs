use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AuditEventId, PrincipalId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failure
}

/// Two-tier IP geolocation result (§4.8): a sentinel for private ranges, or
/// a resolved location from the local database or remote fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeoLocation {
    Private,
    Resolved { country: String, city: Option<String> },
    Unknown
}

/// Append-only audit record. Survives principal deletion: `principal_id`
/// becomes `None`, the row is never removed (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: AuditEventId,
    pub principal_id: Option<PrincipalId>,
    pub at: DateTime<Utc>,
    pub action: String,
    pub entity_kind: Option<String>,
    pub entity_id: Option<String>,
    pub ip: String,
    pub geo: Option<GeoLocation>,
    pub user_agent: String,
    pub outcome: AuditOutcome,
    pub detail_json: serde_json::Value
}
