use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{PrincipalId, SessionId};

/// Server-side session row backing a bearer token. Lifecycle: created on
/// successful login, invalidated on logout/password change/expiry (§4.6).
///
/// Invariant: no two live sessions share a `token_fingerprint`; a bearer
/// token is valid iff a matching unexpired `Session` exists (§8 property 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub principal_id: PrincipalId,
    /// Opaque one-way hash of the bearer token; the raw token is never
    /// persisted.
    pub token_fingerprint: String,
    pub expires_at: DateTime<Utc>,
    pub issued_ip: String,
    pub user_agent: String
}

impl Session {
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}
