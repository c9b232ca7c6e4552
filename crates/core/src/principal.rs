use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ids::PrincipalId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin
}

/// An authenticated acting identity (end user or administrator).
///
/// Invariant: `0 <= used_bytes <= quota_bytes` unless `quota_grace` is set by
/// an admin override; `used_bytes` is eventually consistent with the sum of
/// non-hard-deleted owned `LogFile.size_bytes` (§3, §8 property 1).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Principal {
    pub id: PrincipalId,
    #[validate(length(min = 1, max = 64))]
    pub handle: String,
    #[validate(email)]
    pub email: String,
    pub role: Role,
    /// Opaque password verifier (salted, computationally-hard hash). Never
    /// serialized back out to clients.
    #[serde(skip_serializing)]
    pub password_verifier: String,
    pub quota_bytes: i64,
    pub used_bytes: i64,
    /// Admin override permitting `used_bytes` to exceed `quota_bytes`
    /// transiently (§3).
    pub quota_grace: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>
}

impl Principal {
    #[must_use]
    pub fn is_over_quota(&self) -> bool {
        !self.quota_grace && self.used_bytes > self.quota_bytes
    }

    #[must_use]
    pub fn has_capacity_for(&self, additional_bytes: i64) -> bool {
        self.quota_grace || self.used_bytes + additional_bytes <= self.quota_bytes
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}
