use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{LogFileId, PrincipalId};

/// An uploaded archive, exclusively owned by a `Principal`. Soft-delete is
/// reversible; hard-delete is terminal and removes the backing bytes (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFile {
    pub id: LogFileId,
    pub principal_id: PrincipalId,
    /// Opaque object-store reference; `None` once hard-deleted.
    pub stored_path: Option<String>,
    pub original_name: String,
    pub size_bytes: i64,
    pub content_sha256: String,
    pub pinned: bool,
    pub created_at: DateTime<Utc>,
    pub soft_deleted_at: Option<DateTime<Utc>>,
    pub hard_deleted_at: Option<DateTime<Utc>>
}

impl LogFile {
    #[must_use]
    pub fn is_soft_deleted(&self) -> bool {
        self.soft_deleted_at.is_some()
    }

    #[must_use]
    pub fn is_hard_deleted(&self) -> bool {
        self.hard_deleted_at.is_some()
    }

    /// Whether the file is eligible to back a new Analysis submission (§4.4
    /// precondition 4).
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.is_soft_deleted() && !self.is_hard_deleted()
    }
}
