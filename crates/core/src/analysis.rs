use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AnalysisId, LogFileId, PrincipalId};

/// State machine for an Analysis (§4.4):
///
/// ```text
/// pending ──claim──▶ running ──success──▶ completed
///   │                  │
///   │                  ├──parser_error──▶ failed
///   │                  ├──timeout──────▶ failed
///   │                  └──cancel_req───▶ cancelled
///   └──quota_refused──▶ failed (never ran)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled
}

impl AnalysisStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AnalysisStatus::Completed | AnalysisStatus::Failed | AnalysisStatus::Cancelled
        )
    }

    /// Whether `self -> next` is a legal transition. Terminal states never
    /// transition further (§8 property 2).
    #[must_use]
    pub fn can_transition_to(self, next: AnalysisStatus) -> bool {
        use AnalysisStatus::{Cancelled, Completed, Failed, Pending, Running};
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

/// Why a terminal-state Analysis failed or was refused, distinct from the
/// HTTP-facing `errors::ErrorKind` because "partial" has no HTTP analogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisErrorKind {
    ParserFailure,
    ParserTimeout,
    ParserOom,
    QuotaRefused,
    /// Multi-mode analysis where at least one mode failed and no
    /// partial-success policy overrides the default (§4.4).
    Partial
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub id: AnalysisId,
    pub principal_id: PrincipalId,
    pub log_file_id: LogFileId,
    pub mode_keys: Vec<String>,
    pub timezone: String,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub status: AnalysisStatus,
    pub progress_pct: u8,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub error_kind: Option<AnalysisErrorKind>,
    pub error_message: Option<String>,
    pub session_label: Option<String>,
    pub external_ref: Option<String>,
    pub cancel_requested: bool,
    /// Set when the backing `LogFile` has since been soft-deleted; the
    /// Analysis itself remains visible (§4.5, open question resolved in
    /// DESIGN.md).
    pub source_deleted: bool
}

impl Analysis {
    /// Apply a progress update, enforcing monotonic non-decrease within a
    /// `running` episode (§4.4, §8 property 2).
    pub fn apply_progress(&mut self, pct: u8) {
        if self.status == AnalysisStatus::Running && pct > self.progress_pct {
            self.progress_pct = pct;
        }
    }
}

/// One parser mode's output, keyed by `(analysis_id, mode_key)` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis_id: AnalysisId,
    pub mode_key: String,
    /// `None` once the backing LogFile has been hard-deleted (§4.5).
    pub raw_text_ref: Option<String>,
    pub structured_payload: serde_json::Value,
    pub schema_version: u32,
    pub produced_at: DateTime<Utc>
}

#[cfg(test)]
mod tests {
    use super::*;
    use AnalysisStatus::{Cancelled, Completed, Failed, Pending, Running};

    #[test]
    fn terminal_states_never_transition() {
        for terminal in [Completed, Failed, Cancelled] {
            for next in [Pending, Running, Completed, Failed, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn pending_can_only_go_forward() {
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Failed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn progress_is_monotonic_within_running_episode() {
        let mut a = sample_analysis();
        a.status = Running;
        a.apply_progress(10);
        a.apply_progress(50);
        assert_eq!(a.progress_pct, 50);
        a.apply_progress(30);
        assert_eq!(a.progress_pct, 50, "progress must not decrease");
    }

    #[test]
    fn progress_ignored_outside_running() {
        let mut a = sample_analysis();
        a.status = Pending;
        a.apply_progress(90);
        assert_eq!(a.progress_pct, 0);
    }

    fn sample_analysis() -> Analysis {
        Analysis {
            id: crate::ids::AnalysisId::new(),
            principal_id: crate::ids::PrincipalId::new(),
            log_file_id: crate::ids::LogFileId::new(),
            mode_keys: vec!["bandwidth".into()],
            timezone: "UTC".into(),
            window_start: None,
            window_end: None,
            status: Pending,
            progress_pct: 0,
            started_at: None,
            finished_at: None,
            duration_ms: None,
            error_kind: None,
            error_message: None,
            session_label: None,
            external_ref: None,
            cancel_requested: false,
            source_deleted: false
        }
    }
}
