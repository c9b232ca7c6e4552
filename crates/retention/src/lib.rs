//! Retention engine (C5): scheduled soft- and hard-delete sweeps over
//! `LogFile`s, each sweep idempotent and safe to skip on a missed tick, the
//! same shape the teacher codebase gives its background maintenance jobs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use core::audit_event::{AuditEvent, AuditOutcome, GeoLocation};
use core::ids::{AuditEventId, LogFileId, PrincipalId};
use core::retention_policy::RetentionPolicy;
use core::traits::ObjectStore;
use errors::CoreError;
use storage::{Repositories, SweepKind};

/// Actor recorded against sweep-produced audit events and deletion-log rows;
/// there is no principal behind a scheduled sweep (§4.5).
const SYSTEM_ACTOR: &str = "system";

/// Resolves the effective policy for a file's owner and compares it against
/// the file's own timestamps, rather than trusting a single global cutoff —
/// `list_soft_delete_candidates`/`list_hard_delete_candidates` only narrow
/// the search to the most lenient policy in play, so every candidate they
/// return is re-checked here against its owner's actual policy.
struct EffectivePolicies {
    policies: Vec<RetentionPolicy>,
    default_policy: RetentionPolicy
}

impl EffectivePolicies {
    fn resolve(&self, principal_id: &PrincipalId, role: &str) -> &RetentionPolicy {
        RetentionPolicy::most_specific(&self.policies, principal_id, role, &self.default_policy)
    }
}

pub struct RetentionEngine {
    repos: Repositories,
    object_store: Arc<dyn ObjectStore>,
    default_policy: RetentionPolicy
}

/// Outcome counters for one sweep pass, surfaced to the scheduler for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub candidates_examined: usize,
    pub acted_on: usize
}

impl RetentionEngine {
    #[must_use]
    pub fn new(repos: Repositories, object_store: Arc<dyn ObjectStore>, default_policy: RetentionPolicy) -> Self {
        Self { repos, object_store, default_policy }
    }

    async fn load_policies(&self) -> Result<EffectivePolicies, CoreError> {
        let policies = self.repos.retention_policies.list_all().await.map_err(CoreError::from)?;
        Ok(EffectivePolicies { policies, default_policy: self.default_policy.clone() })
    }

    async fn owner_role(&self, principal_id: PrincipalId) -> Result<String, CoreError> {
        let principal = self
            .repos
            .principals
            .get(principal_id)
            .await
            .map_err(CoreError::from)?
            .ok_or_else(|| CoreError::not_found("owning principal no longer exists"))?;
        Ok(match principal.role {
            core::principal::Role::Admin => "admin".to_string(),
            core::principal::Role::User => "user".to_string()
        })
    }

    /// For each active, unpinned LogFile whose owner's effective
    /// `soft_after_days` has elapsed since `created_at`, sets
    /// `soft_deleted_at` and cascades `source_deleted` onto referencing
    /// Analyses (§4.5).
    pub async fn soft_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, CoreError> {
        let effective = self.load_policies().await?;
        // Coarse prefilter: the most lenient soft_after_days across every
        // policy in play, so nothing that could still be in-window for a
        // stricter effective policy is missed.
        let most_lenient_soft_days = effective
            .policies
            .iter()
            .map(|p| p.soft_after_days)
            .chain(std::iter::once(effective.default_policy.soft_after_days))
            .max()
            .unwrap_or(effective.default_policy.soft_after_days);
        let coarse_cutoff = now - chrono::Duration::days(i64::from(most_lenient_soft_days));

        let candidates = self.repos.log_files.list_soft_delete_candidates(coarse_cutoff).await.map_err(CoreError::from)?;
        let mut report = SweepReport { candidates_examined: candidates.len(), acted_on: 0 };

        for log_file in candidates {
            let role = self.owner_role(log_file.principal_id).await?;
            let policy = effective.resolve(&log_file.principal_id, &role);
            let own_cutoff = now - chrono::Duration::days(i64::from(policy.soft_after_days));
            if log_file.created_at > own_cutoff {
                continue;
            }

            self.repos.log_files.soft_delete(log_file.id, now).await.map_err(CoreError::from)?;
            self.repos.analyses.mark_source_deleted(log_file.id).await.map_err(CoreError::from)?;
            self.record_deletion(log_file.id, SweepKind::Soft, now).await?;
            report.acted_on += 1;
        }

        tracing::info!(examined = report.candidates_examined, acted_on = report.acted_on, "soft retention sweep complete");
        Ok(report)
    }

    /// For each soft-deleted, unpinned LogFile whose owner's effective
    /// `hard_after_soft_days` has elapsed since `soft_deleted_at`, deletes
    /// the backing bytes, clears `stored_path`, and clears any
    /// `raw_text_ref` pointing into it (§4.5).
    pub async fn hard_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, CoreError> {
        let effective = self.load_policies().await?;
        let most_lenient_hard_days = effective
            .policies
            .iter()
            .map(|p| p.hard_after_soft_days)
            .chain(std::iter::once(effective.default_policy.hard_after_soft_days))
            .max()
            .unwrap_or(effective.default_policy.hard_after_soft_days);
        let coarse_cutoff = now - chrono::Duration::days(i64::from(most_lenient_hard_days));

        let candidates = self.repos.log_files.list_hard_delete_candidates(coarse_cutoff).await.map_err(CoreError::from)?;
        let mut report = SweepReport { candidates_examined: candidates.len(), acted_on: 0 };

        for log_file in candidates {
            let Some(soft_deleted_at) = log_file.soft_deleted_at else { continue };
            let role = self.owner_role(log_file.principal_id).await?;
            let policy = effective.resolve(&log_file.principal_id, &role);
            let own_cutoff = now - chrono::Duration::days(i64::from(policy.hard_after_soft_days));
            if soft_deleted_at > own_cutoff {
                continue;
            }

            if let Some(stored_path) = log_file.stored_path.as_deref() {
                self.object_store.delete(stored_path).await.map_err(CoreError::from)?;
                self.repos.analyses.clear_raw_text_ref(stored_path).await.map_err(CoreError::from)?;
            }
            self.repos.log_files.hard_delete(log_file.id, now).await.map_err(CoreError::from)?;
            self.record_deletion(log_file.id, SweepKind::Hard, now).await?;
            report.acted_on += 1;
        }

        tracing::info!(examined = report.candidates_examined, acted_on = report.acted_on, "hard retention sweep complete");
        Ok(report)
    }

    async fn record_deletion(&self, log_file_id: LogFileId, kind: SweepKind, at: DateTime<Utc>) -> Result<(), CoreError> {
        let action = match kind {
            SweepKind::Soft => "retention.soft_delete",
            SweepKind::Hard => "retention.hard_delete"
        };
        let event = AuditEvent {
            id: AuditEventId(0),
            principal_id: None,
            at,
            action: action.to_string(),
            entity_kind: Some("log_file".to_string()),
            entity_id: Some(log_file_id.to_string()),
            ip: "127.0.0.1".to_string(),
            geo: Some(GeoLocation::Private),
            user_agent: SYSTEM_ACTOR.to_string(),
            outcome: AuditOutcome::Success,
            detail_json: serde_json::json!({ "actor": SYSTEM_ACTOR })
        };
        self.repos.audit_events.append(&event).await.map_err(CoreError::from)?;
        self.repos.deletion_log.append(log_file_id, kind, SYSTEM_ACTOR, at).await.map_err(CoreError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use core::retention_policy::PolicyScope;

    use super::*;

    fn default_policy() -> RetentionPolicy {
        RetentionPolicy { scope: PolicyScope::Global, scope_id: None, soft_after_days: 30, hard_after_soft_days: 90 }
    }

    #[test]
    fn resolve_falls_back_to_default_when_no_policies_loaded() {
        let effective = EffectivePolicies { policies: vec![], default_policy: default_policy() };
        let resolved = effective.resolve(&PrincipalId::new(), "user");
        assert_eq!(resolved.soft_after_days, 30);
        assert_eq!(resolved.hard_after_soft_days, 90);
    }

    #[test]
    fn resolve_prefers_principal_scope_over_global() {
        let pid = PrincipalId::new();
        let policies = vec![
            RetentionPolicy { scope: PolicyScope::Global, scope_id: None, soft_after_days: 30, hard_after_soft_days: 90 },
            RetentionPolicy {
                scope: PolicyScope::Principal,
                scope_id: Some(pid.to_string()),
                soft_after_days: 5,
                hard_after_soft_days: 10
            },
        ];
        let effective = EffectivePolicies { policies, default_policy: default_policy() };
        let resolved = effective.resolve(&pid, "user");
        assert_eq!(resolved.soft_after_days, 5);
    }
}
