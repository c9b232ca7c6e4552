use chrono::{DateTime, Utc};
use core::analysis::{Analysis, AnalysisErrorKind, AnalysisStatus};
use core::ids::{AnalysisId, LogFileId, PrincipalId};
use core::log_file::LogFile;
use core::parser_descriptor::ParserDescriptor;
use core::principal::{Principal, Role};
use errors::CoreError;
use storage::Repositories;

/// Inputs to an Analysis submission, gathered by the caller (typically the
/// `api` crate's upload or re-analyze handler) before any persistence.
pub struct SubmissionRequest {
    pub principal: Principal,
    pub log_file_id: LogFileId,
    pub mode_keys: Vec<String>,
    pub timezone: String,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
    pub session_label: Option<String>,
    pub external_ref: Option<String>,
    /// Set by the upload handler when the *upload itself* would have
    /// exceeded quota; such an Analysis is created directly in `failed`
    /// with `error_kind = quota_refused`, never reaching `pending` (§4.4).
    pub quota_refused: bool
}

/// Checks submission preconditions 1, 2, and 4 from §4.4 (precondition 3,
/// the upload-path quota check, is the caller's responsibility — it is
/// charged atomically with the `LogFile` insert in `storage`).
pub fn check_preconditions(
    principal: &Principal,
    log_file: &LogFile,
    mode_keys: &[String],
    visible_descriptors: &[ParserDescriptor],
    permission_overrides: &std::collections::HashMap<String, bool>
) -> Result<(), CoreError> {
    if !principal.active {
        return Err(CoreError::forbidden("principal is not active"));
    }
    if mode_keys.is_empty() {
        return Err(CoreError::input_invalid("mode_keys must be non-empty"));
    }
    for mode_key in mode_keys {
        let descriptor = visible_descriptors.iter().find(|d| &d.mode_key == mode_key);
        let visible = descriptor
            .is_some_and(|d| d.is_visible_to(principal.role, permission_overrides.get(mode_key).copied()));
        if !visible {
            return Err(CoreError::forbidden(format!("mode '{mode_key}' is not visible to this principal")));
        }
    }
    if !log_file.is_usable() {
        return Err(CoreError::conflict("log file has been deleted"));
    }
    Ok(())
}

/// Builds the Analysis row per §4.4: `pending` normally, or `failed` with
/// `error_kind = quota_refused` directly when `quota_refused` is set
/// (never ran, the `└──quota_refused──▶ failed` edge in the state diagram).
pub async fn submit(repos: &Repositories, request: SubmissionRequest) -> Result<Analysis, CoreError> {
    let now = Utc::now();
    let (status, error_kind, error_message) = if request.quota_refused {
        (AnalysisStatus::Failed, Some(AnalysisErrorKind::QuotaRefused), Some("upload would exceed quota".to_string()))
    } else {
        (AnalysisStatus::Pending, None, None)
    };

    let analysis = Analysis {
        id: AnalysisId::new(),
        principal_id: request.principal.id,
        log_file_id: request.log_file_id,
        mode_keys: request.mode_keys,
        timezone: request.timezone,
        window_start: request.window_start,
        window_end: request.window_end,
        status,
        progress_pct: 0,
        started_at: None,
        finished_at: if request.quota_refused { Some(now) } else { None },
        duration_ms: if request.quota_refused { Some(0) } else { None },
        error_kind,
        error_message,
        session_label: request.session_label,
        external_ref: request.external_ref,
        cancel_requested: false,
        source_deleted: false
    };

    repos.analyses.create(&analysis).await.map_err(CoreError::from)?;
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(mode_key: &str, visible_to_users: bool, admin_only: bool) -> ParserDescriptor {
        ParserDescriptor {
            mode_key: mode_key.to_string(),
            display_name: mode_key.to_string(),
            description: String::new(),
            enabled: true,
            visible_to_users,
            admin_only
        }
    }

    fn principal(role: Role, active: bool) -> Principal {
        Principal {
            id: PrincipalId::new(),
            handle: "alice".to_string(),
            email: "alice@example.com".to_string(),
            role,
            password_verifier: String::new(),
            quota_bytes: 1000,
            used_bytes: 0,
            quota_grace: false,
            active,
            created_at: Utc::now(),
            last_login_at: None
        }
    }

    fn log_file(principal_id: PrincipalId) -> LogFile {
        LogFile {
            id: LogFileId::new(),
            principal_id,
            stored_path: Some("x".to_string()),
            original_name: "a.tar.gz".to_string(),
            size_bytes: 10,
            content_sha256: "h".to_string(),
            pinned: false,
            created_at: Utc::now(),
            soft_deleted_at: None,
            hard_deleted_at: None
        }
    }

    #[test]
    fn inactive_principal_is_rejected() {
        let p = principal(Role::User, false);
        let lf = log_file(p.id);
        let result = check_preconditions(&p, &lf, &["bandwidth".to_string()], &[descriptor("bandwidth", true, false)], &Default::default());
        assert!(result.is_err());
    }

    #[test]
    fn empty_mode_keys_is_rejected() {
        let p = principal(Role::User, true);
        let lf = log_file(p.id);
        let result = check_preconditions(&p, &lf, &[], &[], &Default::default());
        assert!(result.is_err());
    }

    #[test]
    fn invisible_mode_is_rejected() {
        let p = principal(Role::User, true);
        let lf = log_file(p.id);
        let descriptors = vec![descriptor("admin_mode", true, true)];
        let result = check_preconditions(&p, &lf, &["admin_mode".to_string()], &descriptors, &Default::default());
        assert!(result.is_err());
    }

    #[test]
    fn deleted_log_file_is_rejected() {
        let p = principal(Role::User, true);
        let mut lf = log_file(p.id);
        lf.soft_deleted_at = Some(Utc::now());
        let descriptors = vec![descriptor("bandwidth", true, false)];
        let result = check_preconditions(&p, &lf, &["bandwidth".to_string()], &descriptors, &Default::default());
        assert!(result.is_err());
    }

    #[test]
    fn valid_submission_passes() {
        let p = principal(Role::User, true);
        let lf = log_file(p.id);
        let descriptors = vec![descriptor("bandwidth", true, false)];
        let result = check_preconditions(&p, &lf, &["bandwidth".to_string()], &descriptors, &Default::default());
        assert!(result.is_ok());
    }
}
