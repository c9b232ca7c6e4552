use serde::{Deserialize, Serialize};

use crate::ids::PrincipalId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyScope {
    Global,
    Principal,
    Role
}

/// A retention rule at one of three scopes. Most-specific wins:
/// principal > role > global (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub scope: PolicyScope,
    pub scope_id: Option<String>,
    pub soft_after_days: u32,
    pub hard_after_soft_days: u32
}

impl RetentionPolicy {
    /// Picks the most specific applicable policy for a principal out of a
    /// candidate set, defaulting to `default_policy` if none apply.
    #[must_use]
    pub fn most_specific<'a>(
        policies: &'a [RetentionPolicy],
        principal_id: &PrincipalId,
        role: &str,
        default_policy: &'a RetentionPolicy
    ) -> &'a RetentionPolicy {
        let principal_key = principal_id.to_string();
        if let Some(p) = policies.iter().find(|p| {
            p.scope == PolicyScope::Principal && p.scope_id.as_deref() == Some(principal_key.as_str())
        }) {
            return p;
        }
        if let Some(p) = policies
            .iter()
            .find(|p| p.scope == PolicyScope::Role && p.scope_id.as_deref() == Some(role))
        {
            return p;
        }
        policies
            .iter()
            .find(|p| p.scope == PolicyScope::Global)
            .unwrap_or(default_policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_scope_wins_over_role_and_global() {
        let pid = PrincipalId::new();
        let default = RetentionPolicy {
            scope: PolicyScope::Global,
            scope_id: None,
            soft_after_days: 1,
            hard_after_soft_days: 1
        };
        let policies = vec![
            RetentionPolicy {
                scope: PolicyScope::Global,
                scope_id: None,
                soft_after_days: 30,
                hard_after_soft_days: 90
            },
            RetentionPolicy {
                scope: PolicyScope::Role,
                scope_id: Some("user".into()),
                soft_after_days: 15,
                hard_after_soft_days: 45
            },
            RetentionPolicy {
                scope: PolicyScope::Principal,
                scope_id: Some(pid.to_string()),
                soft_after_days: 5,
                hard_after_soft_days: 10
            },
        ];
        let picked = RetentionPolicy::most_specific(&policies, &pid, "user", &default);
        assert_eq!(picked.soft_after_days, 5);
    }
}
