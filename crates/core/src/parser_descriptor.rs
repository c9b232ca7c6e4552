use serde::{Deserialize, Serialize};

use crate::ids::PrincipalId;
use crate::principal::Role;

/// A registered parser variant. `mode_key` is the stable identifier
/// (glossary: "Mode key") passed through to the parser registry (C3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserDescriptor {
    pub mode_key: String,
    pub display_name: String,
    pub description: String,
    pub enabled: bool,
    pub visible_to_users: bool,
    pub admin_only: bool
}

/// Per-principal override of a descriptor's default visibility (§3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ParserPermission {
    pub principal_id: PrincipalId,
    pub allow: bool
}

impl ParserDescriptor {
    /// Visibility formula from §3:
    ///
    /// `enabled? AND (visible_to_users? OR principal.role=admin) AND NOT
    /// (admin_only? AND principal.role≠admin) AND no deny-row in
    /// ParserPermission`.
    #[must_use]
    pub fn is_visible_to(&self, role: Role, permission_override: Option<bool>) -> bool {
        if let Some(allow) = permission_override {
            if !allow {
                return false;
            }
        }
        if !self.enabled {
            return false;
        }
        let role_allows_base = self.visible_to_users || matches!(role, Role::Admin);
        if !role_allows_base {
            return false;
        }
        if self.admin_only && !matches!(role, Role::Admin) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(visible_to_users: bool, admin_only: bool, enabled: bool) -> ParserDescriptor {
        ParserDescriptor {
            mode_key: "bandwidth".into(),
            display_name: "Bandwidth".into(),
            description: "".into(),
            enabled,
            visible_to_users,
            admin_only
        }
    }

    #[test]
    fn disabled_mode_is_never_visible() {
        let d = descriptor(true, false, false);
        assert!(!d.is_visible_to(Role::Admin, None));
    }

    #[test]
    fn admin_only_hides_from_user() {
        let d = descriptor(true, true, true);
        assert!(!d.is_visible_to(Role::User, None));
        assert!(d.is_visible_to(Role::Admin, None));
    }

    #[test]
    fn deny_override_wins_over_visibility() {
        let d = descriptor(true, false, true);
        assert!(!d.is_visible_to(Role::User, Some(false)));
    }

    #[test]
    fn user_invisible_mode_without_override() {
        let d = descriptor(false, false, true);
        assert!(!d.is_visible_to(Role::User, None));
        assert!(d.is_visible_to(Role::Admin, None));
    }
}
