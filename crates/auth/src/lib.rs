//! Auth & session store (C6): password hashing and policy, opaque bearer
//! tokens fingerprinted for server-side lookup, and the login/logout/
//! change-password flows that tie them to `storage`'s `Principal`/`Session`
//! rows (§4.6).

pub mod password;
pub mod token;

use chrono::{DateTime, Duration, Utc};
use core::ids::{PrincipalId, SessionId};
use core::principal::Principal;
use core::session::Session;
use errors::AuthError;
use storage::Repositories;

pub const SESSION_TTL: Duration = Duration::hours(24);

pub struct LoginOutcome {
    pub token: String,
    pub principal: Principal
}

pub struct AuthService {
    repos: Repositories
}

impl AuthService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Verifies credentials, rejects inactive principals, issues a bearer
    /// token, and persists its fingerprint as a new `Session` row (§4.6).
    pub async fn login(&self, handle: &str, password: &str, issued_ip: &str, user_agent: &str) -> Result<LoginOutcome, AuthError> {
        let principal = self
            .repos
            .principals
            .get_by_handle(handle)
            .await
            .map_err(|_| AuthError::InvalidCredentials)?
            .ok_or(AuthError::InvalidCredentials)?;

        if !password::verify_password(password, &principal.password_verifier) {
            return Err(AuthError::InvalidCredentials);
        }
        if !principal.active {
            return Err(AuthError::Inactive);
        }

        let issued = token::issue();
        let session = Session {
            id: SessionId::new(),
            principal_id: principal.id,
            token_fingerprint: issued.fingerprint,
            expires_at: Utc::now() + SESSION_TTL,
            issued_ip: issued_ip.to_string(),
            user_agent: user_agent.to_string()
        };
        self.repos.sessions.create(&session).await.map_err(|_| AuthError::InvalidCredentials)?;
        let _ = self.repos.principals.touch_last_login(principal.id, Utc::now()).await;

        Ok(LoginOutcome { token: issued.raw, principal })
    }

    /// Token validation (§4.6): recompute the fingerprint, look up the
    /// session, and reject an expired or missing one with `SessionExpired`.
    pub async fn authenticate(&self, raw_token: &str, now: DateTime<Utc>) -> Result<(Session, Principal), AuthError> {
        let fingerprint = token::fingerprint_of(raw_token);
        let session = self
            .repos
            .sessions
            .get_by_fingerprint(&fingerprint)
            .await
            .map_err(|_| AuthError::SessionExpired)?
            .ok_or(AuthError::SessionExpired)?;

        if !session.is_live(now) {
            return Err(AuthError::SessionExpired);
        }

        let principal = self
            .repos
            .principals
            .get(session.principal_id)
            .await
            .map_err(|_| AuthError::SessionExpired)?
            .ok_or(AuthError::SessionExpired)?;
        if !principal.active {
            return Err(AuthError::Inactive);
        }

        Ok((session, principal))
    }

    pub async fn logout(&self, session_id: SessionId) -> Result<(), AuthError> {
        self.repos.sessions.delete(session_id).await.map_err(|_| AuthError::SessionExpired)
    }

    /// Verifies the current password, enforces policy on the new one,
    /// rotates the verifier, and invalidates every other live session for
    /// the principal (§4.6).
    pub async fn change_password(&self, principal_id: PrincipalId, current: &str, next: &str) -> Result<(), AuthError> {
        let principal = self
            .repos
            .principals
            .get(principal_id)
            .await
            .map_err(|_| AuthError::InvalidCredentials)?
            .ok_or(AuthError::InvalidCredentials)?;

        if !password::verify_password(current, &principal.password_verifier) {
            return Err(AuthError::InvalidCredentials);
        }
        password::check_policy(next)?;
        let verifier = password::hash_password(next)?;

        self.repos.principals.set_password_verifier(principal_id, &verifier).await.map_err(|_| AuthError::InvalidCredentials)?;
        self.repos.sessions.delete_all_for_principal(principal_id).await.map_err(|_| AuthError::InvalidCredentials)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ttl_matches_spec() {
        assert_eq!(SESSION_TTL, Duration::hours(24));
    }
}
