use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use errors::AuthError;

const MIN_LENGTH: usize = 12;
const PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Enforces the set-time password policy (§4.6): length plus one character
/// from each of four classes. Applied uniformly on create, admin-reset, and
/// self-change.
pub fn check_policy(candidate: &str) -> Result<(), AuthError> {
    if candidate.chars().count() < MIN_LENGTH {
        return Err(AuthError::WeakPassword { reason: format!("must be at least {MIN_LENGTH} characters") });
    }
    if !candidate.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(AuthError::WeakPassword { reason: "must contain an uppercase letter".to_string() });
    }
    if !candidate.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(AuthError::WeakPassword { reason: "must contain a lowercase letter".to_string() });
    }
    if !candidate.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::WeakPassword { reason: "must contain a digit".to_string() });
    }
    if !candidate.chars().any(|c| PUNCTUATION.contains(c)) {
        return Err(AuthError::WeakPassword { reason: "must contain a punctuation character".to_string() });
    }
    Ok(())
}

/// Hashes a password with Argon2id, a cost at least equivalent to bcrypt 12
/// (§4.6). The salt is generated per-call, never reused.
pub fn hash_password(plaintext: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::WeakPassword { reason: e.to_string() })
}

/// Constant-time verification against a stored verifier (§4.6). Any
/// malformed verifier string is treated as a mismatch, never a panic.
#[must_use]
pub fn verify_password(plaintext: &str, verifier: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(verifier) else {
        return false;
    };
    Argon2::default().verify_password(plaintext.as_bytes(), &parsed).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_password() {
        assert!(check_policy("Ab1!").is_err());
    }

    #[test]
    fn rejects_missing_punctuation() {
        assert!(check_policy("AbcdefghijkL1").is_err());
    }

    #[test]
    fn accepts_compliant_password() {
        assert!(check_policy("Correct-Horse9Battery").is_ok());
    }

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("Correct-Horse9Battery").unwrap();
        assert!(verify_password("Correct-Horse9Battery", &hash));
        assert!(!verify_password("wrong-password", &hash));
    }

    #[test]
    fn malformed_verifier_never_panics() {
        assert!(!verify_password("anything", "not-a-real-hash"));
    }
}
