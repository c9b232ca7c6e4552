use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Bytes of entropy per issued token; 128 bits minimum per §4.6, doubled for
/// headroom.
const TOKEN_BYTES: usize = 32;

/// A freshly issued bearer token and the fingerprint persisted in its
/// `Session` row. The raw token is returned to the client exactly once and
/// never stored.
pub struct IssuedToken {
    pub raw: String,
    pub fingerprint: String
}

pub fn issue() -> IssuedToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let raw = URL_SAFE_NO_PAD.encode(bytes);
    let fingerprint = fingerprint_of(&raw);
    IssuedToken { raw, fingerprint }
}

/// Recomputes the fingerprint a presented bearer token must match for
/// lookup (§4.6 token validation step a).
#[must_use]
pub fn fingerprint_of(raw_token: &str) -> String {
    let digest = Sha256::digest(raw_token.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_are_unique() {
        let a = issue();
        let b = issue();
        assert_ne!(a.raw, b.raw);
        assert_ne!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let issued = issue();
        assert_eq!(issued.fingerprint, fingerprint_of(&issued.raw));
    }

    #[test]
    fn token_has_at_least_128_bits_of_entropy() {
        let issued = issue();
        let decoded = URL_SAFE_NO_PAD.decode(&issued.raw).unwrap();
        assert!(decoded.len() * 8 >= 128);
    }
}
