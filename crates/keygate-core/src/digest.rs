//! Salted one-way password digests (Argon2id, PHC string format).
//!
//! The digest is self-describing: algorithm, version, cost parameters and
//! salt travel inside the string, so verification never needs extra state.

use std::sync::OnceLock;

use argon2::{
    password_hash::{
        self, rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

use crate::error::{CoreError, CoreResult};

/// Memory cost in KiB.
pub const MEMORY_KIB: u32 = 19_456;
/// Number of passes over memory.
pub const ITERATIONS: u32 = 2;
/// Degree of parallelism.
pub const LANES: u32 = 1;

/// A stored digest that cannot be checked: unparseable, missing its hash
/// output, for another algorithm, or carrying invalid cost parameters.
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("malformed digest: {0}")]
    Malformed(String),
}

fn hasher() -> CoreResult<Argon2<'static>> {
    let params = Params::new(MEMORY_KIB, ITERATIONS, LANES, None)
        .map_err(|e| CoreError::Hash(format!("invalid argon2 params: {e}")))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes `secret` with a fresh random salt.
pub fn hash_secret(secret: &str) -> CoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()?
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| CoreError::Hash(format!("failed to hash password: {e}")))?;

    Ok(hash.to_string())
}

/// Compares `secret` against `digest`, reporting an unusable digest
/// separately from a mismatch.
///
/// Cost parameters are read from the digest itself, so digests minted under
/// older constants keep verifying.
pub fn check_secret(secret: &str, digest: &str) -> Result<bool, DigestError> {
    let parsed = PasswordHash::new(digest).map_err(|e| DigestError::Malformed(e.to_string()))?;
    if parsed.hash.is_none() {
        return Err(DigestError::Malformed("digest has no hash output".to_string()));
    }

    match Argon2::default().verify_password(secret.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(DigestError::Malformed(e.to_string())),
    }
}

/// Like [`check_secret`] but folds a malformed digest into `false`.
pub fn verify_secret(secret: &str, digest: &str) -> bool {
    check_secret(secret, digest).unwrap_or(false)
}

/// A valid digest of a throwaway secret. Verifying against it costs the same
/// as a real comparison, so an unknown identity takes as long as a wrong
/// password.
pub(crate) fn decoy_digest() -> &'static str {
    static DECOY: OnceLock<String> = OnceLock::new();
    DECOY.get_or_init(|| hash_secret(&uuid::Uuid::new_v4().to_string()).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_accepts_same_secret() {
        let digest = hash_secret("Correct-horse-1").unwrap();
        assert!(verify_secret("Correct-horse-1", &digest));
    }

    #[test]
    fn verify_rejects_different_secret() {
        let digest = hash_secret("Correct-horse-1").unwrap();
        assert!(!verify_secret("correct-horse-1", &digest));
        assert!(!verify_secret("", &digest));
    }

    #[test]
    fn digest_is_self_describing_and_salted() {
        let a = hash_secret("same").unwrap();
        let b = hash_secret("same").unwrap();
        assert!(a.starts_with("$argon2id$v=19$m=19456,t=2,p=1$"));
        assert_ne!(a, b);
    }

    #[test]
    fn empty_secret_hashes() {
        let digest = hash_secret("").unwrap();
        assert!(verify_secret("", &digest));
    }

    #[test]
    fn malformed_digest_is_false_not_panic() {
        assert!(!verify_secret("anything", "not-a-digest"));
        assert!(!verify_secret("anything", ""));
        assert!(matches!(
            check_secret("anything", "$argon2id$garbage"),
            Err(DigestError::Malformed(_))
        ));
    }

    #[test]
    fn parseable_but_unusable_digests_are_malformed() {
        // Well-formed PHC strings: foreign algorithm, then invalid argon2 costs.
        for digest in [
            "$pbkdf2-sha256$i=1000$c2FsdHNhbHQ$aGFzaGhhc2hoYXNoaGFzaA",
            "$argon2id$v=19$m=1,t=0,p=0$c2FsdHNhbHQ$aGFzaGhhc2hoYXNoaGFzaA",
        ] {
            assert!(
                matches!(check_secret("anything", digest), Err(DigestError::Malformed(_))),
                "{digest}"
            );
            assert!(!verify_secret("anything", digest));
        }
    }

    #[test]
    fn mismatch_is_not_malformed() {
        let digest = hash_secret("right").unwrap();
        assert!(matches!(check_secret("wrong", &digest), Ok(false)));
    }

    #[test]
    fn decoy_is_a_parseable_digest() {
        assert!(check_secret("guess", decoy_digest()).is_ok());
    }
}
