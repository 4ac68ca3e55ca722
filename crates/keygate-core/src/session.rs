//! Short-lived signed session tokens (HS256 JWT).
//!
//! Tokens are stateless: nothing is stored server-side and there is no
//! revocation. Whoever consumes a token checks signature and expiry.

use std::sync::Arc;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
    pub jti: String,
}

/// A freshly minted token.
#[derive(Debug, Clone)]
pub struct SessionIssuance {
    pub identity: String,
    pub token: String,
    pub expires_at: u64,
}

pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
    clock: Arc<dyn Clock>,
}

impl SessionIssuer {
    pub fn new(config: &SessionConfig, clock: Arc<dyn Clock>) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_secs: config.ttl_minutes.saturating_mul(60),
            clock,
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub fn issue(&self, identity: &str) -> CoreResult<SessionIssuance> {
        let now = self.clock.now_secs();
        let expires_at = now
            .checked_add(self.ttl_secs)
            .ok_or_else(|| CoreError::Token("token expiry overflows".to_string()))?;

        let claims = Claims {
            sub: identity.to_string(),
            iat: now,
            exp: expires_at,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| CoreError::Token(e.to_string()))?;

        Ok(SessionIssuance {
            identity: claims.sub,
            token,
            expires_at,
        })
    }

    /// Checks signature and expiry (against the system clock, no leeway).
    pub fn verify(&self, token: &str) -> CoreResult<Claims> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| CoreError::Token(e.to_string()))?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SystemClock};

    fn config(secret: &str) -> SessionConfig {
        SessionConfig {
            jwt_secret: secret.to_string(),
            ttl_minutes: 7,
        }
    }

    #[test]
    fn issued_token_verifies_with_same_secret() {
        let issuer = SessionIssuer::new(&config("a-long-enough-test-signing-secret"), Arc::new(SystemClock));

        let issuance = issuer.issue("user@example.com").unwrap();
        let claims = issuer.verify(&issuance.token).unwrap();

        assert_eq!(claims.sub, "user@example.com");
        assert_eq!(claims.exp, issuance.expires_at);
        assert_eq!(claims.exp - claims.iat, 7 * 60);
        assert_eq!(issuance.identity, "user@example.com");
    }

    #[test]
    fn each_token_has_unique_id() {
        let issuer = SessionIssuer::new(&config("a-long-enough-test-signing-secret"), Arc::new(SystemClock));
        let a = issuer.verify(&issuer.issue("u").unwrap().token).unwrap();
        let b = issuer.verify(&issuer.issue("u").unwrap().token).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn other_secret_rejects_token() {
        let issuer = SessionIssuer::new(&config("first-secret-first-secret-first!"), Arc::new(SystemClock));
        let other = SessionIssuer::new(&config("second-secret-second-secret-sec!"), Arc::new(SystemClock));

        let token = issuer.issue("u").unwrap().token;
        assert!(matches!(other.verify(&token), Err(CoreError::Token(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let past = SystemClock.now_secs() - 3600;
        let issuer = SessionIssuer::new(&config("a-long-enough-test-signing-secret"), Arc::new(ManualClock::new(past)));

        let token = issuer.issue("u").unwrap().token;
        assert!(issuer.verify(&token).is_err());
    }

    #[test]
    fn oversized_lifetime_errors_instead_of_overflowing() {
        let config = SessionConfig {
            jwt_secret: "a-long-enough-test-signing-secret".to_string(),
            ttl_minutes: u64::MAX / 2,
        };
        let issuer = SessionIssuer::new(&config, Arc::new(SystemClock));

        assert_eq!(issuer.ttl_secs(), u64::MAX);
        assert!(matches!(issuer.issue("u"), Err(CoreError::Token(_))));
    }

    #[test]
    fn garbage_token_is_rejected() {
        let issuer = SessionIssuer::new(&config("a-long-enough-test-signing-secret"), Arc::new(SystemClock));
        assert!(issuer.verify("not.a.jwt").is_err());
    }
}
