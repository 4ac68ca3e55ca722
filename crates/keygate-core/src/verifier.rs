//! Login orchestration: lockout check, lookup, digest comparison, outcome
//! bookkeeping and token issuance.

use std::sync::Arc;

use crate::digest::{check_secret, decoy_digest, DigestError};
use crate::events::{SecurityEventKind, SecurityEvents};
use crate::lockout::LockoutTracker;
use crate::sanitize::normalize_identity;
use crate::session::{SessionIssuance, SessionIssuer};
use crate::store::AccountStore;

/// Why a login did not produce a token.
///
/// An unknown identity and a wrong password both surface as
/// [`VerifyFailure::InvalidCredentials`], indistinguishable to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyFailure {
    #[error("too many failed attempts; retry in {remaining_secs}s")]
    Locked { remaining_secs: u64 },

    #[error("the email or password is incorrect")]
    InvalidCredentials,

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub struct CredentialVerifier {
    lockout: Arc<LockoutTracker>,
    store: Arc<dyn AccountStore>,
    issuer: Arc<SessionIssuer>,
    events: Arc<dyn SecurityEvents>,
}

impl CredentialVerifier {
    pub fn new(
        lockout: Arc<LockoutTracker>,
        store: Arc<dyn AccountStore>,
        issuer: Arc<SessionIssuer>,
        events: Arc<dyn SecurityEvents>,
    ) -> Self {
        Self {
            lockout,
            store,
            issuer,
            events,
        }
    }

    /// Verifies `secret_raw` for `identity_raw`, bucketing failures under
    /// `client_key`.
    ///
    /// A locked-out client is rejected before the secret is looked at.
    /// Storage errors are reported as such and do not count as failures.
    pub async fn verify_login(
        &self,
        identity_raw: &str,
        secret_raw: &str,
        client_key: &str,
    ) -> Result<SessionIssuance, VerifyFailure> {
        let decision = self.lockout.is_blocked(client_key);
        if decision.is_locked {
            self.events.record(
                SecurityEventKind::LockedAttempt,
                client_key,
                &format!("{}s remaining", decision.remaining_secs),
            );
            return Err(VerifyFailure::Locked {
                remaining_secs: decision.remaining_secs,
            });
        }

        let identity = normalize_identity(identity_raw);

        let record = match self.store.find_by_identity(&identity).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!("Account lookup failed: {e}");
                self.events
                    .record(SecurityEventKind::StorageFailure, client_key, &e.to_string());
                return Err(VerifyFailure::StorageUnavailable(e.to_string()));
            }
        };

        // Unknown identities still pay for a full comparison.
        let digest = record
            .as_ref()
            .map_or_else(|| decoy_digest().to_string(), |r| r.digest.clone());
        let secret = secret_raw.to_owned();
        let outcome = tokio::task::spawn_blocking(move || check_secret(&secret, &digest))
            .await
            .map_err(|e| VerifyFailure::Internal(e.to_string()))?;

        let verified = match (&record, outcome) {
            (Some(_), Ok(matched)) => matched,
            (Some(_), Err(DigestError::Malformed(reason))) => {
                self.events.record(
                    SecurityEventKind::MalformedDigest,
                    client_key,
                    &format!("identity={identity}: {reason}"),
                );
                false
            }
            (None, _) => false,
        };

        let Some(record) = record.filter(|_| verified) else {
            let failures = self.lockout.record_failure(client_key);
            tracing::warn!("Failed login attempt from {client_key} ({failures} in window)");
            if failures >= self.lockout.max_attempts() {
                self.events.record(
                    SecurityEventKind::LockoutTriggered,
                    client_key,
                    &format!("{failures} failures"),
                );
            }
            return Err(VerifyFailure::InvalidCredentials);
        };

        self.lockout.clear_attempts(client_key);
        let issuance = self
            .issuer
            .issue(&record.identity)
            .map_err(|e| VerifyFailure::Internal(e.to_string()))?;

        tracing::info!("Login succeeded for {}", record.identity);
        Ok(issuance)
    }
}
