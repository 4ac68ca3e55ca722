//! Security event sink.
//!
//! Recording an event is fire-and-forget: the trait returns nothing, so a
//! broken sink can never fail a login.

use std::fmt;

/// Notable security-relevant occurrences on the login path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEventKind {
    /// A client's failure count reached the lockout threshold.
    LockoutTriggered,
    /// A login was attempted while the client was locked out.
    LockedAttempt,
    /// A stored digest did not parse; storage corruption or tampering.
    MalformedDigest,
    /// The account store failed during a login.
    StorageFailure,
}

impl fmt::Display for SecurityEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LockoutTriggered => "lockout_triggered",
            Self::LockedAttempt => "locked_attempt",
            Self::MalformedDigest => "malformed_digest",
            Self::StorageFailure => "storage_failure",
        };
        f.write_str(name)
    }
}

/// Receives security events. Implementations must not block.
pub trait SecurityEvents: Send + Sync {
    fn record(&self, kind: SecurityEventKind, client_key: &str, detail: &str);
}

/// Emits every event as a `tracing` warning with structured fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEvents;

impl SecurityEvents for TracingEvents {
    fn record(&self, kind: SecurityEventKind, client_key: &str, detail: &str) {
        tracing::warn!(kind = %kind, client_key, detail, "security event");
    }
}
