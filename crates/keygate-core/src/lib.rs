//! keygate core library — login protection and credential verification.
//!
//! `keygate-core` is the part of the keygate account API that carries real
//! policy. It knows nothing about HTTP: the request layer hands it raw
//! strings and a client key, and gets typed outcomes back.
//!
//! # Modules
//!
//! - [`digest`] — Argon2id password digests: hash, constant-time verify.
//! - [`sanitize`] — Identity normalization and injection-neutralizing sanitization.
//! - [`lockout`] — Sliding-window brute-force lockout per client key.
//! - [`verifier`] — The login entry point ([`CredentialVerifier::verify_login`]).
//! - [`session`] — Signed, short-lived session tokens.
//! - [`accounts`] — Registration, first-superuser bootstrap and listing.
//! - [`validate`] — Registration and login body validation.
//! - [`limiter`] — Tiered per-client request limits.
//! - [`store`] — The [`AccountStore`] collaborator and an in-memory store.
//! - [`events`] — Security event sink.
//! - [`clock`] — Injectable time source.
//! - [`config`] — TOML + environment configuration ([`Settings`]).
//! - [`error`] — Shared error type ([`CoreError`]) and result alias ([`CoreResult`]).

pub mod accounts;
pub mod clock;
pub mod config;
pub mod digest;
pub mod error;
pub mod events;
pub mod limiter;
pub mod lockout;
pub mod sanitize;
pub mod session;
pub mod store;
pub mod validate;
pub mod verifier;

pub use accounts::{Accounts, RegisterError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LockoutConfig, RateLimitConfig, SessionConfig, Settings, TierConfig};
pub use digest::{hash_secret, verify_secret};
pub use error::{CoreError, CoreResult};
pub use events::{SecurityEventKind, SecurityEvents, TracingEvents};
pub use limiter::{RateLimited, Tier, TieredLimiter};
pub use lockout::{LockoutDecision, LockoutTracker};
pub use sanitize::{normalize_identity, sanitize_record, sanitize_text};
pub use session::{Claims, SessionIssuance, SessionIssuer};
pub use store::{AccountStore, CredentialRecord, MemoryStore, StoreError};
pub use validate::{validate_login, validate_registration, Validation};
pub use verifier::{CredentialVerifier, VerifyFailure};
