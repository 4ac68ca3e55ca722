//! Account registration and listing on top of an [`AccountStore`].

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::digest::hash_secret;
use crate::sanitize::{normalize_identity, sanitize_record};
use crate::store::{AccountStore, CredentialRecord, StoreError};
use crate::validate::{validate_registration, Validation};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    #[error("validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    #[error("user email already exists: {0}")]
    Duplicate(String),

    #[error("users already exist")]
    AlreadyInitialized,

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for RegisterError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateKey(identity) => Self::Duplicate(identity),
            StoreError::Unavailable(msg) => Self::StorageUnavailable(msg),
        }
    }
}

pub struct Accounts {
    store: Arc<dyn AccountStore>,
    /// Held across the emptiness check and the insert of a bootstrap.
    bootstrap: Mutex<()>,
}

impl Accounts {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self {
            store,
            bootstrap: Mutex::new(()),
        }
    }

    /// Validates, sanitizes and stores a new account. Returns its public view.
    pub async fn register(&self, doc: &Value) -> Result<Value, RegisterError> {
        let record = build_record(doc).await?;

        if self.store.find_by_identity(&record.identity).await?.is_some() {
            return Err(RegisterError::Duplicate(record.identity));
        }

        self.insert(record).await
    }

    /// Registers the first account. Refused once any account exists.
    ///
    /// Concurrent bootstraps through the same `Accounts` are serialized, so
    /// only one of them can see an empty store. A plain [`register`] racing
    /// a bootstrap is not covered.
    ///
    /// [`register`]: Accounts::register
    pub async fn create_superuser(&self, doc: &Value) -> Result<Value, RegisterError> {
        let _guard = self.bootstrap.lock().await;
        let existing = self.store.count().await?;
        if existing > 0 {
            tracing::warn!("Superuser bootstrap refused: {existing} account(s) already exist");
            return Err(RegisterError::AlreadyInitialized);
        }

        let record = build_record(doc).await?;
        self.insert(record).await
    }

    /// Every account's public view, digests removed.
    pub async fn list(&self) -> Result<Vec<Value>, StoreError> {
        let records = self.store.list().await?;
        Ok(records.iter().map(CredentialRecord::public_view).collect())
    }

    /// Number of stored accounts; doubles as a storage health probe.
    pub async fn status(&self) -> Result<usize, StoreError> {
        self.store.count().await
    }

    async fn insert(&self, record: CredentialRecord) -> Result<Value, RegisterError> {
        let view = record.public_view();
        let identity = record.identity.clone();
        self.store.insert(record).await?;
        tracing::info!("Account created: {identity}");
        Ok(view)
    }
}

fn check_body(validation: Validation) -> Result<(), RegisterError> {
    match validation {
        Validation::Ok => Ok(()),
        Validation::ValidationFailed(errors) => Err(RegisterError::ValidationFailed(errors)),
        Validation::InternalError(e) => Err(RegisterError::Internal(e)),
    }
}

/// Turns a registration body into a record. The password is hashed as given,
/// never sanitized, so it matches what the login path verifies.
async fn build_record(doc: &Value) -> Result<CredentialRecord, RegisterError> {
    check_body(validate_registration(doc))?;

    let mut fields = doc.as_object().cloned().unwrap_or_default();
    let email = fields
        .remove("email")
        .and_then(|v| v.as_str().map(normalize_identity))
        .unwrap_or_default();
    let password = fields
        .remove("password")
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default();

    let profile = match sanitize_record(Value::Object(fields)) {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    let digest = tokio::task::spawn_blocking(move || hash_secret(&password))
        .await
        .map_err(|e| RegisterError::Internal(e.to_string()))?
        .map_err(|e| RegisterError::Internal(e.to_string()))?;

    Ok(CredentialRecord {
        identity: email,
        digest,
        profile,
    })
}
