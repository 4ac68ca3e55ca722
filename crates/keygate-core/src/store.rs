//! Account storage collaborator.
//!
//! The core only reads identity and digest, and asks the store to insert new
//! records. Uniqueness of the identity key is the store's job.

use std::fmt;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored account.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Normalized identity key (lowercase email).
    pub identity: String,
    /// Self-describing password digest.
    pub digest: String,
    /// Free-form profile fields, already sanitized.
    #[serde(default)]
    pub profile: Map<String, Value>,
}

impl CredentialRecord {
    /// The record as shown to API callers: profile fields plus `email`,
    /// never the digest.
    pub fn public_view(&self) -> Value {
        let mut view = self.profile.clone();
        view.insert("email".to_string(), Value::String(self.identity.clone()));
        Value::Object(view)
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("identity", &self.identity)
            .field("digest", &"<redacted>")
            .field("profile", &self.profile)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("duplicate identity: {0}")]
    DuplicateKey(String),
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_identity(&self, identity: &str) -> Result<Option<CredentialRecord>, StoreError>;

    /// Fails with [`StoreError::DuplicateKey`] when the identity exists.
    async fn insert(&self, record: CredentialRecord) -> Result<(), StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;

    async fn list(&self) -> Result<Vec<CredentialRecord>, StoreError>;
}

/// Process-local store for tests and single-node deployments.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<String, CredentialRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_by_identity(&self, identity: &str) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.records.get(identity).map(|r| r.clone()))
    }

    async fn insert(&self, record: CredentialRecord) -> Result<(), StoreError> {
        match self.records.entry(record.identity.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey(record.identity)),
            Entry::Vacant(slot) => {
                tracing::debug!(identity = %record.identity, "account stored");
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.len())
    }

    async fn list(&self) -> Result<Vec<CredentialRecord>, StoreError> {
        let mut records: Vec<CredentialRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| a.identity.cmp(&b.identity));
        Ok(records)
    }
}
