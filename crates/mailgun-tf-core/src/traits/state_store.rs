// # State Store Trait
//
// Persistent resource state for the local host.
//
// ## Purpose
//
// The store remembers, per resource address (`mailgun_domain.example`), the
// remote id and last observed attributes. The engine uses it to decide
// between create, update and replacement, and to carry the fields the API
// never returns (credential passwords, DKIM options) into the next read.
//
// ## Implementations
//
// - Memory: tests and one-shot runs
// - File: a single JSON document written atomically

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Stored state of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Resource type (`mailgun_domain`, `mailgun_route`)
    pub resource_type: String,
    /// Remote identifier
    pub id: String,
    /// Last observed attributes
    pub attributes: serde_json::Value,
    /// Timestamp of the last write
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl StateRecord {
    /// Create a record stamped with the current time
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        attributes: serde_json::Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            attributes,
            last_updated: chrono::Utc::now(),
        }
    }
}

/// Trait for state store implementations
///
/// Keys are resource addresses. Implementations must be safe to share across
/// tasks; writes may be buffered until [`StateStore::flush`].
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get the record stored under `address`
    async fn get(&self, address: &str) -> Result<Option<StateRecord>, crate::Error>;

    /// Create or replace the record stored under `address`
    async fn put(&self, address: &str, record: &StateRecord) -> Result<(), crate::Error>;

    /// Remove the record stored under `address` (no-op when absent)
    async fn delete(&self, address: &str) -> Result<(), crate::Error>;

    /// All stored addresses
    async fn list(&self) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
