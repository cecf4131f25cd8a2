//! Collaborator traits for externally provided services
//!
//! The pipeline treats identity storage, secret encryption, market data,
//! news retrieval, report persistence, and the cache's key-value store as
//! external collaborators. Concrete integrations implement these traits and
//! are injected at pipeline construction.

use crate::error::Result;
use crate::principal::{ChartData, ReportRecord};
use async_trait::async_trait;
use std::time::Duration;

/// External identity store holding encrypted per-subject credentials
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Fetch the encrypted credential stored for a subject, if any
    async fn get_encrypted_credential(&self, subject_id: &str) -> Result<Option<String>>;

    /// Store an encrypted credential for a subject
    async fn set_encrypted_credential(&self, subject_id: &str, encrypted: &str) -> Result<()>;

    /// Delete the stored credential; returns whether one existed
    async fn delete_encrypted_credential(&self, subject_id: &str) -> Result<bool>;
}

/// Symmetric encryption of stored secrets
///
/// Both operations fail with a configuration error when no encryption key
/// is provisioned.
#[async_trait]
pub trait Encryptor: Send + Sync {
    /// Encrypt a plaintext secret into an opaque string
    async fn encrypt(&self, plaintext: &str) -> Result<String>;

    /// Decrypt an opaque string back into plaintext
    async fn decrypt(&self, opaque: &str) -> Result<String>;
}

/// Market-data collaborator
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Fetch an ordered daily price series for a symbol
    ///
    /// Returns `Ok(None)` when the symbol has no data.
    async fn price_history(&self, symbol: &str, lookback_days: u32) -> Result<Option<ChartData>>;
}

/// News-retrieval collaborator
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Search for recent news text about a company or topic
    async fn search(&self, query: &str) -> Result<String>;
}

/// Persistence collaborator for report rows
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Insert or update a row; a record with an id updates in place.
    /// Returns the row id.
    async fn upsert(&self, record: ReportRecord) -> Result<i64>;

    /// Find the row for an `(owner, company)` pair
    async fn find(&self, owner_id: &str, company: &str) -> Result<Option<ReportRecord>>;

    /// Fetch a row by id
    async fn get(&self, id: i64) -> Result<Option<ReportRecord>>;

    /// List all rows owned by a principal, newest first
    async fn list(&self, owner_id: &str) -> Result<Vec<ReportRecord>>;

    /// Delete a row by id; returns whether it existed
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// Key-value store backing the result cache
///
/// Implementations may be remote; the cache layer above swallows their
/// failures, so errors here never abort a request.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set a value with an expiry
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Delete a key
    async fn delete(&self, key: &str) -> Result<()>;
}
