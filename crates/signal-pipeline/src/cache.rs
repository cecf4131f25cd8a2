//! Cache-aside layer for computed reports
//!
//! The cache is a performance optimization, never a correctness dependency:
//! every store failure is logged and swallowed, so an unreachable backend
//! degrades the cache to a no-op instead of failing requests.

use crate::collab::KeyValueStore;
use crate::error::Result;
use crate::principal::{CanonicalIdentifier, ReportPayload};
use async_trait::async_trait;
use cached::{Cached, TimedCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Cache of computed reports keyed by canonical identifier
///
/// Keys derive only from the resolved symbol, never the raw query, so
/// synonym queries share one entry.
pub struct ResultCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl ResultCache {
    /// Create the cache over a key-value store with the given report TTL
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(identifier: &CanonicalIdentifier) -> Option<String> {
        identifier.symbol().map(|s| format!("report:{s}"))
    }

    /// Look up a previously computed report
    pub async fn get(&self, identifier: &CanonicalIdentifier) -> Option<ReportPayload> {
        let key = Self::key(identifier)?;

        let raw = match self.store.get(&key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed; treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(payload) => {
                debug!(key = %key, "Cache hit");
                Some(payload)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cached payload failed to decode; treating as miss");
                None
            }
        }
    }

    /// Store a freshly computed report under the default TTL
    pub async fn set(&self, identifier: &CanonicalIdentifier, payload: &ReportPayload) {
        let Some(key) = Self::key(identifier) else {
            return;
        };

        let raw = match serde_json::to_string(payload) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Payload failed to serialize; skipping cache write");
                return;
            }
        };

        if let Err(e) = self.store.set(&key, &raw, self.ttl).await {
            warn!(key = %key, error = %e, "Cache write failed; continuing without it");
        }
    }

    /// Explicitly invalidate the entry for an identifier
    pub async fn delete(&self, identifier: &CanonicalIdentifier) {
        let Some(key) = Self::key(identifier) else {
            return;
        };

        if let Err(e) = self.store.delete(&key).await {
            warn!(key = %key, error = %e, "Cache invalidation failed");
        }
    }

    /// Access the underlying store (shared with the identifier resolver)
    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        self.store.clone()
    }
}

/// In-process key-value store on a timed cache
///
/// Entries expire after the lifespan fixed at construction; the per-call
/// TTL is accepted for interface parity with remote stores.
pub struct MemoryStore {
    entries: RwLock<TimedCache<String, String>>,
}

impl MemoryStore {
    /// Create a store whose entries live for `lifespan`
    pub fn new(lifespan: Duration) -> Self {
        Self {
            entries: RwLock::new(TimedCache::with_lifespan(lifespan)),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.write().await;
        Ok(entries.cache_get(&key.to_string()).cloned())
    }

    async fn set(&self, key: &str, value: &str, _ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().await;
        let _ = entries.cache_set(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        let _ = entries.cache_remove(&key.to_string());
        Ok(())
    }
}
