//! Canonical identifier resolution
//!
//! Normalizing free text ("Zomato", "ETERNAL.NS") to one canonical symbol is
//! what makes the cache and persistence layers effective: synonym queries
//! collapse to a single key. Resolution uses one near-deterministic model
//! call; genuine model replies are memoized per distinct query so repeat
//! requests skip the model entirely.

use crate::collab::KeyValueStore;
use crate::config::PipelineConfig;
use crate::principal::{CanonicalIdentifier, Credential, UNRESOLVABLE_SENTINEL};
use crate::prompts;
use crate::agent::ProviderFactory;
use signal_llm::{CompletionRequest, Message};
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolves free-text queries to canonical instrument identifiers
pub struct IdentifierResolver {
    factory: Arc<dyn ProviderFactory>,
    store: Arc<dyn KeyValueStore>,
    config: Arc<PipelineConfig>,
}

impl IdentifierResolver {
    /// Create the resolver over a provider factory and memoization store
    pub fn new(
        factory: Arc<dyn ProviderFactory>,
        store: Arc<dyn KeyValueStore>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            factory,
            store,
            config,
        }
    }

    fn memo_key(query: &str) -> String {
        format!("resolve:{}", query.trim().to_lowercase())
    }

    /// Resolve a query to a canonical identifier
    ///
    /// Fails closed: any model-call failure yields `Unresolvable` rather
    /// than propagating the error. Failure-path sentinels are never
    /// memoized, so a transient outage does not poison the query.
    pub async fn resolve(&self, query: &str, credential: &Credential) -> CanonicalIdentifier {
        let key = Self::memo_key(query);

        match self.store.get(&key).await {
            Ok(Some(memoized)) => {
                debug!(query = %query, symbol = %memoized, "Identifier memo hit");
                return CanonicalIdentifier::from_model_reply(&memoized);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(query = %query, error = %e, "Identifier memo read failed"); // treated as miss
            }
        }

        let reply = match self.ask_model(query, credential).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(query = %query, error = %e, "Identifier resolution failed closed");
                return CanonicalIdentifier::Unresolvable;
            }
        };

        let identifier = CanonicalIdentifier::from_model_reply(&reply);

        // Memoize the genuine model verdict, resolved or not
        let memo_value = identifier
            .symbol()
            .unwrap_or(UNRESOLVABLE_SENTINEL)
            .to_string();
        if let Err(e) = self
            .store
            .set(&key, &memo_value, self.config.cache_ttl)
            .await
        {
            warn!(query = %query, error = %e, "Identifier memo write failed");
        }

        debug!(query = %query, identifier = ?identifier, "Identifier resolved");
        identifier
    }

    async fn ask_model(&self, query: &str, credential: &Credential) -> crate::Result<String> {
        let provider = self.factory.create(credential)?;

        let request = CompletionRequest::builder(&self.config.resolver_model)
            .add_message(Message::user(query))
            .system(prompts::RESOLVER_DIRECTIVE)
            .max_tokens(32)
            .temperature(self.config.resolver_temperature)
            .build();

        let response = provider.complete(request).await?;
        Ok(response.message.text().unwrap_or_default().to_string())
    }
}
