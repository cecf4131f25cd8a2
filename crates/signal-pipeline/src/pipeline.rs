//! The pipeline orchestrator
//!
//! Sequences credential resolution, identifier resolution, cache-aside
//! lookup, the agent run, response parsing, chart enrichment, persistence,
//! and the cache write, and implements the credential-rotation failure
//! policy: an upstream credential rejection purges the caller's stored key
//! before surfacing, forcing re-supply instead of a blind retry.

use crate::agent::{GeminiFactory, ProviderFactory, ReportAgent};
use crate::cache::ResultCache;
use crate::collab::{
    Encryptor, IdentityStore, KeyValueStore, MarketData, NewsSource, ReportStore,
};
use crate::config::PipelineConfig;
use crate::credentials::{CredentialManager, CredentialResolver};
use crate::error::{PipelineError, Result};
use crate::parser::parse_report;
use crate::principal::{CanonicalIdentifier, Credential, Principal, ReportPayload, ReportRecord};
use crate::prompts;
use crate::resolver::IdentifierResolver;
use crate::tools::{NewsSearchTool, PriceSeriesTool};
use chrono::Utc;
use signal_tools::ToolRegistry;
use std::sync::Arc;
use tracing::{info, warn};

/// The report generation pipeline
///
/// Collaborators are injected once at construction and shared across
/// requests; only the model provider is request-scoped, built per run from
/// the resolved credential.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    credentials: CredentialResolver,
    manager: CredentialManager,
    resolver: IdentifierResolver,
    cache: ResultCache,
    agent: ReportAgent,
    market: Arc<dyn MarketData>,
    reports: Arc<dyn ReportStore>,
}

impl Pipeline {
    /// Create a builder for the pipeline
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Handle a report request end to end
    ///
    /// On a live cache entry (and no `force_regenerate`) the cached payload
    /// is returned with no model, market, or persistence calls.
    pub async fn handle(
        &self,
        principal: &Principal,
        query: &str,
        force_regenerate: bool,
    ) -> Result<ReportPayload> {
        let credential = self
            .credentials
            .resolve(principal)
            .await
            .ok_or(PipelineError::CredentialRequired)?;

        let identifier = self.resolver.resolve(query, &credential).await;
        let Some(symbol) = identifier.symbol().map(str::to_string) else {
            return Err(PipelineError::UnrecognizedSubject(query.to_string()));
        };

        if !force_regenerate {
            if let Some(payload) = self.cache.get(&identifier).await {
                info!(symbol = %symbol, "Serving cached report");
                return Ok(payload);
            }
        }

        info!(symbol = %symbol, force = force_regenerate, "Generating report");

        let final_text = match self
            .agent
            .run(prompts::analysis_request(&symbol), &credential)
            .await
        {
            Ok(text) => text,
            Err(e) => return Err(self.rotate_on_rejection(principal, e).await),
        };

        let parsed = parse_report(&final_text);
        if parsed.is_degraded() {
            // Quality signal, not an error: the raw text still ships
            warn!(symbol = %symbol, "Report parse degraded to raw model text");
        }

        let chart = match self
            .market
            .price_history(&symbol, self.config.lookback_days)
            .await
        {
            Ok(chart) => chart,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Chart enrichment unavailable");
                None
            }
        };

        let payload = ReportPayload {
            company: symbol,
            sentiment_score: parsed.score(),
            markdown: parsed.markdown().to_string(),
            chart,
        };

        self.persist(principal, &payload).await?;
        self.cache.set(&identifier, &payload).await;

        Ok(payload)
    }

    /// Fetch a persisted report owned by the principal
    pub async fn get_report(&self, principal: &Principal, id: i64) -> Result<ReportRecord> {
        let record = self.reports.get(id).await?.ok_or(PipelineError::NotFound)?;
        if record.owner_id != principal.identity_key {
            return Err(PipelineError::NotAuthorized);
        }
        Ok(record)
    }

    /// List the principal's persisted reports, newest first
    pub async fn list_reports(&self, principal: &Principal) -> Result<Vec<ReportRecord>> {
        self.reports.list(&principal.identity_key).await
    }

    /// Delete a persisted report and invalidate its cache entry
    ///
    /// Without the invalidation a deleted report could be served from cache
    /// until its TTL lapses.
    pub async fn delete_report(&self, principal: &Principal, id: i64) -> Result<()> {
        let record = self.get_report(principal, id).await?;

        if !self.reports.delete(id).await? {
            return Err(PipelineError::NotFound);
        }

        self.cache
            .delete(&CanonicalIdentifier::Resolved(record.company))
            .await;
        Ok(())
    }

    /// Management operations for the caller's stored model credential
    pub fn credentials(&self) -> &CredentialManager {
        &self.manager
    }

    /// The active configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Apply the rotation policy to a failed generation step
    ///
    /// Upstream credential rejections purge the principal's stored key and
    /// surface as `CredentialRequired` so the client re-prompts; everything
    /// else passes through unchanged.
    async fn rotate_on_rejection(
        &self,
        principal: &Principal,
        err: PipelineError,
    ) -> PipelineError {
        if !err.is_credential_rejection() {
            return err;
        }

        warn!(error = %err, "Upstream rejected the model credential");
        self.credentials.purge(principal).await;
        PipelineError::CredentialRequired
    }

    /// Upsert the report row for `(identifier, owner)`
    ///
    /// Regeneration replaces the prior row, so at most one row exists per
    /// pair.
    async fn persist(&self, principal: &Principal, payload: &ReportPayload) -> Result<i64> {
        let existing = self
            .reports
            .find(&principal.identity_key, &payload.company)
            .await?;

        let record = ReportRecord {
            id: existing.and_then(|r| r.id),
            company: payload.company.clone(),
            content: payload.markdown.clone(),
            sentiment_score: Some(payload.sentiment_score),
            chart: payload.chart.clone(),
            owner_id: principal.identity_key.clone(),
            created_at: Utc::now(),
        };

        self.reports.upsert(record).await
    }

    /// Mint a credential for a resolved principal without running a report
    ///
    /// Exposed for credential-validation flows at the service boundary.
    pub async fn resolve_credential(&self, principal: &Principal) -> Option<Credential> {
        self.credentials.resolve(principal).await
    }
}

/// Builder wiring the pipeline's collaborators
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    identity: Option<Arc<dyn IdentityStore>>,
    encryptor: Option<Arc<dyn Encryptor>>,
    market: Option<Arc<dyn MarketData>>,
    news: Option<Arc<dyn NewsSource>>,
    reports: Option<Arc<dyn ReportStore>>,
    kv_store: Option<Arc<dyn KeyValueStore>>,
    factory: Option<Arc<dyn ProviderFactory>>,
}

impl PipelineBuilder {
    /// Set the pipeline configuration (defaults to [`PipelineConfig::default`])
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the identity-store collaborator
    pub fn identity(mut self, identity: Arc<dyn IdentityStore>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Set the encryption collaborator
    pub fn encryptor(mut self, encryptor: Arc<dyn Encryptor>) -> Self {
        self.encryptor = Some(encryptor);
        self
    }

    /// Set the market-data collaborator
    pub fn market(mut self, market: Arc<dyn MarketData>) -> Self {
        self.market = Some(market);
        self
    }

    /// Set the news collaborator
    pub fn news(mut self, news: Arc<dyn NewsSource>) -> Self {
        self.news = Some(news);
        self
    }

    /// Set the report persistence collaborator
    pub fn reports(mut self, reports: Arc<dyn ReportStore>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Set the key-value store backing the cache
    pub fn kv_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.kv_store = Some(store);
        self
    }

    /// Override the model provider factory (defaults to Gemini)
    pub fn provider_factory(mut self, factory: Arc<dyn ProviderFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Assemble the pipeline
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let config = Arc::new(config);

        let identity = Self::require(self.identity, "identity store")?;
        let encryptor = Self::require(self.encryptor, "encryptor")?;
        let market = Self::require(self.market, "market data")?;
        let news = Self::require(self.news, "news source")?;
        let reports = Self::require(self.reports, "report store")?;
        let kv_store = Self::require(self.kv_store, "key-value store")?;

        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(GeminiFactory::new(config.request_timeout)));

        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(PriceSeriesTool::new(market.clone())));
        registry.register(Arc::new(NewsSearchTool::new(news)));

        let credentials = CredentialResolver::new(
            config.operator_credential.clone(),
            identity.clone(),
            encryptor.clone(),
        );
        let manager = CredentialManager::new(identity, encryptor);
        let resolver = IdentifierResolver::new(factory.clone(), kv_store.clone(), config.clone());
        let cache = ResultCache::new(kv_store, config.cache_ttl);
        let agent = ReportAgent::new(factory, registry, config.clone());

        Ok(Pipeline {
            config,
            credentials,
            manager,
            resolver,
            cache,
            agent,
            market,
            reports,
        })
    }

    fn require<T>(value: Option<T>, name: &str) -> Result<T> {
        value.ok_or_else(|| PipelineError::Other(format!("pipeline builder missing {name}")))
    }
}
