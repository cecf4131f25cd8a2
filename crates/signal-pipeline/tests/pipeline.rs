//! End-to-end pipeline tests over fake collaborators
//!
//! The model provider is scripted with a FIFO of canned responses; every
//! other collaborator is an in-memory fake that counts its calls, so the
//! tests can assert not just what the pipeline returns but which external
//! services it touched.

use async_trait::async_trait;
use signal_llm::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmError, LlmProvider, Message,
    MessageContent, Role, StopReason, TokenUsage,
};
use signal_pipeline::agent::ProviderFactory;
use signal_pipeline::cache::MemoryStore;
use signal_pipeline::collab::{Encryptor, IdentityStore, MarketData, NewsSource, ReportStore};
use signal_pipeline::{
    ChartData, Credential, Pipeline, PipelineConfig, PipelineError, PricePoint, Principal,
    ReportRecord, Result,
};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// --- Scripted model provider ---

struct ScriptedProvider {
    script: Mutex<VecDeque<signal_llm::Result<CompletionResponse>>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    fn push(&self, response: signal_llm::Result<CompletionResponse>) {
        self.script.lock().unwrap().push_back(response);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> signal_llm::Result<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::UnexpectedResponse("script exhausted".to_string())))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedFactory {
    provider: Arc<ScriptedProvider>,
    credentials_seen: Mutex<Vec<String>>,
}

impl ScriptedFactory {
    fn credentials_seen(&self) -> Vec<String> {
        self.credentials_seen.lock().unwrap().clone()
    }
}

impl ProviderFactory for ScriptedFactory {
    fn create(&self, credential: &Credential) -> signal_llm::Result<Arc<dyn LlmProvider>> {
        self.credentials_seen
            .lock()
            .unwrap()
            .push(credential.as_str().to_string());
        Ok(self.provider.clone())
    }
}

fn text_response(text: &str) -> CompletionResponse {
    CompletionResponse {
        message: Message::assistant(text),
        stop_reason: StopReason::EndTurn,
        usage: TokenUsage {
            input_tokens: 25,
            output_tokens: 25,
        },
    }
}

fn tool_call_response(tool: &str, input: serde_json::Value) -> CompletionResponse {
    CompletionResponse {
        message: Message {
            role: Role::Assistant,
            content: Some(MessageContent::Blocks(vec![ContentBlock::ToolUse {
                id: format!("call-{tool}"),
                name: tool.to_string(),
                input,
            }])),
        },
        stop_reason: StopReason::ToolUse,
        usage: TokenUsage {
            input_tokens: 25,
            output_tokens: 25,
        },
    }
}

const REPORT_JSON: &str = r###"{"score": 72, "markdown": "## Verdict\nBullish"}"###;

// --- Fake collaborators ---

struct FakeIdentity {
    entries: Mutex<HashMap<String, String>>,
}

impl FakeIdentity {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn has(&self, subject: &str) -> bool {
        self.entries.lock().unwrap().contains_key(subject)
    }
}

#[async_trait]
impl IdentityStore for FakeIdentity {
    async fn get_encrypted_credential(&self, subject_id: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(subject_id).cloned())
    }

    async fn set_encrypted_credential(&self, subject_id: &str, encrypted: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(subject_id.to_string(), encrypted.to_string());
        Ok(())
    }

    async fn delete_encrypted_credential(&self, subject_id: &str) -> Result<bool> {
        Ok(self.entries.lock().unwrap().remove(subject_id).is_some())
    }
}

/// Prefix "encryption"; good enough to prove plaintext never hits storage
struct FakeCrypto;

#[async_trait]
impl Encryptor for FakeCrypto {
    async fn encrypt(&self, plaintext: &str) -> Result<String> {
        Ok(format!("enc:{plaintext}"))
    }

    async fn decrypt(&self, opaque: &str) -> Result<String> {
        opaque
            .strip_prefix("enc:")
            .map(str::to_string)
            .ok_or_else(|| PipelineError::Other("bad ciphertext".to_string()))
    }
}

struct FakeMarket {
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl FakeMarket {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }

    fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MarketData for FakeMarket {
    async fn price_history(&self, symbol: &str, _lookback_days: u32) -> Result<Option<ChartData>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(PipelineError::Collaborator("feed down".to_string()));
        }
        Ok(Some(ChartData {
            symbol: symbol.to_string(),
            currency: "USD".to_string(),
            history: vec![
                PricePoint {
                    date: "2026-07-30".to_string(),
                    price: 100.0,
                },
                PricePoint {
                    date: "2026-08-29".to_string(),
                    price: 110.0,
                },
            ],
        }))
    }
}

struct FakeNews;

#[async_trait]
impl NewsSource for FakeNews {
    async fn search(&self, query: &str) -> Result<String> {
        Ok(format!("headlines about {query}"))
    }
}

struct FakeReports {
    rows: Mutex<Vec<ReportRecord>>,
    next_id: AtomicI64,
    calls: AtomicUsize,
}

impl FakeReports {
    fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            calls: AtomicUsize::new(0),
        }
    }

    fn rows(&self) -> Vec<ReportRecord> {
        self.rows.lock().unwrap().clone()
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReportStore for FakeReports {
    async fn upsert(&self, mut record: ReportRecord) -> Result<i64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap();
        match record.id {
            Some(id) => {
                let row = rows
                    .iter_mut()
                    .find(|r| r.id == Some(id))
                    .ok_or(PipelineError::NotFound)?;
                *row = record;
                Ok(id)
            }
            None => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                record.id = Some(id);
                rows.push(record);
                Ok(id)
            }
        }
    }

    async fn find(&self, owner_id: &str, company: &str) -> Result<Option<ReportRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.owner_id == owner_id && r.company == company)
            .cloned())
    }

    async fn get(&self, id: i64) -> Result<Option<ReportRecord>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == Some(id))
            .cloned())
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<ReportRecord>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .rev()
            .cloned()
            .collect())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.id != Some(id));
        Ok(rows.len() < before)
    }
}

// --- Harness ---

struct Harness {
    pipeline: Pipeline,
    provider: Arc<ScriptedProvider>,
    factory: Arc<ScriptedFactory>,
    identity: Arc<FakeIdentity>,
    market: Arc<FakeMarket>,
    reports: Arc<FakeReports>,
}

impl Harness {
    fn new(config: PipelineConfig) -> Self {
        let provider = Arc::new(ScriptedProvider::new());
        let factory = Arc::new(ScriptedFactory {
            provider: provider.clone(),
            credentials_seen: Mutex::new(Vec::new()),
        });
        let identity = Arc::new(FakeIdentity::new());
        let market = Arc::new(FakeMarket::new());
        let reports = Arc::new(FakeReports::new());

        let pipeline = Pipeline::builder()
            .config(config)
            .identity(identity.clone())
            .encryptor(Arc::new(FakeCrypto))
            .market(market.clone())
            .news(Arc::new(FakeNews))
            .reports(reports.clone())
            .kv_store(Arc::new(MemoryStore::new(Duration::from_secs(3600))))
            .provider_factory(factory.clone())
            .build()
            .expect("pipeline builds");

        Self {
            pipeline,
            provider,
            factory,
            identity,
            market,
            reports,
        }
    }

    fn with_operator_key() -> Self {
        Self::new(
            PipelineConfig::builder()
                .operator_credential("op-key")
                .build()
                .expect("valid config"),
        )
    }

    fn reset_counters(&self) {
        self.provider.reset_calls();
        self.market.reset_calls();
        self.reports.reset_calls();
    }
}

fn operator() -> Principal {
    Principal::new("op-user").operator()
}

// --- Tests ---

#[tokio::test]
async fn test_full_run_produces_report_with_chart() {
    let h = Harness::with_operator_key();
    h.provider.push(Ok(text_response("ETERNAL.NS")));
    h.provider.push(Ok(tool_call_response(
        "price_series",
        json!({"symbol": "ETERNAL.NS"}),
    )));
    h.provider.push(Ok(text_response(REPORT_JSON)));

    let payload = h
        .pipeline
        .handle(&operator(), "Zomato", false)
        .await
        .expect("report generated");

    assert_eq!(payload.company, "ETERNAL.NS");
    assert_eq!(payload.sentiment_score, 72);
    assert_eq!(payload.markdown, "## Verdict\nBullish");
    let chart = payload.chart.expect("chart enrichment attached");
    assert_eq!(chart.symbol, "ETERNAL.NS");
    assert_eq!(chart.history.len(), 2);

    // Resolver call + two agent turns
    assert_eq!(h.provider.calls(), 3);
    // In-loop price tool + chart enrichment
    assert_eq!(h.market.calls(), 2);
    assert_eq!(h.reports.rows().len(), 1);

    // Both the resolver and the agent were bound to the resolved credential
    let seen = h.factory.credentials_seen();
    assert_eq!(seen, vec!["op-key".to_string(), "op-key".to_string()]);
}

#[tokio::test]
async fn test_cache_hit_is_idempotent_and_touches_no_collaborators() {
    let h = Harness::with_operator_key();
    h.provider.push(Ok(text_response("AAPL")));
    h.provider.push(Ok(text_response(REPORT_JSON)));

    let first = h.pipeline.handle(&operator(), "Apple", false).await.unwrap();
    h.reset_counters();

    let second = h.pipeline.handle(&operator(), "Apple", false).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.provider.calls(), 0, "no model calls on a cache hit");
    assert_eq!(h.market.calls(), 0, "no market calls on a cache hit");
    assert_eq!(h.reports.calls(), 0, "no persistence calls on a cache hit");
}

#[tokio::test]
async fn test_synonym_queries_share_one_cache_entry() {
    let h = Harness::with_operator_key();
    h.provider.push(Ok(text_response("ETERNAL.NS")));
    h.provider.push(Ok(text_response(REPORT_JSON)));
    // Second spelling resolves to the same symbol; no agent response is
    // scripted because none must be consumed.
    h.provider.push(Ok(text_response("eternal.ns")));

    let first = h.pipeline.handle(&operator(), "Zomato", false).await.unwrap();
    let second = h
        .pipeline
        .handle(&operator(), "ETERNAL.NS stock", false)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(h.provider.calls(), 3, "two resolver calls, one agent run");
    assert_eq!(h.reports.rows().len(), 1);
}

#[tokio::test]
async fn test_force_regenerate_bypasses_cache_and_overwrites() {
    let h = Harness::with_operator_key();
    h.provider.push(Ok(text_response("AAPL")));
    h.provider.push(Ok(text_response(REPORT_JSON)));

    h.pipeline.handle(&operator(), "Apple", false).await.unwrap();

    h.provider.push(Ok(text_response(
        r###"{"score": 31, "markdown": "## Verdict\nBearish now"}"###,
    )));
    let regenerated = h.pipeline.handle(&operator(), "Apple", true).await.unwrap();

    assert_eq!(regenerated.sentiment_score, 31);

    // The overwritten row and cache entry both carry the second run
    let rows = h.reports.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].content, "## Verdict\nBearish now");

    h.reset_counters();
    let cached = h.pipeline.handle(&operator(), "Apple", false).await.unwrap();
    assert_eq!(cached, regenerated);
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn test_at_most_one_row_per_identifier_and_owner() {
    let h = Harness::with_operator_key();
    h.provider.push(Ok(text_response("AAPL")));
    h.provider.push(Ok(text_response(REPORT_JSON)));
    h.pipeline.handle(&operator(), "Apple", true).await.unwrap();

    h.provider.push(Ok(text_response(
        r#"{"score": 55, "markdown": "second run"}"#,
    )));
    h.pipeline.handle(&operator(), "Apple", true).await.unwrap();

    let rows = h.reports.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].content, "second run");
    assert_eq!(rows[0].sentiment_score, Some(55));
}

#[tokio::test]
async fn test_upstream_rejection_purges_stored_credential() {
    // No operator key: the run charges the user's own stored credential
    let h = Harness::new(PipelineConfig::default());
    let user = Principal::new("user-1").with_subject("uid-1");
    h.identity
        .set_encrypted_credential("uid-1", "enc:sk-broken")
        .await
        .unwrap();

    h.provider.push(Ok(text_response("AAPL")));
    h.provider.push(Err(LlmError::AuthenticationFailed));

    let err = h
        .pipeline
        .handle(&user, "Apple", false)
        .await
        .expect_err("run fails");

    assert!(matches!(err, PipelineError::CredentialRequired));
    assert_eq!(err.status_code(), 428);
    assert!(!h.identity.has("uid-1"), "rejected credential purged");
    assert!(h.reports.rows().is_empty());
}

#[tokio::test]
async fn test_quota_exhaustion_also_purges() {
    let h = Harness::new(PipelineConfig::default());
    let user = Principal::new("user-2").with_subject("uid-2");
    h.identity
        .set_encrypted_credential("uid-2", "enc:sk-exhausted")
        .await
        .unwrap();

    h.provider.push(Ok(text_response("AAPL")));
    h.provider
        .push(Err(LlmError::RateLimitExceeded("quota".to_string())));

    let err = h.pipeline.handle(&user, "Apple", false).await.expect_err("run fails");
    assert!(matches!(err, PipelineError::CredentialRequired));
    assert!(!h.identity.has("uid-2"));
}

#[tokio::test]
async fn test_enrichment_failure_yields_report_without_chart() {
    let h = Harness::with_operator_key();
    h.market.set_failing(true);
    h.provider.push(Ok(text_response("AAPL")));
    h.provider.push(Ok(text_response(REPORT_JSON)));

    let payload = h
        .pipeline
        .handle(&operator(), "Apple", false)
        .await
        .expect("enrichment failure must not abort the run");

    assert!(payload.chart.is_none());
    assert_eq!(payload.sentiment_score, 72);
    assert_eq!(payload.markdown, "## Verdict\nBullish");
    assert_eq!(h.reports.rows().len(), 1);
}

#[tokio::test]
async fn test_tool_failure_is_fed_back_not_fatal() {
    let h = Harness::with_operator_key();
    h.market.set_failing(true);
    h.provider.push(Ok(text_response("AAPL")));
    h.provider.push(Ok(tool_call_response(
        "price_series",
        json!({"symbol": "AAPL"}),
    )));
    h.provider.push(Ok(text_response(REPORT_JSON)));

    let payload = h.pipeline.handle(&operator(), "Apple", false).await.unwrap();
    assert_eq!(payload.sentiment_score, 72);
}

#[tokio::test]
async fn test_fenced_model_output_parses_end_to_end() {
    let h = Harness::with_operator_key();
    h.provider.push(Ok(text_response("AAPL")));
    h.provider.push(Ok(text_response(
        "```json\n{\"score\":80,\"markdown\":\"X\"}\n```",
    )));

    let payload = h.pipeline.handle(&operator(), "Apple", false).await.unwrap();
    assert_eq!(payload.sentiment_score, 80);
    assert_eq!(payload.markdown, "X");
}

#[tokio::test]
async fn test_degraded_parse_still_ships_a_report() {
    let h = Harness::with_operator_key();
    h.provider.push(Ok(text_response("AAPL")));
    h.provider
        .push(Ok(text_response("The market looks rough this quarter.")));

    let payload = h.pipeline.handle(&operator(), "Apple", false).await.unwrap();
    assert_eq!(payload.sentiment_score, 50);
    assert_eq!(payload.markdown, "The market looks rough this quarter.");
}

#[tokio::test]
async fn test_missing_credential_is_428() {
    let h = Harness::new(PipelineConfig::default());
    let err = h
        .pipeline
        .handle(&Principal::new("anon"), "Apple", false)
        .await
        .expect_err("no credential available");

    assert!(matches!(err, PipelineError::CredentialRequired));
    assert_eq!(err.status_code(), 428);
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn test_unresolvable_query_is_400() {
    let h = Harness::with_operator_key();
    h.provider.push(Ok(text_response("UNRESOLVABLE")));

    let err = h
        .pipeline
        .handle(&operator(), "my neighbour's bakery", false)
        .await
        .expect_err("nothing to resolve");

    assert!(matches!(err, PipelineError::UnrecognizedSubject(_)));
    assert_eq!(err.status_code(), 400);
    assert!(h.reports.rows().is_empty());
}

#[tokio::test]
async fn test_reasoning_exhausted_persists_nothing() {
    let h = Harness::new(
        PipelineConfig::builder()
            .operator_credential("op-key")
            .max_turns(2)
            .build()
            .unwrap(),
    );
    h.provider.push(Ok(text_response("AAPL")));
    h.provider.push(Ok(tool_call_response(
        "news_search",
        json!({"query": "AAPL"}),
    )));
    h.provider.push(Ok(tool_call_response(
        "news_search",
        json!({"query": "AAPL earnings"}),
    )));

    let err = h.pipeline.handle(&operator(), "Apple", false).await.expect_err("loop bound hit");
    assert!(matches!(err, PipelineError::ReasoningExhausted(2)));
    assert!(h.reports.rows().is_empty(), "truncated runs are not persisted");
}

#[tokio::test]
async fn test_delete_report_invalidates_cache() {
    let h = Harness::with_operator_key();
    h.provider.push(Ok(text_response("AAPL")));
    h.provider.push(Ok(text_response(REPORT_JSON)));

    let principal = operator();
    h.pipeline.handle(&principal, "Apple", false).await.unwrap();

    let reports = h.pipeline.list_reports(&principal).await.unwrap();
    assert_eq!(reports.len(), 1);
    let id = reports[0].id.unwrap();

    h.pipeline.delete_report(&principal, id).await.unwrap();
    assert!(h.reports.rows().is_empty());

    // The cache entry is gone too: the next request runs the agent again
    // (the resolver memo survives, so no resolver call is scripted).
    h.reset_counters();
    h.provider.push(Ok(text_response(REPORT_JSON)));
    h.pipeline.handle(&principal, "Apple", false).await.unwrap();
    assert_eq!(h.provider.calls(), 1, "agent ran again after invalidation");
}

#[tokio::test]
async fn test_report_access_is_owner_scoped() {
    let h = Harness::with_operator_key();
    h.provider.push(Ok(text_response("AAPL")));
    h.provider.push(Ok(text_response(REPORT_JSON)));

    let owner = operator();
    h.pipeline.handle(&owner, "Apple", false).await.unwrap();
    let id = h.pipeline.list_reports(&owner).await.unwrap()[0].id.unwrap();

    let stranger = Principal::new("someone-else");
    let err = h.pipeline.get_report(&stranger, id).await.expect_err("not the owner");
    assert!(matches!(err, PipelineError::NotAuthorized));
    assert_eq!(err.status_code(), 403);

    let err = h.pipeline.get_report(&owner, 9999).await.expect_err("no such row");
    assert!(matches!(err, PipelineError::NotFound));
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_credential_manager_roundtrip() {
    let h = Harness::new(PipelineConfig::default());
    let user = Principal::new("user-3").with_subject("uid-3");

    assert!(!h.pipeline.credentials().status(&user).await.unwrap());
    h.pipeline.credentials().store(&user, "sk-fresh").await.unwrap();
    assert!(h.pipeline.credentials().status(&user).await.unwrap());

    // Stored ciphertext, resolvable back to the plaintext credential
    let resolved = h.pipeline.resolve_credential(&user).await.expect("credential");
    assert_eq!(resolved.as_str(), "sk-fresh");

    assert!(h.pipeline.credentials().remove(&user).await.unwrap());
    assert!(h.pipeline.resolve_credential(&user).await.is_none());
}
