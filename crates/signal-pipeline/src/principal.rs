//! Data model for the report pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel literal the resolver model returns for unrecognizable input
pub const UNRESOLVABLE_SENTINEL: &str = "UNRESOLVABLE";

/// Longest symbol accepted from the resolver model, suffix included
const MAX_SYMBOL_LEN: usize = 12;

/// An authenticated caller
///
/// Constructed per request by the identity-verification collaborator;
/// never persisted by this crate.
#[derive(Debug, Clone)]
pub struct Principal {
    /// Stable identity key (persistence owner id)
    pub identity_key: String,

    /// Externally-issued subject id, present when the caller can own a
    /// stored credential
    pub external_subject_id: Option<String>,

    /// Whether this caller is a designated operator account
    pub is_operator: bool,
}

impl Principal {
    /// Create a plain principal with no external subject
    pub fn new(identity_key: impl Into<String>) -> Self {
        Self {
            identity_key: identity_key.into(),
            external_subject_id: None,
            is_operator: false,
        }
    }

    /// Attach an external subject id
    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.external_subject_id = Some(subject_id.into());
        self
    }

    /// Mark this principal as an operator account
    pub fn operator(mut self) -> Self {
        self.is_operator = true;
        self
    }
}

/// An opaque secret authorizing calls to the generative model
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    /// Wrap a plaintext credential
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Access the plaintext secret
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// The secret never appears in logs or debug output.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// A canonical instrument identifier, or the unresolvable sentinel
///
/// Synonym queries ("Zomato", "ETERNAL.NS") collapse to one resolved symbol,
/// which is the stable key for caching and persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CanonicalIdentifier {
    /// Uppercase instrument symbol, market suffix included
    Resolved(String),
    /// The query could not be mapped to an instrument
    Unresolvable,
}

impl CanonicalIdentifier {
    /// Normalize a raw resolver-model reply into an identifier
    ///
    /// Trims and uppercases the reply; the exact sentinel maps to
    /// `Unresolvable`. Replies with whitespace inside or implausible length
    /// are rejected too, keeping junk prose out of the cache key space.
    pub fn from_model_reply(raw: &str) -> Self {
        let symbol = raw.trim().to_uppercase();

        if symbol.is_empty()
            || symbol == UNRESOLVABLE_SENTINEL
            || symbol.len() > MAX_SYMBOL_LEN
            || symbol.chars().any(char::is_whitespace)
        {
            return CanonicalIdentifier::Unresolvable;
        }

        CanonicalIdentifier::Resolved(symbol)
    }

    /// The resolved symbol, if any
    pub fn symbol(&self) -> Option<&str> {
        match self {
            CanonicalIdentifier::Resolved(s) => Some(s),
            CanonicalIdentifier::Unresolvable => None,
        }
    }

    /// Whether this identifier resolved to a symbol
    pub fn is_resolved(&self) -> bool {
        matches!(self, CanonicalIdentifier::Resolved(_))
    }
}

/// One point in a price series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Calendar date, `YYYY-MM-DD`
    pub date: String,
    /// Closing price
    pub price: f64,
}

/// Price history enrichment attached to a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    /// Instrument symbol
    pub symbol: String,
    /// Currency of the prices
    pub currency: String,
    /// Ordered daily price points
    pub history: Vec<PricePoint>,
}

/// The assembled investment report
///
/// Immutable once constructed; cached, persisted, or both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    /// Canonical instrument symbol this report covers
    pub company: String,
    /// Overall market sentiment, 0 (max bearish) to 100 (max bullish)
    pub sentiment_score: u8,
    /// Formatted markdown report text
    pub markdown: String,
    /// Optional price-series enrichment
    pub chart: Option<ChartData>,
}

/// A persisted report row
///
/// At most one row exists per `(company, owner_id)` pair; regeneration
/// replaces the prior row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRecord {
    /// Storage id; `None` before the first insert
    pub id: Option<i64>,
    /// Canonical instrument symbol
    pub company: String,
    /// Markdown report text
    pub content: String,
    /// Sentiment score, absent for degraded parses persisted before scoring
    pub sentiment_score: Option<u8>,
    /// Chart enrichment
    pub chart: Option<ChartData>,
    /// Owning principal's identity key
    pub owner_id: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}
