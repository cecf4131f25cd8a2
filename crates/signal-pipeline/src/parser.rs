//! Tolerant parsing of the agent's final answer
//!
//! The model is contracted to emit a single JSON object with `score` and
//! `markdown`, but may wrap it in a fenced code block or ignore the
//! contract entirely. Parsing never fails: a malformed response degrades to
//! the raw text with a neutral score rather than a hard error.

use serde_json::Value;
use tracing::warn;

/// Neutral sentiment used when the model omits or garbles the score
const NEUTRAL_SCORE: u8 = 50;

/// Typed result extracted from the agent's raw final output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedReport {
    /// The model honored the output contract
    Structured {
        /// Sentiment score, clamped to 0-100
        score: u8,
        /// Markdown report body
        markdown: String,
    },
    /// Decoding failed; the whole raw text is the report body
    Fallback {
        /// Raw model output, served as markdown
        markdown: String,
    },
}

impl ParsedReport {
    /// Sentiment score (neutral for fallbacks)
    pub fn score(&self) -> u8 {
        match self {
            ParsedReport::Structured { score, .. } => *score,
            ParsedReport::Fallback { .. } => NEUTRAL_SCORE,
        }
    }

    /// Markdown report body
    pub fn markdown(&self) -> &str {
        match self {
            ParsedReport::Structured { markdown, .. } | ParsedReport::Fallback { markdown } => {
                markdown
            }
        }
    }

    /// Whether this is a degraded-success fallback
    pub fn is_degraded(&self) -> bool {
        matches!(self, ParsedReport::Fallback { .. })
    }
}

/// Parse the agent's raw final text into a typed report
pub fn parse_report(raw: &str) -> ParsedReport {
    let candidate = strip_fence(raw);

    let Ok(value) = serde_json::from_str::<Value>(candidate) else {
        warn!(length = raw.len(), "Final answer was not valid JSON; degrading to raw text");
        return ParsedReport::Fallback {
            markdown: raw.to_string(),
        };
    };

    let Some(object) = value.as_object() else {
        warn!("Final answer decoded to a non-object; degrading to raw text");
        return ParsedReport::Fallback {
            markdown: raw.to_string(),
        };
    };

    let score = object
        .get("score")
        .and_then(Value::as_i64)
        .map_or(NEUTRAL_SCORE, |s| s.clamp(0, 100) as u8);

    let markdown = object
        .get("markdown")
        .and_then(Value::as_str)
        .map_or_else(|| raw.to_string(), str::to_string);

    ParsedReport::Structured { score, markdown }
}

/// Strip a leading/trailing triple-backtick fence, with or without a
/// language tag, returning the inner text
fn strip_fence(raw: &str) -> &str {
    let trimmed = raw.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the rest of the fence line ("json", "JSON", or nothing)
    let body = match rest.split_once('\n') {
        Some((_tag, body)) => body,
        None => return trimmed,
    };

    body.trim_end()
        .strip_suffix("```")
        .map_or(body, str::trim)
        .trim()
}
