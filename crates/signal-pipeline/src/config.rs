//! Configuration for the report pipeline

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for pipeline operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Model used for the report agent
    pub report_model: String,

    /// Model used for identifier resolution
    pub resolver_model: String,

    /// Sampling temperature for report generation
    pub report_temperature: f32,

    /// Sampling temperature for identifier resolution (near-deterministic)
    pub resolver_temperature: f32,

    /// Max tokens per completion
    pub max_tokens: usize,

    /// Hard bound on agent turns before the run fails
    pub max_turns: usize,

    /// TTL for cached reports
    pub cache_ttl: Duration,

    /// Lookback window for chart enrichment, in days
    pub lookback_days: u32,

    /// Operator-wide model credential, served to operator accounts
    pub operator_credential: Option<String>,

    /// Request timeout for model calls
    pub request_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            report_model: "gemini-2.5-flash".to_string(),
            resolver_model: "gemini-2.5-flash".to_string(),
            report_temperature: 0.2,
            resolver_temperature: 0.0,
            max_tokens: 8192,
            max_turns: 10,
            cache_ttl: Duration::from_secs(43_200), // 12 hours
            lookback_days: 90,
            operator_credential: None,
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load defaults with the operator credential from `GOOGLE_API_KEY`
    pub fn from_env() -> Self {
        Self {
            operator_credential: signal_utils::env_opt("GOOGLE_API_KEY"),
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_turns == 0 {
            return Err(PipelineError::Other(
                "max_turns must be greater than 0".to_string(),
            ));
        }

        if self.cache_ttl.is_zero() {
            return Err(PipelineError::Other(
                "cache_ttl must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`PipelineConfig`]
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    report_model: Option<String>,
    resolver_model: Option<String>,
    report_temperature: Option<f32>,
    resolver_temperature: Option<f32>,
    max_tokens: Option<usize>,
    max_turns: Option<usize>,
    cache_ttl: Option<Duration>,
    lookback_days: Option<u32>,
    operator_credential: Option<String>,
    request_timeout: Option<Duration>,
}

impl PipelineConfigBuilder {
    /// Set the report model
    pub fn report_model(mut self, model: impl Into<String>) -> Self {
        self.report_model = Some(model.into());
        self
    }

    /// Set the resolver model
    pub fn resolver_model(mut self, model: impl Into<String>) -> Self {
        self.resolver_model = Some(model.into());
        self
    }

    /// Set the report sampling temperature
    pub fn report_temperature(mut self, temperature: f32) -> Self {
        self.report_temperature = Some(temperature);
        self
    }

    /// Set max tokens per completion
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the agent turn bound
    pub fn max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    /// Set the report cache TTL
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Set the chart lookback window in days
    pub fn lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = Some(days);
        self
    }

    /// Set the operator-wide model credential
    pub fn operator_credential(mut self, credential: impl Into<String>) -> Self {
        self.operator_credential = Some(credential.into());
        self
    }

    /// Set the model request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<PipelineConfig> {
        let defaults = PipelineConfig::default();

        let config = PipelineConfig {
            report_model: self.report_model.unwrap_or(defaults.report_model),
            resolver_model: self.resolver_model.unwrap_or(defaults.resolver_model),
            report_temperature: self
                .report_temperature
                .unwrap_or(defaults.report_temperature),
            resolver_temperature: self
                .resolver_temperature
                .unwrap_or(defaults.resolver_temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            max_turns: self.max_turns.unwrap_or(defaults.max_turns),
            cache_ttl: self.cache_ttl.unwrap_or(defaults.cache_ttl),
            lookback_days: self.lookback_days.unwrap_or(defaults.lookback_days),
            operator_credential: self.operator_credential,
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
        };

        config.validate()?;
        Ok(config)
    }
}
