//! Report generation pipeline for signalforge
//!
//! This crate implements the request pipeline that turns a free-text query
//! about a company into a structured investment report: a sentiment score
//! plus formatted prose, backed by market data and news. The stages:
//!
//! - Credential resolution (operator-wide key or the caller's own key)
//! - Canonical identifier resolution (free text to a ticker symbol)
//! - Cache-aside reuse of previously computed reports
//! - A bounded tool-calling agent loop against a generative model
//! - Tolerant parsing of the model's final answer
//! - Persistence, cache write-back, and a credential-rotation failure policy
//!
//! Storage, identity verification, encryption, and the concrete market-data
//! and news integrations are external collaborators behind the traits in
//! [`collab`].
//!
//! # Example
//!
//! ```rust,ignore
//! use signal_pipeline::{Pipeline, PipelineConfig, Principal};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = Pipeline::builder()
//!         .config(PipelineConfig::from_env())
//!         .identity(identity_store)
//!         .encryptor(encryptor)
//!         .market(market_data)
//!         .news(news_source)
//!         .reports(report_store)
//!         .kv_store(kv_store)
//!         .build()?;
//!
//!     let principal = Principal::new("user-1");
//!     let report = pipeline.handle(&principal, "Zomato", false).await?;
//!     println!("{}", report.markdown);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cache;
pub mod collab;
pub mod config;
pub mod credentials;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod principal;
pub mod prompts;
pub mod resolver;
pub mod tools;

// Re-export main types for convenience
pub use agent::{GeminiFactory, ProviderFactory, ReportAgent};
pub use cache::{MemoryStore, ResultCache};
pub use config::PipelineConfig;
pub use credentials::{CredentialManager, CredentialResolver};
pub use error::{PipelineError, Result};
pub use parser::{ParsedReport, parse_report};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use principal::{
    CanonicalIdentifier, ChartData, Credential, PricePoint, Principal, ReportPayload, ReportRecord,
};
pub use resolver::IdentifierResolver;
