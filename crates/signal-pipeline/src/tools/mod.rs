//! Tools the report agent can call mid-reasoning
//!
//! Both tools are thin adapters over the market-data and news collaborator
//! traits: pure request/response capabilities carrying no loop state.

pub mod news_search;
pub mod price_series;

pub use news_search::NewsSearchTool;
pub use price_series::PriceSeriesTool;
