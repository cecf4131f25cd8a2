//! Tool summarizing recent price action for a symbol

use crate::collab::MarketData;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use signal_llm::tools::schema;
use signal_tools::Tool;
use std::sync::Arc;

/// Lookback window for the in-loop price summary
///
/// Deliberately shorter than the chart enrichment window: the agent needs
/// recent momentum, not a full quarter of daily closes in its context.
const SUMMARY_LOOKBACK_DAYS: u32 = 30;

/// Tool for fetching a recent price summary
pub struct PriceSeriesTool {
    market: Arc<dyn MarketData>,
}

#[derive(Debug, Deserialize)]
struct PriceSeriesParams {
    symbol: String,
}

impl PriceSeriesTool {
    /// Create the tool over the market-data collaborator
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }

    async fn fetch_summary(&self, params: PriceSeriesParams) -> anyhow::Result<Value> {
        let symbol = params.symbol.trim().to_uppercase();

        let Some(chart) = self
            .market
            .price_history(&symbol, SUMMARY_LOOKBACK_DAYS)
            .await?
        else {
            return Ok(json!({ "error": format!("no price data found for {symbol}") }));
        };

        let (Some(first), Some(last)) = (chart.history.first(), chart.history.last()) else {
            return Ok(json!({ "error": format!("no price data found for {symbol}") }));
        };

        let growth = if first.price == 0.0 {
            0.0
        } else {
            (last.price - first.price) / first.price * 100.0
        };

        Ok(json!({
            "symbol": chart.symbol,
            "currency": chart.currency,
            "current_price": round2(last.price),
            "start_price": round2(first.price),
            "growth_percent": round2(growth),
            "period_days": SUMMARY_LOOKBACK_DAYS,
        }))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[async_trait]
impl Tool for PriceSeriesTool {
    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let params: PriceSeriesParams = serde_json::from_value(params)?;
        self.fetch_summary(params).await
    }

    fn name(&self) -> &str {
        "price_series"
    }

    fn description(&self) -> &str {
        "Fetch recent price action for a stock: current price, price one month ago, \
         and percentage growth. Input is a ticker symbol (e.g. AAPL, ETERNAL.NS)."
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({
                "symbol": schema::string(
                    "Ticker symbol, market suffix included for non-US exchanges"
                ),
            }),
            vec!["symbol"],
        )
    }
}
