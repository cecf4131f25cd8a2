//! Tool searching recent market news

use crate::collab::NewsSource;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use signal_llm::tools::schema;
use signal_tools::Tool;
use std::sync::Arc;

/// Tool for searching recent news about a company or topic
pub struct NewsSearchTool {
    news: Arc<dyn NewsSource>,
}

#[derive(Debug, Deserialize)]
struct NewsSearchParams {
    query: String,
}

impl NewsSearchTool {
    /// Create the tool over the news collaborator
    pub fn new(news: Arc<dyn NewsSource>) -> Self {
        Self { news }
    }
}

#[async_trait]
impl Tool for NewsSearchTool {
    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let params: NewsSearchParams = serde_json::from_value(params)?;
        let text = self.news.search(&params.query).await?;
        Ok(Value::String(text))
    }

    fn name(&self) -> &str {
        "news_search"
    }

    fn description(&self) -> &str {
        "Search for recent market news about a company or topic. \
         Input is a plain-text query (e.g. 'NVDA earnings guidance')."
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({ "query": schema::string("News search query") }),
            vec!["query"],
        )
    }
}
