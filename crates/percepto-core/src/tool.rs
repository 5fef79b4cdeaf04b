use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::RouteKind;

/// The answer produced by a tool retriever.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolAnswer {
    /// Short natural-language answer.
    pub content: String,
    /// Where the answer came from. Empty when the tool has no source to cite.
    #[serde(default)]
    pub url: String,
}

impl ToolAnswer {
    pub fn new(content: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            url: url.into(),
        }
    }

    /// The source URL, or `None` when the tool did not provide one.
    pub fn source_url(&self) -> Option<String> {
        let url = self.url.trim();
        (!url.is_empty()).then(|| url.to_string())
    }

    /// True when the answer carries no usable content.
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Trait implemented by every specialized data-lookup tool
/// (weather, location, date/time, web search).
///
/// Retrievers receive the user's original query, not the model's reply.
#[async_trait]
pub trait ToolRetriever: Send + Sync {
    /// The route this retriever serves.
    fn kind(&self) -> RouteKind;

    /// Human-readable name, used in logs.
    fn name(&self) -> &str;

    /// Answer a narrow factual query.
    async fn retrieve(&self, query: &str) -> crate::Result<ToolAnswer>;
}
