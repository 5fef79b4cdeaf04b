//! Mock retriever for deterministic testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use percepto_core::{PerceptoError, Result, RouteKind, ToolAnswer, ToolRetriever};
use std::sync::Arc;

enum Behavior {
    Answer(ToolAnswer),
    Fail(String),
}

/// A retriever that returns a fixed answer (or error) and records every query.
pub struct MockRetriever {
    kind: RouteKind,
    behavior: Behavior,
    /// Queries received, in call order.
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockRetriever {
    pub fn answering(kind: RouteKind, content: &str, url: &str) -> Self {
        Self {
            kind,
            behavior: Behavior::Answer(ToolAnswer::new(content, url)),
            calls: Arc::new(Mutex::new(vec![])),
        }
    }

    pub fn failing(kind: RouteKind, reason: &str) -> Self {
        Self {
            kind,
            behavior: Behavior::Fail(reason.to_string()),
            calls: Arc::new(Mutex::new(vec![])),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ToolRetriever for MockRetriever {
    fn kind(&self) -> RouteKind {
        self.kind
    }

    fn name(&self) -> &str {
        self.kind.as_str()
    }

    async fn retrieve(&self, query: &str) -> Result<ToolAnswer> {
        self.calls.lock().push(query.to_string());
        match &self.behavior {
            Behavior::Answer(answer) => Ok(answer.clone()),
            Behavior::Fail(reason) => Err(PerceptoError::tool(self.kind.as_str(), reason)),
        }
    }
}
