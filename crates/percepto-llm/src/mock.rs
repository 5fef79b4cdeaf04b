//! Mock providers for deterministic testing.
//!
//! Return pre-configured responses without making any HTTP calls.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::embedding::EmbeddingProvider;
use crate::provider::*;
use percepto_core::{Message, PerceptoError, Result};

/// A mock LLM provider that returns pre-configured responses.
///
/// # Example
/// ```
/// use percepto_llm::mock::MockProvider;
/// let provider = MockProvider::new("test")
///     .with_response("question: Hello, world!");
/// ```
pub struct MockProvider {
    responses: Arc<Mutex<Vec<MockResponse>>>,
    /// Track all requests received (for assertions in tests).
    pub requests: Arc<Mutex<Vec<LlmRequest>>>,
    name: String,
}

/// A pre-configured response from the mock provider.
#[derive(Clone)]
pub struct MockResponse {
    pub text: String,
    pub stop_reason: StopReason,
    pub usage: Usage,
    /// If set, the provider will return this error instead.
    pub error: Option<String>,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            text: String::new(),
            stop_reason: StopReason::EndTurn,
            usage: Usage {
                input_tokens: 100,
                output_tokens: 50,
            },
            error: None,
        }
    }
}

impl MockResponse {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn error(msg: &str) -> Self {
        Self {
            error: Some(msg.to_string()),
            ..Default::default()
        }
    }
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(vec![])),
            requests: Arc::new(Mutex::new(vec![])),
            name: name.into(),
        }
    }

    /// Queue a simple text response.
    pub fn with_response(self, text: &str) -> Self {
        self.responses.lock().push(MockResponse::text(text));
        self
    }

    /// Queue an error response.
    pub fn with_error(self, error: &str) -> Self {
        self.responses.lock().push(MockResponse::error(error));
        self
    }

    /// Queue a response through a shared reference.
    pub fn queue_response(&self, resp: MockResponse) {
        self.responses.lock().push(resp);
    }

    /// Get all requests that were made to this provider.
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().clone()
    }

    /// Number of completions served so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Pop the next queued response, or return a default "no response queued" message.
    fn next_response(&self) -> MockResponse {
        let mut responses = self.responses.lock();
        if responses.is_empty() {
            MockResponse::text("(mock: no more queued responses)")
        } else {
            responses.remove(0)
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.requests.lock().push(request.clone());
        let mock = self.next_response();

        if let Some(error) = mock.error {
            return Err(PerceptoError::LlmProvider(error));
        }

        Ok(LlmResponse {
            message: Message::assistant(mock.text),
            usage: mock.usage,
            stop_reason: mock.stop_reason,
        })
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// A mock embedding provider with fixed vectors per text.
///
/// Texts without a registered vector get the default vector. Texts that
/// contain a registered failure marker produce an `Embedding` error.
pub struct MockEmbedding {
    vectors: Mutex<HashMap<String, Vec<f32>>>,
    default_vector: Vec<f32>,
    fail_markers: Mutex<Vec<String>>,
    /// Every text embedded, in call order.
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockEmbedding {
    pub fn new(default_vector: Vec<f32>) -> Self {
        Self {
            vectors: Mutex::new(HashMap::new()),
            default_vector,
            fail_markers: Mutex::new(vec![]),
            calls: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Register the vector returned for an exact text.
    pub fn with_vector(self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.lock().insert(text.to_string(), vector);
        self
    }

    /// Fail any text containing `marker`.
    pub fn failing_on(self, marker: &str) -> Self {
        self.fail_markers.lock().push(marker.to_string());
        self
    }

    /// Register a vector after construction.
    pub fn set_vector(&self, text: &str, vector: Vec<f32>) {
        self.vectors.lock().insert(text.to_string(), vector);
    }

    pub fn embedded_texts(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedding {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let vectors = self.vectors.lock();
        let markers = self.fail_markers.lock();
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            self.calls.lock().push(text.to_string());
            if let Some(marker) = markers.iter().find(|m| text.contains(m.as_str())) {
                return Err(PerceptoError::Embedding(format!(
                    "mock embedding failure on '{}'",
                    marker
                )));
            }
            out.push(
                vectors
                    .get(*text)
                    .cloned()
                    .unwrap_or_else(|| self.default_vector.clone()),
            );
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.default_vector.len()
    }

    fn name(&self) -> &str {
        "mock"
    }
}
