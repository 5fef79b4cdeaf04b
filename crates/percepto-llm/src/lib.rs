//! # percepto-llm
//!
//! Abstraction layer over the language model and embedding providers the
//! assistant talks to, plus deterministic mocks for tests.

pub mod embedding;
pub mod mock;
pub mod openai;
pub mod provider;

pub use embedding::{EmbeddingProvider, OllamaEmbedding, OpenAiEmbedding, embed_one};
pub use mock::{MockEmbedding, MockProvider};
pub use openai::OpenAiProvider;
pub use provider::{LlmProvider, LlmRequest, LlmResponse, StopReason, Usage};
