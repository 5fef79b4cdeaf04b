use percepto_config::PerceptoConfig;
use percepto_core::{PerceptoError, Result};
use percepto_llm::{EmbeddingProvider, LlmProvider, OllamaEmbedding, OpenAiEmbedding, OpenAiProvider};
use percepto_memory::{InteractionCounter, MemoryStore, TranscriptStore};
use percepto_tools::ToolSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Everything the pipeline and consolidation need, passed explicitly.
///
/// Cheap to clone: stores share their connection and providers sit behind `Arc`.
#[derive(Clone)]
pub struct AssistantContext {
    pub config: PerceptoConfig,
    pub llm: Arc<dyn LlmProvider>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub memory: MemoryStore,
    pub transcripts: TranscriptStore,
    pub tools: ToolSet,
}

impl AssistantContext {
    /// Open the stores and connect the providers described by `config`.
    pub fn from_config(config: PerceptoConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.services.http_timeout_secs);
        let llm = build_llm(&config, timeout)?;
        let embedder = build_embedder(&config, timeout)?;

        let db_path = config.memory.resolved_db_path();
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let memory = MemoryStore::open(&db_path, &config.memory.collection)?;
        let transcripts = TranscriptStore::open(&db_path)?;
        let tools = ToolSet::from_config(&config)?;

        info!(
            db = %db_path.display(),
            llm = llm.name(),
            embedder = embedder.name(),
            tools = tools.len(),
            "assistant context ready"
        );

        Ok(Self {
            config,
            llm,
            embedder,
            memory,
            transcripts,
            tools,
        })
    }

    /// The interaction counter consolidation reads and resets.
    pub fn counter(&self) -> Arc<dyn InteractionCounter> {
        Arc::new(self.transcripts.clone())
    }

    /// A request for the configured chat model.
    pub fn request(&self, prompt: impl Into<String>) -> percepto_llm::LlmRequest {
        let assistant = &self.config.assistant;
        percepto_llm::LlmRequest::prompt(&assistant.model, prompt)
            .with_limits(assistant.max_tokens, assistant.temperature)
    }
}

fn build_llm(config: &PerceptoConfig, timeout: Duration) -> Result<Arc<dyn LlmProvider>> {
    let key = config.services.openai_api_key.clone().ok_or_else(|| {
        PerceptoError::Config("openai_api_key is not set (config or OPENAI_API_KEY)".into())
    })?;
    let mut provider = OpenAiProvider::new(key);
    if let Some(url) = &config.services.openai_base_url {
        provider = provider.with_base_url(url.clone(), "openai-compatible".into());
    }
    Ok(Arc::new(provider.with_timeout(timeout)?))
}

fn build_embedder(config: &PerceptoConfig, timeout: Duration) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedding = &config.embedding;
    match embedding.provider.as_str() {
        "ollama" => {
            let mut provider = OllamaEmbedding::new(&embedding.model, embedding.dimensions);
            if let Some(url) = &embedding.base_url {
                provider = provider.with_base_url(url.clone());
            }
            Ok(Arc::new(provider.with_timeout(timeout)?))
        }
        "openai" => {
            let key = config.services.openai_api_key.clone().ok_or_else(|| {
                PerceptoError::Config("openai_api_key is required for openai embeddings".into())
            })?;
            let mut provider =
                OpenAiEmbedding::new(key).with_model(embedding.model.clone(), embedding.dimensions);
            if let Some(url) = embedding.base_url.as_ref().or(config.services.openai_base_url.as_ref()) {
                provider = provider.with_base_url(url.clone());
            }
            Ok(Arc::new(provider.with_timeout(timeout)?))
        }
        other => Err(PerceptoError::Config(format!("unknown embedding provider: {other}"))),
    }
}

/// Build a context over in-memory stores with no tools connected (for testing).
pub fn build_test_context(
    config: PerceptoConfig,
    llm: Arc<dyn LlmProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<AssistantContext> {
    let memory = MemoryStore::open_in_memory(&config.memory.collection)?;
    let transcripts = TranscriptStore::open_in_memory()?;
    Ok(AssistantContext {
        config,
        llm,
        embedder,
        memory,
        transcripts,
        tools: ToolSet::new(),
    })
}
