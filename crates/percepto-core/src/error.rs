use thiserror::Error;

/// Unified error type for the entire Percepto workspace.
#[derive(Error, Debug)]
pub enum PerceptoError {
    // ── Model errors ───────────────────────────────────────────
    #[error("llm provider error: {0}")]
    LlmProvider(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    // ── Tool errors ────────────────────────────────────────────
    #[error("tool retrieval failed: {tool}: {reason}")]
    ToolRetrieval { tool: String, reason: String },

    #[error("tool not connected: {0}")]
    ToolNotConnected(String),

    // ── Memory errors ──────────────────────────────────────────
    #[error("memory error: {0}")]
    Memory(String),

    #[error("transcript store error: {0}")]
    Transcript(String),

    #[error("consolidation failed: {0}")]
    Consolidation(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl PerceptoError {
    /// Shorthand for a tool retrieval failure.
    pub fn tool(tool: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ToolRetrieval {
            tool: tool.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PerceptoError>;
