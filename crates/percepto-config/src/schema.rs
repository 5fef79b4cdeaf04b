use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration, read from `percepto.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptoConfig {
    pub assistant: AssistantConfig,
    pub embedding: EmbeddingConfig,
    pub memory: MemoryConfig,
    pub tools: ToolsConfig,
    pub services: ServicesConfig,
    pub logging: LoggingConfig,
}

// ── Assistant ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Name of the person the assistant works for. Used in prompts and in
    /// remembered statements.
    pub user_name: String,
    /// Chat model identifier, e.g. "gpt-4o-mini".
    pub model: String,
    /// Maximum tokens per response.
    pub max_tokens: u32,
    /// Temperature (0.0 - 2.0).
    pub temperature: f32,
    /// Facts about the user, seeded into memory by `percepto seed`.
    pub facts: Vec<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            user_name: "Ahmed".into(),
            model: "gpt-4o-mini".into(),
            max_tokens: 1024,
            temperature: 0.7,
            facts: vec![],
        }
    }
}

// ── Embedding ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// "openai" or "ollama".
    pub provider: String,
    /// Embedding model name.
    pub model: String,
    /// Output dimensionality (3072 for text-embedding-3-large).
    pub dimensions: usize,
    /// Override the provider's base URL.
    pub base_url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "text-embedding-3-large".into(),
            dimensions: 3072,
            base_url: None,
        }
    }
}

// ── Memory ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Path to the SQLite database. Relative paths resolve under `~/.percepto/`.
    pub db_path: PathBuf,
    /// Name of the live memory collection.
    pub collection: String,
    /// Number of memory records retrieved per query.
    pub top_k: usize,
    /// Minimum cosine similarity for a record to join an existing cluster.
    pub cluster_threshold: f32,
    /// Consolidate memory once this many interactions have been saved.
    pub consolidation_threshold: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("memory.db"),
            collection: "conversations".into(),
            top_k: 5,
            cluster_threshold: 0.6,
            consolidation_threshold: 20,
        }
    }
}

impl MemoryConfig {
    /// Resolve `db_path` against `~/.percepto/` when it is relative.
    pub fn resolved_db_path(&self) -> PathBuf {
        if self.db_path.is_absolute() {
            return self.db_path.clone();
        }
        crate::loader::ConfigLoader::base_dir().join(&self.db_path)
    }
}

// ── Tools ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// City used when a weather or time query names no place.
    pub default_city: String,
    /// User-Agent sent to OpenStreetMap Nominatim (required by their usage policy).
    pub user_agent: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            default_city: "Cairo".into(),
            user_agent: "Percepto Location Service".into(),
        }
    }
}

// ── Services ───────────────────────────────────────────────────

/// External service API keys and endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// OpenAI API key, used for chat completions and embeddings.
    /// Can also be set via OPENAI_API_KEY environment variable.
    pub openai_api_key: Option<String>,
    /// OpenAI-compatible base URL (Azure, vLLM, Ollama's /v1, ...).
    pub openai_base_url: Option<String>,
    /// weatherapi.com key, used by the weather and date/time tools.
    pub weather_api_key: Option<String>,
    /// Google Geolocation API key, used by the location tool.
    pub google_api_key: Option<String>,
    /// SerpAPI key, used by the web search tool.
    pub serpapi_api_key: Option<String>,
    /// Timeout applied to every outbound HTTP request.
    pub http_timeout_secs: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: None,
            weather_api_key: None,
            google_api_key: None,
            serpapi_api_key: None,
            http_timeout_secs: 30,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            WarningSeverity::Error => "error",
            WarningSeverity::Warning => "warning",
            WarningSeverity::Info => "info",
        };
        write!(f, "{}: {}: {}", label, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl PerceptoConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Assistant ───
        if self.assistant.model.trim().is_empty() {
            warnings.push(ConfigWarning {
                field: "assistant.model".into(),
                message: "model is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'gpt-4o-mini'".into()),
            });
        }
        if self.assistant.user_name.trim().is_empty() {
            warnings.push(ConfigWarning {
                field: "assistant.user_name".into(),
                message: "user name is empty; prompts and remembered statements will be anonymous".into(),
                severity: WarningSeverity::Warning,
                hint: None,
            });
        }
        if self.assistant.temperature < 0.0 || self.assistant.temperature > 2.0 {
            warnings.push(ConfigWarning {
                field: "assistant.temperature".into(),
                message: format!("temperature {} is out of range", self.assistant.temperature),
                severity: WarningSeverity::Error,
                hint: Some("Temperature must be between 0.0 and 2.0".into()),
            });
        }
        if self.assistant.max_tokens == 0 {
            warnings.push(ConfigWarning {
                field: "assistant.max_tokens".into(),
                message: "max_tokens is 0; the assistant won't produce output".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 1024".into()),
            });
        }

        // ── Embedding ───
        let valid_providers = ["openai", "ollama"];
        if !valid_providers.contains(&self.embedding.provider.as_str()) {
            warnings.push(ConfigWarning {
                field: "embedding.provider".into(),
                message: format!("unknown embedding provider '{}'", self.embedding.provider),
                severity: WarningSeverity::Error,
                hint: Some(format!("Valid values: {}", valid_providers.join(", "))),
            });
        }
        if self.embedding.dimensions == 0 {
            warnings.push(ConfigWarning {
                field: "embedding.dimensions".into(),
                message: "dimensions is 0".into(),
                severity: WarningSeverity::Warning,
                hint: Some("3072 for text-embedding-3-large, 1536 for text-embedding-3-small".into()),
            });
        }

        // ── Memory ───
        if self.memory.top_k == 0 {
            warnings.push(ConfigWarning {
                field: "memory.top_k".into(),
                message: "top_k is 0; no memories will be retrieved".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 5".into()),
            });
        }
        if !(-1.0..=1.0).contains(&self.memory.cluster_threshold) {
            warnings.push(ConfigWarning {
                field: "memory.cluster_threshold".into(),
                message: format!(
                    "threshold {} is outside the cosine similarity range",
                    self.memory.cluster_threshold
                ),
                severity: WarningSeverity::Error,
                hint: Some("Use a value between -1.0 and 1.0; 0.6 is typical".into()),
            });
        }
        if self.memory.consolidation_threshold == 0 {
            warnings.push(ConfigWarning {
                field: "memory.consolidation_threshold".into(),
                message: "threshold is 0; memory would be consolidated after every interaction".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 20".into()),
            });
        }
        if self.memory.collection.trim().is_empty() {
            warnings.push(ConfigWarning {
                field: "memory.collection".into(),
                message: "collection name is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'conversations'".into()),
            });
        }

        // ── Services ───
        for (field, value) in [
            ("services.openai_base_url", &self.services.openai_base_url),
            ("embedding.base_url", &self.embedding.base_url),
        ] {
            if let Some(raw) = value
                && url::Url::parse(raw).is_err()
            {
                warnings.push(ConfigWarning {
                    field: field.into(),
                    message: format!("'{}' is not a valid URL", raw),
                    severity: WarningSeverity::Error,
                    hint: Some("Use a full URL such as 'http://127.0.0.1:11434'".into()),
                });
            }
        }
        if self.services.openai_api_key.is_none() {
            warnings.push(ConfigWarning {
                field: "services.openai_api_key".into(),
                message: "no OpenAI API key; the assistant won't be able to answer".into(),
                severity: WarningSeverity::Info,
                hint: Some("Set services.openai_api_key or export OPENAI_API_KEY".into()),
            });
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        // Check for hard errors
        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
