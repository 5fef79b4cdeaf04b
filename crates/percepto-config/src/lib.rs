//! # percepto-config
//!
//! Configuration system for the Percepto assistant. Reads from `percepto.toml`
//! and environment variables, with the config file taking priority for API keys
//! and environment variables overriding everything else.

pub mod schema;
pub mod loader;

pub use schema::PerceptoConfig;
pub use schema::{
    AssistantConfig, ConfigWarning, EmbeddingConfig, LoggingConfig, MemoryConfig,
    ServicesConfig, ToolsConfig, WarningSeverity,
};
pub use loader::ConfigLoader;
