use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::schema::PerceptoConfig;

/// Loads and reloads the Percepto configuration.
pub struct ConfigLoader {
    config: Arc<RwLock<PerceptoConfig>>,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// The Percepto home directory: `~/.percepto`.
    pub fn base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".percepto")
    }

    /// Resolve the config path: explicit path > PERCEPTO_CONFIG env > ~/.percepto/percepto.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("PERCEPTO_CONFIG") {
            return PathBuf::from(p);
        }
        Self::base_dir().join("percepto.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> percepto_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            Self::read_file(&config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            PerceptoConfig::default()
        };

        let config = Self::apply_env_overrides(config);

        // Log validation warnings, fail on errors
        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(percepto_core::PerceptoError::Config(e));
            }
        }

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
        })
    }

    /// Get a read snapshot of the current config.
    pub fn get(&self) -> PerceptoConfig {
        self.config.read().clone()
    }

    /// Get a shared handle to the live config.
    pub fn shared(&self) -> Arc<RwLock<PerceptoConfig>> {
        Arc::clone(&self.config)
    }

    /// Path the config was loaded from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    fn read_file(config_path: &Path) -> percepto_core::Result<PerceptoConfig> {
        let raw = std::fs::read_to_string(config_path)?;
        toml::from_str::<PerceptoConfig>(&raw).map_err(|e| {
            percepto_core::PerceptoError::Config(format!(
                "failed to parse {}: {}",
                config_path.display(),
                e
            ))
        })
    }

    /// Apply env var overrides (PERCEPTO_MODEL, PERCEPTO_USER_NAME, etc.)
    fn apply_env_overrides(mut config: PerceptoConfig) -> PerceptoConfig {
        if let Ok(v) = std::env::var("PERCEPTO_MODEL") {
            config.assistant.model = v;
        }
        if let Ok(v) = std::env::var("PERCEPTO_USER_NAME") {
            config.assistant.user_name = v;
        }
        if let Ok(v) = std::env::var("PERCEPTO_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("PERCEPTO_CONSOLIDATION_THRESHOLD")
            && let Ok(threshold) = v.parse::<u64>()
        {
            config.memory.consolidation_threshold = threshold;
        }
        // API keys: env var fills in when config file doesn't have the key set.
        // Config file takes priority, env is the fallback.
        let fallbacks = [
            (&mut config.services.openai_api_key, "OPENAI_API_KEY"),
            (&mut config.services.weather_api_key, "WEATHER_API_KEY"),
            (&mut config.services.google_api_key, "GOOGLE_API_KEY"),
            (&mut config.services.serpapi_api_key, "SERPAPI_API_KEY"),
        ];
        for (slot, var) in fallbacks {
            if slot.is_none()
                && let Ok(v) = std::env::var(var)
            {
                *slot = Some(v);
            }
        }
        config
    }

    /// Reload the config from disk.
    pub fn reload(&self) -> percepto_core::Result<()> {
        if !self.config_path.exists() {
            return Err(percepto_core::PerceptoError::Config(format!(
                "config file not found: {}",
                self.config_path.display()
            )));
        }
        let new_config = Self::apply_env_overrides(Self::read_file(&self.config_path)?);
        new_config
            .validate()
            .map_err(percepto_core::PerceptoError::Config)?;
        *self.config.write() = new_config;
        info!("configuration reloaded");
        Ok(())
    }
}
