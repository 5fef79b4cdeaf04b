use percepto_config::PerceptoConfig;
use percepto_core::{RouteKind, ToolRetriever};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::{DateTimeRetriever, LocationRetriever, WeatherRetriever, WebSearchRetriever};

/// The connected tool retrievers, keyed by the route they serve.
#[derive(Clone, Default)]
pub struct ToolSet {
    retrievers: HashMap<RouteKind, Arc<dyn ToolRetriever>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every retriever whose API key is configured.
    pub fn from_config(config: &PerceptoConfig) -> percepto_core::Result<Self> {
        let client = crate::http_client(
            Duration::from_secs(config.services.http_timeout_secs),
            &config.tools.user_agent,
        )?;
        let services = &config.services;
        let default_city = config.tools.default_city.clone();
        let mut set = Self::new();

        match &services.weather_api_key {
            Some(key) => {
                set.register(Arc::new(WeatherRetriever::new(
                    client.clone(),
                    key.clone(),
                    default_city.clone(),
                )));
                set.register(Arc::new(DateTimeRetriever::new(
                    client.clone(),
                    key.clone(),
                    default_city,
                )));
            }
            None => warn!("weather_api_key not set; weather and date/time tools disabled"),
        }
        match &services.google_api_key {
            Some(key) => set.register(Arc::new(LocationRetriever::new(client.clone(), key.clone()))),
            None => warn!("google_api_key not set; location tool disabled"),
        }
        match &services.serpapi_api_key {
            Some(key) => set.register(Arc::new(WebSearchRetriever::new(client, key.clone()))),
            None => warn!("serpapi_api_key not set; web search tool disabled"),
        }

        info!(tools = ?set.kinds(), "tool retrievers connected");
        Ok(set)
    }

    /// Register a retriever, replacing any previous one for the same route.
    pub fn register(&mut self, retriever: Arc<dyn ToolRetriever>) {
        self.retrievers.insert(retriever.kind(), retriever);
    }

    pub fn with(mut self, retriever: Arc<dyn ToolRetriever>) -> Self {
        self.register(retriever);
        self
    }

    pub fn get(&self, kind: RouteKind) -> Option<Arc<dyn ToolRetriever>> {
        self.retrievers.get(&kind).cloned()
    }

    pub fn is_connected(&self, kind: RouteKind) -> bool {
        self.retrievers.contains_key(&kind)
    }

    /// Connected routes in a stable order.
    pub fn kinds(&self) -> Vec<RouteKind> {
        let mut kinds: Vec<RouteKind> = self.retrievers.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }

    pub fn len(&self) -> usize {
        self.retrievers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retrievers.is_empty()
    }
}
