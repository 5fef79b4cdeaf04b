use async_trait::async_trait;
use percepto_core::{PerceptoError, Result, RouteKind, ToolAnswer, ToolRetriever};
use tracing::{debug, warn};

use crate::WEATHERAPI_SOURCE;
use crate::place::weather_place;

/// Current conditions from weatherapi.com.
///
/// The place comes from the query; otherwise from IP geolocation, otherwise
/// the configured default city.
pub struct WeatherRetriever {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    ip_lookup_url: Option<String>,
    default_city: String,
}

impl WeatherRetriever {
    pub fn new(client: reqwest::Client, api_key: String, default_city: String) -> Self {
        Self {
            client,
            api_key,
            base_url: "https://api.weatherapi.com/v1".into(),
            ip_lookup_url: Some("http://ip-api.com/json/".into()),
            default_city,
        }
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Override the IP geolocation endpoint; `None` disables the lookup.
    pub fn with_ip_lookup(mut self, url: Option<String>) -> Self {
        self.ip_lookup_url = url;
        self
    }

    async fn city_from_ip(&self) -> Option<String> {
        let url = self.ip_lookup_url.as_ref()?;
        let resp = match self.client.get(url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!(status = %r.status(), "ip geolocation failed");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "ip geolocation failed");
                return None;
            }
        };
        let data: serde_json::Value = resp.json().await.ok()?;
        data["city"]
            .as_str()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from)
    }

    async fn resolve_place(&self, query: &str) -> String {
        if let Some(place) = weather_place(query) {
            return place;
        }
        match self.city_from_ip().await {
            Some(city) => city,
            None => self.default_city.clone(),
        }
    }
}

#[async_trait]
impl ToolRetriever for WeatherRetriever {
    fn kind(&self) -> RouteKind {
        RouteKind::Weather
    }

    fn name(&self) -> &str {
        "weather"
    }

    async fn retrieve(&self, query: &str) -> Result<ToolAnswer> {
        let place = self.resolve_place(query).await;
        debug!(%place, "fetching current weather");

        let resp = self
            .client
            .get(format!("{}/current.json", self.base_url))
            .query(&[("key", self.api_key.as_str()), ("q", place.as_str())])
            .send()
            .await
            .map_err(|e| PerceptoError::tool("weather", e))?;

        if !resp.status().is_success() {
            return Err(PerceptoError::tool("weather", format!("HTTP {}", resp.status())));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| PerceptoError::tool("weather", e))?;

        let location = &data["location"];
        let current = &data["current"];
        let (Some(name), Some(country), Some(condition)) = (
            location["name"].as_str(),
            location["country"].as_str(),
            current["condition"]["text"].as_str(),
        ) else {
            return Err(PerceptoError::tool("weather", "unexpected response shape"));
        };

        let content = format!(
            "The current weather in {}, {} is {} with a temperature of {}°C, humidity at {}%, and wind speed of {} kph.",
            name, country, condition, current["temp_c"], current["humidity"], current["wind_kph"]
        );
        Ok(ToolAnswer::new(content, WEATHERAPI_SOURCE))
    }
}
