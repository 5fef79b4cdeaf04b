use async_trait::async_trait;
use percepto_core::{PerceptoError, Result, RouteKind, ToolAnswer, ToolRetriever};
use tracing::debug;

/// The user's current whereabouts: Google geolocation for coordinates, then
/// OpenStreetMap Nominatim reverse geocoding for a readable address.
pub struct LocationRetriever {
    client: reqwest::Client,
    api_key: String,
    geolocate_url: String,
    reverse_url: String,
}

impl LocationRetriever {
    /// The client should carry a descriptive User-Agent; Nominatim rejects anonymous requests.
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            geolocate_url: "https://www.googleapis.com/geolocation/v1/geolocate".into(),
            reverse_url: "https://nominatim.openstreetmap.org/reverse".into(),
        }
    }

    pub fn with_endpoints(mut self, geolocate_url: String, reverse_url: String) -> Self {
        self.geolocate_url = geolocate_url;
        self.reverse_url = reverse_url;
        self
    }

    async fn coordinates(&self) -> Result<(f64, f64)> {
        let resp = self
            .client
            .post(&self.geolocate_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&serde_json::json!({ "considerIp": true }))
            .send()
            .await
            .map_err(|e| PerceptoError::tool("location", e))?;

        if !resp.status().is_success() {
            return Err(PerceptoError::tool(
                "location",
                format!("geolocation HTTP {}", resp.status()),
            ));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| PerceptoError::tool("location", e))?;
        match (data["location"]["lat"].as_f64(), data["location"]["lng"].as_f64()) {
            (Some(lat), Some(lng)) => Ok((lat, lng)),
            _ => Err(PerceptoError::tool("location", "geolocation returned no coordinates")),
        }
    }

    async fn describe(&self, lat: f64, lng: f64) -> Result<String> {
        let (lat, lng) = (lat.to_string(), lng.to_string());
        let resp = self
            .client
            .get(&self.reverse_url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lng.as_str()),
                ("format", "json"),
                ("zoom", "18"),
                ("addressdetails", "1"),
                ("accept-language", "en"),
            ])
            .send()
            .await
            .map_err(|e| PerceptoError::tool("location", e))?;

        if !resp.status().is_success() {
            return Err(PerceptoError::tool(
                "location",
                format!("reverse geocoding HTTP {}", resp.status()),
            ));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| PerceptoError::tool("location", e))?;
        data["display_name"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| PerceptoError::tool("location", "reverse geocoding returned no address"))
    }
}

#[async_trait]
impl ToolRetriever for LocationRetriever {
    fn kind(&self) -> RouteKind {
        RouteKind::Location
    }

    fn name(&self) -> &str {
        "location"
    }

    /// The query is not consulted: the answer is always the current position.
    async fn retrieve(&self, _query: &str) -> Result<ToolAnswer> {
        let (lat, lng) = self.coordinates().await?;
        debug!(lat, lng, "resolved coordinates");
        let address = self.describe(lat, lng).await?;
        Ok(ToolAnswer::new(
            format!("Based on your location, you are at {}.", address),
            "",
        ))
    }
}
