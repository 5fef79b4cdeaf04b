use async_trait::async_trait;
use percepto_core::{PerceptoError, Result, RouteKind, ToolAnswer, ToolRetriever};
use tracing::debug;

use crate::WEATHERAPI_SOURCE;
use crate::place::datetime_place;

/// Local date and time for a place, from weatherapi.com's timezone endpoint.
pub struct DateTimeRetriever {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    default_city: String,
}

impl DateTimeRetriever {
    pub fn new(client: reqwest::Client, api_key: String, default_city: String) -> Self {
        Self {
            client,
            api_key,
            base_url: "https://api.weatherapi.com/v1".into(),
            default_city,
        }
    }

    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }
}

/// Phrase the local time, mentioning the date and/or time as the query asks.
/// A query mentioning neither gets both.
fn describe(query: &str, name: &str, country: &str, localtime: &str) -> Option<String> {
    let (date_part, time_part) = localtime.trim().split_once(char::is_whitespace)?;
    let lowered = query.to_lowercase();
    let mut include_date = lowered.contains("date");
    let mut include_time = lowered.contains("time");
    if !include_date && !include_time {
        include_date = true;
        include_time = true;
    }

    let mut parts = Vec::new();
    if include_date {
        parts.push(format!("the date is {}", date_part));
    }
    if include_time {
        parts.push(format!("the time is {}", time_part.trim()));
    }
    Some(format!("In {}, {}, {}.", name, country, parts.join(" and ")))
}

#[async_trait]
impl ToolRetriever for DateTimeRetriever {
    fn kind(&self) -> RouteKind {
        RouteKind::DateTime
    }

    fn name(&self) -> &str {
        "datetime"
    }

    async fn retrieve(&self, query: &str) -> Result<ToolAnswer> {
        let place = datetime_place(query).unwrap_or_else(|| self.default_city.clone());
        debug!(%place, "fetching local time");

        let resp = self
            .client
            .get(format!("{}/timezone.json", self.base_url))
            .query(&[("key", self.api_key.as_str()), ("q", place.as_str())])
            .send()
            .await
            .map_err(|e| PerceptoError::tool("datetime", e))?;

        if !resp.status().is_success() {
            return Err(PerceptoError::tool("datetime", format!("HTTP {}", resp.status())));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| PerceptoError::tool("datetime", e))?;
        let location = &data["location"];

        let content = match (
            location["name"].as_str(),
            location["country"].as_str(),
            location["localtime"].as_str(),
        ) {
            (Some(name), Some(country), Some(localtime)) => describe(query, name, country, localtime),
            _ => None,
        }
        .ok_or_else(|| PerceptoError::tool("datetime", "unexpected response shape"))?;

        Ok(ToolAnswer::new(content, WEATHERAPI_SOURCE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_date_only() {
        let text = describe("what's the date in cairo", "Cairo", "Egypt", "2024-05-01 14:30").unwrap();
        assert_eq!(text, "In Cairo, Egypt, the date is 2024-05-01.");
    }

    #[test]
    fn test_describe_time_only() {
        let text = describe("what time is it", "Cairo", "Egypt", "2024-05-01 14:30").unwrap();
        assert_eq!(text, "In Cairo, Egypt, the time is 14:30.");
    }

    #[test]
    fn test_describe_neither_gives_both() {
        let text = describe("clock in tokyo", "Tokyo", "Japan", "2024-05-01 9:05").unwrap();
        assert_eq!(text, "In Tokyo, Japan, the date is 2024-05-01 and the time is 9:05.");
    }

    #[test]
    fn test_describe_rejects_malformed_localtime() {
        assert!(describe("time", "Cairo", "Egypt", "2024-05-01").is_none());
    }
}
