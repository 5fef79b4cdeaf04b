//! # percepto-tools
//!
//! Specialized retrievers the assistant delegates narrow factual queries to.
//! Each one receives the user's original query and answers with a short
//! sentence plus a source URL.

pub mod datetime;
pub mod location;
pub mod mock;
pub mod place;
pub mod toolset;
pub mod weather;
pub mod web_search;

pub use datetime::DateTimeRetriever;
pub use location::LocationRetriever;
pub use mock::MockRetriever;
pub use toolset::ToolSet;
pub use weather::WeatherRetriever;
pub use web_search::WebSearchRetriever;

use std::time::Duration;

/// Source URL reported by the weatherapi.com-backed tools.
pub const WEATHERAPI_SOURCE: &str = "https://www.weatherapi.com/";

/// Build the HTTP client shared by the retrievers.
pub fn http_client(timeout: Duration, user_agent: &str) -> percepto_core::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| percepto_core::PerceptoError::Config(format!("failed to build HTTP client: {e}")))
}
