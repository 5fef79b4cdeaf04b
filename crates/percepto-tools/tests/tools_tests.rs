#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use percepto_core::{PerceptoError, RouteKind, ToolRetriever};
    use percepto_tools::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn client() -> reqwest::Client {
        http_client(Duration::from_secs(5), "Percepto Test").unwrap()
    }

    const CURRENT_BODY: &str = r#"{
        "location": {"name": "Paris", "country": "France"},
        "current": {"temp_c": 18.0, "humidity": 60, "wind_kph": 11.2, "condition": {"text": "Partly cloudy"}}
    }"#;

    // ── Weather ────────────────────────────────────────────────

    mod weather {
        use super::*;

        #[tokio::test]
        async fn test_weather_for_named_place() {
            let mut server = mockito::Server::new_async().await;
            let mock = server
                .mock("GET", "/current.json")
                .match_query(Matcher::AllOf(vec![
                    Matcher::UrlEncoded("key".into(), "wk".into()),
                    Matcher::UrlEncoded("q".into(), "Paris".into()),
                ]))
                .with_status(200)
                .with_body(CURRENT_BODY)
                .create_async()
                .await;

            let tool = WeatherRetriever::new(client(), "wk".into(), "Cairo".into())
                .with_base_url(server.url())
                .with_ip_lookup(None);
            let answer = tool.retrieve("what's the weather in paris?").await.unwrap();

            mock.assert_async().await;
            assert_eq!(
                answer.content,
                "The current weather in Paris, France is Partly cloudy with a temperature of 18.0°C, humidity at 60%, and wind speed of 11.2 kph."
            );
            assert_eq!(answer.url, WEATHERAPI_SOURCE);
        }

        #[tokio::test]
        async fn test_weather_falls_back_to_ip_city() {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("GET", "/json/")
                .with_status(200)
                .with_body(r#"{"city": "Giza"}"#)
                .create_async()
                .await;
            let mock = server
                .mock("GET", "/current.json")
                .match_query(Matcher::UrlEncoded("q".into(), "Giza".into()))
                .with_status(200)
                .with_body(CURRENT_BODY)
                .create_async()
                .await;

            let tool = WeatherRetriever::new(client(), "wk".into(), "Cairo".into())
                .with_base_url(server.url())
                .with_ip_lookup(Some(format!("{}/json/", server.url())));
            tool.retrieve("is it going to rain").await.unwrap();
            mock.assert_async().await;
        }

        #[tokio::test]
        async fn test_weather_falls_back_to_default_city() {
            let mut server = mockito::Server::new_async().await;
            let mock = server
                .mock("GET", "/current.json")
                .match_query(Matcher::UrlEncoded("q".into(), "Cairo".into()))
                .with_status(200)
                .with_body(CURRENT_BODY)
                .create_async()
                .await;

            let tool = WeatherRetriever::new(client(), "wk".into(), "Cairo".into())
                .with_base_url(server.url())
                .with_ip_lookup(None);
            tool.retrieve("how hot is it now").await.unwrap();
            mock.assert_async().await;
        }

        #[tokio::test]
        async fn test_weather_http_error() {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("GET", "/current.json")
                .match_query(Matcher::Any)
                .with_status(401)
                .create_async()
                .await;

            let tool = WeatherRetriever::new(client(), "bad".into(), "Cairo".into())
                .with_base_url(server.url())
                .with_ip_lookup(None);
            let err = tool.retrieve("weather in paris").await.unwrap_err();
            assert!(matches!(err, PerceptoError::ToolRetrieval { ref tool, .. } if tool == "weather"));
        }
    }

    // ── Date / time ────────────────────────────────────────────

    mod datetime {
        use super::*;

        #[tokio::test]
        async fn test_time_in_named_place() {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("GET", "/timezone.json")
                .match_query(Matcher::UrlEncoded("q".into(), "Tokyo".into()))
                .with_status(200)
                .with_body(r#"{"location": {"name": "Tokyo", "country": "Japan", "localtime": "2024-05-01 21:15"}}"#)
                .create_async()
                .await;

            let tool = DateTimeRetriever::new(client(), "wk".into(), "Cairo".into()).with_base_url(server.url());
            let answer = tool.retrieve("what time is it in tokyo").await.unwrap();
            assert_eq!(answer.content, "In Tokyo, Japan, the time is 21:15.");
            assert_eq!(tool.kind(), RouteKind::DateTime);
        }

        #[tokio::test]
        async fn test_date_defaults_to_configured_city() {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("GET", "/timezone.json")
                .match_query(Matcher::UrlEncoded("q".into(), "Cairo".into()))
                .with_status(200)
                .with_body(r#"{"location": {"name": "Cairo", "country": "Egypt", "localtime": "2024-05-01 14:30"}}"#)
                .create_async()
                .await;

            let tool = DateTimeRetriever::new(client(), "wk".into(), "Cairo".into()).with_base_url(server.url());
            let answer = tool.retrieve("what's the date today").await.unwrap();
            assert_eq!(answer.content, "In Cairo, Egypt, the date is 2024-05-01.");
        }
    }

    // ── Location ───────────────────────────────────────────────

    mod location {
        use super::*;

        #[tokio::test]
        async fn test_location_reverse_geocodes_coordinates() {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("POST", "/geolocate")
                .match_query(Matcher::UrlEncoded("key".into(), "gk".into()))
                .with_status(200)
                .with_body(r#"{"location": {"lat": 30.0, "lng": 31.25}, "accuracy": 20}"#)
                .create_async()
                .await;
            let reverse = server
                .mock("GET", "/reverse")
                .match_query(Matcher::AllOf(vec![
                    Matcher::UrlEncoded("lat".into(), "30".into()),
                    Matcher::UrlEncoded("lon".into(), "31.25".into()),
                    Matcher::UrlEncoded("format".into(), "json".into()),
                ]))
                .match_header("user-agent", "Percepto Test")
                .with_status(200)
                .with_body(r#"{"display_name": "Tahrir Square, Cairo, Egypt"}"#)
                .create_async()
                .await;

            let tool = LocationRetriever::new(client(), "gk".into()).with_endpoints(
                format!("{}/geolocate", server.url()),
                format!("{}/reverse", server.url()),
            );
            let answer = tool.retrieve("where am i").await.unwrap();
            reverse.assert_async().await;
            assert_eq!(answer.content, "Based on your location, you are at Tahrir Square, Cairo, Egypt.");
            assert_eq!(answer.source_url(), None);
        }

        #[tokio::test]
        async fn test_location_geolocation_failure() {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("POST", "/geolocate")
                .match_query(Matcher::Any)
                .with_status(403)
                .create_async()
                .await;

            let tool = LocationRetriever::new(client(), "gk".into()).with_endpoints(
                format!("{}/geolocate", server.url()),
                format!("{}/reverse", server.url()),
            );
            assert!(tool.retrieve("where am i").await.is_err());
        }
    }

    // ── Web search ─────────────────────────────────────────────

    mod web_search {
        use super::*;

        #[tokio::test]
        async fn test_search_merges_top_three() {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("GET", "/search")
                .match_query(Matcher::AllOf(vec![
                    Matcher::UrlEncoded("q".into(), "rust language".into()),
                    Matcher::UrlEncoded("api_key".into(), "sk".into()),
                ]))
                .with_status(200)
                .with_body(
                    r#"{"organic_results": [
                        {"snippet": "Rust is fast. It is safe. It is fun.", "link": "https://a.example"},
                        {"snippet": "Memory safety", "link": "https://b.example"},
                        {"snippet": "Third. Result.", "link": "https://c.example"},
                        {"snippet": "Ignored", "link": "https://d.example"}
                    ]}"#,
                )
                .create_async()
                .await;

            let tool = WebSearchRetriever::new(client(), "sk".into()).with_base_url(server.url());
            let answer = tool.retrieve("rust language").await.unwrap();
            assert_eq!(
                answer.content,
                "I have searched the web and found the following: Rust is fast. It is safe. Memory safety Third. Result."
            );
            assert_eq!(answer.url, "https://a.example, https://b.example, https://c.example");
        }

        #[tokio::test]
        async fn test_search_without_results_is_error() {
            let mut server = mockito::Server::new_async().await;
            server
                .mock("GET", "/search")
                .match_query(Matcher::Any)
                .with_status(200)
                .with_body(r#"{"organic_results": []}"#)
                .create_async()
                .await;

            let tool = WebSearchRetriever::new(client(), "sk".into()).with_base_url(server.url());
            assert!(tool.retrieve("nothing").await.is_err());
        }
    }

    // ── ToolSet / mock ─────────────────────────────────────────

    mod toolset {
        use super::*;

        #[test]
        fn test_from_config_connects_only_keyed_tools() {
            let mut config = percepto_config::PerceptoConfig::default();
            config.services.weather_api_key = Some("wk".into());
            let set = ToolSet::from_config(&config).unwrap();
            assert_eq!(set.kinds(), vec![RouteKind::DateTime, RouteKind::Weather]);
            assert!(!set.is_connected(RouteKind::WebSearch));
            assert!(!set.is_connected(RouteKind::Location));
        }

        #[test]
        fn test_register_replaces_same_kind() {
            let set = ToolSet::new()
                .with(Arc::new(MockRetriever::answering(RouteKind::Weather, "a", "")))
                .with(Arc::new(MockRetriever::answering(RouteKind::Weather, "b", "")));
            assert_eq!(set.len(), 1);
        }

        #[tokio::test]
        async fn test_mock_records_queries() {
            let mock = Arc::new(MockRetriever::failing(RouteKind::Location, "offline"));
            let set = ToolSet::new().with(mock.clone());
            let tool = set.get(RouteKind::Location).unwrap();
            assert!(tool.retrieve("where am i").await.is_err());
            assert_eq!(mock.queries(), vec!["where am i"]);
        }
    }
}
