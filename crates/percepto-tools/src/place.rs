//! Place-name extraction from free-form queries.

use regex::Regex;
use std::sync::LazyLock;

static WEATHER_PLACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:in|at|for)\s+([a-zA-Z\s]+)").expect("weather place pattern is valid")
});

static DATETIME_PLACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:date|time).*?\b(?:in|at|for)\s+([a-zA-Z\s]+)")
        .expect("datetime place pattern is valid")
});

const WEATHER_FILLER: &[&str] = &["it", "is", "today", "now"];
const DATETIME_FILLER: &[&str] = &["time", "date", "today", "now", "it", "is", "this"];

/// Place named in a weather query ("weather in paris" → "Paris").
pub fn weather_place(query: &str) -> Option<String> {
    let extracted = WEATHER_PLACE_RE.captures(query)?.get(1)?.as_str().trim();
    if extracted.len() <= 2 || WEATHER_FILLER.contains(&extracted.to_lowercase().as_str()) {
        return None;
    }
    Some(title_case(extracted))
}

/// Place named in a date/time query ("what time is it in tokyo" → "Tokyo").
pub fn datetime_place(query: &str) -> Option<String> {
    let extracted = DATETIME_PLACE_RE.captures(query)?.get(1)?.as_str().trim();
    if extracted.is_empty() || DATETIME_FILLER.contains(&extracted.to_lowercase().as_str()) {
        return None;
    }
    Some(title_case(extracted))
}

/// Capitalize the first letter of each word and lowercase the rest.
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
