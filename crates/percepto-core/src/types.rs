use serde::{Deserialize, Serialize};

/// Identifier of a conversation in the transcript store.
pub type ConversationId = i64;

/// Identifier of a saved message in the transcript store.
pub type MessageId = i64;

/// How a language-model reply was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    /// Direct answer to a question.
    Question,
    /// The user told the assistant something worth remembering.
    Statement,
    Weather,
    #[serde(rename = "datetime")]
    DateTime,
    Location,
    WebSearch,
    /// The reply matched no known format; passed through verbatim.
    Unknown,
}

impl RouteKind {
    /// The keyword a model emits to request this tool, if it is a tool route.
    pub fn tool_keyword(self) -> Option<&'static str> {
        match self {
            RouteKind::Weather => Some("use_weather_tool"),
            RouteKind::DateTime => Some("use_datetime_tool"),
            RouteKind::Location => Some("use_location_tool"),
            RouteKind::WebSearch => Some("use_web_search_tool"),
            RouteKind::Question | RouteKind::Statement | RouteKind::Unknown => None,
        }
    }

    /// Whether answering this route requires a tool retriever.
    pub fn is_tool(self) -> bool {
        self.tool_keyword().is_some()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RouteKind::Question => "question",
            RouteKind::Statement => "statement",
            RouteKind::Weather => "weather",
            RouteKind::DateTime => "datetime",
            RouteKind::Location => "location",
            RouteKind::WebSearch => "web_search",
            RouteKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for RouteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
