//! Classifies a language-model reply and resolves tool routes.

use percepto_core::RouteKind;
use percepto_tools::ToolSet;
use serde::Serialize;
use tracing::{debug, warn};

/// Reply used whenever a tool cannot answer.
pub const TOOL_FAILURE_REPLY: &str =
    "I'm sorry, I couldn't get that information right now. Please try again later.";

/// Tool routes in match priority. The first keyword found in the reply wins.
pub const TOOL_ROUTES: [RouteKind; 4] = [
    RouteKind::Weather,
    RouteKind::Location,
    RouteKind::DateTime,
    RouteKind::WebSearch,
];

/// The routed outcome of one reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDecision {
    pub kind: RouteKind,
    pub payload: String,
    pub source_url: Option<String>,
}

/// Strip `prefix` from the start of `text`, ignoring ASCII case.
fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &text[prefix.len()..])
}

/// Decide what kind of reply this is and what its payload would be.
///
/// For tool routes the payload is the reply itself; [`route`] replaces it
/// with the retriever's answer.
pub fn classify(reply: &str) -> (RouteKind, String) {
    let trimmed = reply.trim_start();
    if let Some(rest) = strip_prefix_ignore_case(trimmed, "question:") {
        return (RouteKind::Question, rest.trim().to_string());
    }
    if let Some(rest) = strip_prefix_ignore_case(trimmed, "statement:") {
        return (RouteKind::Statement, rest.trim().to_string());
    }

    let lower = reply.to_lowercase();
    for kind in TOOL_ROUTES {
        if let Some(keyword) = kind.tool_keyword()
            && lower.contains(keyword)
        {
            return (kind, reply.to_string());
        }
    }

    (RouteKind::Unknown, reply.to_string())
}

/// Classify `reply` and, for tool routes, ask the matching retriever to answer
/// the user's original `query`.
///
/// Tool failures never propagate: the payload becomes [`TOOL_FAILURE_REPLY`].
pub async fn route(reply: &str, query: &str, tools: &ToolSet) -> RouteDecision {
    let (kind, payload) = classify(reply);
    if !kind.is_tool() {
        debug!(route = %kind, "reply routed");
        return RouteDecision {
            kind,
            payload,
            source_url: None,
        };
    }

    let Some(retriever) = tools.get(kind) else {
        warn!(route = %kind, "tool requested but not connected");
        return failure(kind);
    };

    match retriever.retrieve(query).await {
        Ok(answer) if !answer.is_empty() => {
            debug!(route = %kind, tool = retriever.name(), "tool answered");
            RouteDecision {
                kind,
                source_url: answer.source_url(),
                payload: answer.content,
            }
        }
        Ok(_) => {
            warn!(route = %kind, tool = retriever.name(), "tool returned an empty answer");
            failure(kind)
        }
        Err(e) => {
            warn!(route = %kind, tool = retriever.name(), error = %e, "tool retrieval failed");
            failure(kind)
        }
    }
}

fn failure(kind: RouteKind) -> RouteDecision {
    RouteDecision {
        kind,
        payload: TOOL_FAILURE_REPLY.to_string(),
        source_url: None,
    }
}
