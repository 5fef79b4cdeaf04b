use chrono::{DateTime, Utc};
use percepto_core::{Result, RouteKind};
use percepto_llm::embed_one;
use percepto_memory::{MemoryKind, MemoryRecord, RecordFilter};
use serde::Serialize;
use tracing::{debug, info};

use crate::context::AssistantContext;
use crate::{prompt, router};

/// The final answer to one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub route_kind: RouteKind,
    pub source_url: Option<String>,
}

/// Embed, retrieve, prompt, complete, route, remember.
pub struct QueryPipeline {
    ctx: AssistantContext,
}

impl QueryPipeline {
    pub fn new(ctx: AssistantContext) -> Self {
        Self { ctx }
    }

    pub async fn process_query(&self, query: &str) -> Result<QueryResponse> {
        let ctx = &self.ctx;

        let embedding = embed_one(ctx.embedder.as_ref(), query).await?;
        let context = ctx
            .memory
            .similarity_search(&embedding, ctx.config.memory.top_k, RecordFilter::Any)?;
        debug!(retrieved = context.len(), "memory context retrieved");

        let prompt = prompt::query_prompt(&ctx.config.assistant.user_name, &context, query);
        let response = ctx.llm.complete(&ctx.request(prompt)).await?;

        let decision = router::route(response.text(), query, &ctx.tools).await;
        info!(route = %decision.kind, "query routed");

        if decision.kind == RouteKind::Statement {
            self.remember_statement(query, Utc::now()).await?;
        }

        Ok(QueryResponse {
            answer: decision.payload,
            route_kind: decision.kind,
            source_url: decision.source_url,
        })
    }

    /// Store a statement the user made as a conversation record.
    async fn remember_statement(&self, query: &str, at: DateTime<Utc>) -> Result<()> {
        let content = statement_content(&self.ctx.config.assistant.user_name, query, at);
        let embedding = embed_one(self.ctx.embedder.as_ref(), &content).await?;
        self.ctx
            .memory
            .insert(&MemoryRecord::new(content, embedding, MemoryKind::Conversation))?;
        debug!("statement remembered");
        Ok(())
    }
}

pub(crate) fn statement_content(user_name: &str, query: &str, at: DateTime<Utc>) -> String {
    format!(
        "{user_name}: {query}\n\nStatement Date: {}",
        at.format("%d %B %Y")
    )
}
