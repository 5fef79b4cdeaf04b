use parking_lot::Mutex;
use percepto_core::{ConversationId, MessageId, Result};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::consolidation::ConsolidationEngine;
use crate::context::AssistantContext;
use crate::pipeline::{QueryPipeline, QueryResponse};
use crate::prompt::{self, MAX_TITLE_CHARS};

/// Which conversation an interaction is saved into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationTarget {
    /// The most recent conversation, or a new one if none exists.
    #[default]
    Latest,
    New,
    Existing(ConversationId),
}

/// One answered and saved user turn.
#[derive(Debug, Clone, Serialize)]
pub struct Interaction {
    pub response: QueryResponse,
    pub conversation_id: ConversationId,
    pub message_id: MessageId,
    pub new_conversation: bool,
    pub interaction_count: u64,
}

/// Answers queries, records transcripts and schedules background upkeep.
pub struct Assistant {
    ctx: AssistantContext,
    pipeline: QueryPipeline,
    consolidation: Arc<ConsolidationEngine>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl Assistant {
    pub fn new(ctx: AssistantContext) -> Self {
        let consolidation = Arc::new(ConsolidationEngine::new(ctx.clone()));
        Self::with_consolidation(ctx, consolidation)
    }

    pub fn with_consolidation(ctx: AssistantContext, consolidation: Arc<ConsolidationEngine>) -> Self {
        Self {
            pipeline: QueryPipeline::new(ctx.clone()),
            ctx,
            consolidation,
            background: Mutex::new(Vec::new()),
        }
    }

    pub fn context(&self) -> &AssistantContext {
        &self.ctx
    }

    pub fn consolidation(&self) -> Arc<ConsolidationEngine> {
        Arc::clone(&self.consolidation)
    }

    /// Answer `query`, save it to the transcript, then kick off consolidation
    /// and, for a new conversation, title generation in the background.
    pub async fn handle(&self, query: &str, target: ConversationTarget) -> Result<Interaction> {
        let response = self.pipeline.process_query(query).await?;

        let transcripts = &self.ctx.transcripts;
        let conversation = match target {
            ConversationTarget::Latest => None,
            ConversationTarget::New => Some(transcripts.create_conversation()?),
            ConversationTarget::Existing(id) => Some(id),
        };
        let saved = transcripts.save_message(
            query,
            &response.answer,
            response.source_url.as_deref(),
            conversation,
        )?;
        let new_conversation = saved.new_conversation || target == ConversationTarget::New;
        info!(
            conversation_id = saved.conversation_id,
            interaction_count = saved.interaction_count,
            route = %response.route_kind,
            "interaction saved"
        );

        let engine = self.consolidation();
        let count = saved.interaction_count;
        let threshold = self.ctx.config.memory.consolidation_threshold;
        self.spawn(async move {
            let outcome = engine.trigger(count, threshold).await;
            debug!(?outcome, "consolidation check finished");
        });

        if new_conversation {
            let ctx = self.ctx.clone();
            let conversation_id = saved.conversation_id;
            let (user_input, ai_response) = (query.to_string(), response.answer.clone());
            self.spawn(async move {
                if let Err(e) = generate_title(&ctx, conversation_id, &user_input, &ai_response).await {
                    warn!(conversation_id, error = %e, "title generation failed");
                }
            });
        }

        Ok(Interaction {
            response,
            conversation_id: saved.conversation_id,
            message_id: saved.message_id,
            new_conversation,
            interaction_count: saved.interaction_count,
        })
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut background = self.background.lock();
        background.retain(|h| !h.is_finished());
        background.push(tokio::spawn(task));
    }

    /// Wait for every background task spawned so far.
    pub async fn wait_background(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.background.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task panicked");
            }
        }
    }
}

/// Ask the language model for a conversation title and store it.
pub async fn generate_title(
    ctx: &AssistantContext,
    conversation_id: ConversationId,
    user_input: &str,
    ai_response: &str,
) -> Result<Option<String>> {
    let request = ctx.request(prompt::title_prompt(user_input, ai_response));
    let response = ctx.llm.complete(&request).await?;
    let Some(title) = clean_title(response.text()) else {
        return Ok(None);
    };
    ctx.transcripts.update_title(conversation_id, &title)?;
    debug!(conversation_id, title = %title, "conversation titled");
    Ok(Some(title))
}

fn clean_title(raw: &str) -> Option<String> {
    let line = raw.lines().find(|l| !l.trim().is_empty())?;
    let title: String = line
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'')
        .trim()
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect();
    let title = title.trim_end().to_string();
    (!title.is_empty()).then_some(title)
}
