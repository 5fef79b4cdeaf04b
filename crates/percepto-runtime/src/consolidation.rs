//! Periodic memory consolidation.
//!
//! Once enough interactions have accumulated, every non-summary record is
//! clustered by similarity, each cluster is summarized by the language model,
//! and the live collection is rebuilt to hold only summaries: the previous
//! ones copied verbatim plus the new ones.

use parking_lot::Mutex;
use percepto_core::{PerceptoError, Result};
use percepto_llm::embed_one;
use percepto_memory::{InteractionCounter, MemoryKind, MemoryRecord, RecordFilter};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, error, info};

use crate::clustering::cluster_records;
use crate::context::AssistantContext;
use crate::prompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationState {
    Idle,
    Summarizing,
    Rebuilding,
}

/// What a successful rebuild did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsolidationReport {
    /// Fact and conversation records that were summarized and evicted.
    pub records_summarized: usize,
    pub clusters: usize,
    /// Earlier summaries carried over unchanged.
    pub summaries_kept: usize,
    pub summaries_added: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsolidationOutcome {
    BelowThreshold,
    AlreadyRunning,
    NothingToSummarize,
    Rebuilt(ConsolidationReport),
    Failed(String),
}

pub struct ConsolidationEngine {
    ctx: AssistantContext,
    counter: Arc<dyn InteractionCounter>,
    lock: TokioMutex<()>,
    state: Mutex<ConsolidationState>,
}

impl ConsolidationEngine {
    /// An engine resetting the context's transcript interaction counter.
    pub fn new(ctx: AssistantContext) -> Self {
        let counter = ctx.counter();
        Self::with_counter(ctx, counter)
    }

    pub fn with_counter(ctx: AssistantContext, counter: Arc<dyn InteractionCounter>) -> Self {
        Self {
            ctx,
            counter,
            lock: TokioMutex::new(()),
            state: Mutex::new(ConsolidationState::Idle),
        }
    }

    pub fn state(&self) -> ConsolidationState {
        *self.state.lock()
    }

    fn set_state(&self, state: ConsolidationState) {
        *self.state.lock() = state;
    }

    /// Consolidate if `counter_value` has reached `threshold`.
    pub async fn trigger(&self, counter_value: u64, threshold: u64) -> ConsolidationOutcome {
        if counter_value < threshold {
            debug!(counter_value, threshold, "consolidation not due");
            return ConsolidationOutcome::BelowThreshold;
        }
        self.consolidate().await
    }

    /// Consolidate now, regardless of the interaction count.
    pub async fn consolidate(&self) -> ConsolidationOutcome {
        let Ok(_guard) = self.lock.try_lock() else {
            info!("consolidation already running, skipping");
            return ConsolidationOutcome::AlreadyRunning;
        };

        let outcome = match self.run().await {
            Ok(Some(report)) => ConsolidationOutcome::Rebuilt(report),
            Ok(None) => ConsolidationOutcome::NothingToSummarize,
            Err(e) => {
                error!(error = %e, "consolidation failed, memory left unchanged");
                ConsolidationOutcome::Failed(e.to_string())
            }
        };
        self.set_state(ConsolidationState::Idle);
        outcome
    }

    async fn run(&self) -> Result<Option<ConsolidationReport>> {
        let memory = &self.ctx.memory;
        let user_name = &self.ctx.config.assistant.user_name;

        self.set_state(ConsolidationState::Summarizing);
        let watermark = memory.watermark()?;
        let records = memory.bulk_fetch(RecordFilter::Except(MemoryKind::Summary))?;
        if records.is_empty() {
            info!("no conversations to summarize");
            return Ok(None);
        }

        let clusters = cluster_records(&records, self.ctx.config.memory.cluster_threshold);
        info!(records = records.len(), clusters = clusters.len(), "clustering finished");

        let mut summaries = Vec::with_capacity(clusters.len());
        for cluster in &clusters {
            let request = self
                .ctx
                .request(prompt::summary_prompt(user_name, &cluster.text()));
            let response = self.ctx.llm.complete(&request).await?;
            let summary = response.text().trim();
            if summary.is_empty() {
                return Err(PerceptoError::Consolidation(
                    "language model returned an empty summary".into(),
                ));
            }
            summaries.push(summary.to_string());
        }
        info!(summaries = summaries.len(), "clusters summarized");

        self.set_state(ConsolidationState::Rebuilding);
        let mut fresh = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let embedding = embed_one(self.ctx.embedder.as_ref(), &summary).await?;
            fresh.push(MemoryRecord::new(summary, embedding, MemoryKind::Summary));
        }

        let kept = memory.bulk_fetch(RecordFilter::Only(MemoryKind::Summary))?;
        let mut shadow = memory.begin_shadow(watermark)?;
        shadow.copy_from(&kept)?;
        for record in &fresh {
            shadow.insert(record)?;
        }
        shadow.validate(kept.len() + fresh.len())?;
        shadow.commit()?;

        self.counter.reset()?;

        let report = ConsolidationReport {
            records_summarized: records.len(),
            clusters: clusters.len(),
            summaries_kept: kept.len(),
            summaries_added: fresh.len(),
        };
        info!(?report, "memory consolidated");
        Ok(Some(report))
    }
}
