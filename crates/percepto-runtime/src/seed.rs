use percepto_core::Result;
use percepto_llm::embed_one;
use percepto_memory::{MemoryKind, MemoryRecord};
use serde::Serialize;
use tracing::{debug, info};

use crate::context::AssistantContext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Store each fact as a fact record, skipping blanks and facts already present.
pub async fn seed_facts(ctx: &AssistantContext, facts: &[String]) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    for fact in facts {
        let fact = fact.trim();
        if fact.is_empty() || ctx.memory.contains(fact, MemoryKind::Fact)? {
            debug!(fact, "fact already known, skipping");
            report.skipped += 1;
            continue;
        }
        let embedding = embed_one(ctx.embedder.as_ref(), fact).await?;
        ctx.memory
            .insert(&MemoryRecord::new(fact, embedding, MemoryKind::Fact))?;
        report.inserted += 1;
    }
    info!(inserted = report.inserted, skipped = report.skipped, "facts seeded");
    Ok(report)
}
