use percepto_config::PerceptoConfig;
use percepto_core::PerceptoError;
use percepto_llm::embed_one;
use percepto_memory::{InteractionCounter, MemoryKind, RecordFilter};
use percepto_runtime::{AssistantContext, ConsolidationEngine, ConsolidationOutcome, seed_facts};

use super::{open_stores, truncate_output};

pub(super) async fn cmd_seed(config: PerceptoConfig, facts: Vec<String>) -> percepto_core::Result<()> {
    let facts = if facts.is_empty() {
        config.assistant.facts.clone()
    } else {
        facts
    };
    if facts.is_empty() {
        println!("No facts to seed. Add them to [assistant] facts in percepto.toml or pass them as arguments.");
        return Ok(());
    }

    let ctx = AssistantContext::from_config(config)?;
    let report = seed_facts(&ctx, &facts).await?;
    println!(
        "Seeded {} fact(s), skipped {} already known.",
        report.inserted, report.skipped
    );
    Ok(())
}

pub(super) async fn cmd_consolidate(config: PerceptoConfig, force: bool) -> percepto_core::Result<()> {
    let threshold = config.memory.consolidation_threshold;
    let ctx = AssistantContext::from_config(config)?;
    let count = ctx.transcripts.count()?;
    let engine = ConsolidationEngine::new(ctx);

    let outcome = if force {
        engine.consolidate().await
    } else {
        engine.trigger(count, threshold).await
    };

    match outcome {
        ConsolidationOutcome::BelowThreshold => {
            println!("{count} of {threshold} interactions so far; nothing to do (use --force to run anyway).")
        }
        ConsolidationOutcome::AlreadyRunning => println!("A consolidation is already running."),
        ConsolidationOutcome::NothingToSummarize => println!("No conversations to summarize."),
        ConsolidationOutcome::Rebuilt(report) => println!(
            "Summarized {} record(s) in {} cluster(s); memory now holds {} summaries.",
            report.records_summarized,
            report.clusters,
            report.summaries_kept + report.summaries_added
        ),
        ConsolidationOutcome::Failed(reason) => return Err(PerceptoError::Consolidation(reason)),
    }
    Ok(())
}

pub(super) fn cmd_list(config: PerceptoConfig, kind: Option<String>) -> percepto_core::Result<()> {
    let filter = match kind.as_deref() {
        None => RecordFilter::Any,
        Some(raw) => RecordFilter::Only(MemoryKind::parse(raw).ok_or_else(|| {
            PerceptoError::Config(format!(
                "unknown memory kind '{raw}' (expected fact, conversation or summary)"
            ))
        })?),
    };

    let (memory, _) = open_stores(&config)?;
    let records = memory.bulk_fetch(filter)?;
    if records.is_empty() {
        println!("No memory records.");
        return Ok(());
    }

    for record in &records {
        println!(
            "\x1b[90m{}\x1b[0m  {:<12}  {}",
            record.created_at.format("%Y-%m-%d %H:%M"),
            record.kind.as_str(),
            truncate_output(&record.content, 100)
        );
    }
    println!("{} record(s)", records.len());
    Ok(())
}

pub(super) async fn cmd_search(
    config: PerceptoConfig,
    query: String,
    top_k: Option<usize>,
) -> percepto_core::Result<()> {
    let k = top_k.unwrap_or(config.memory.top_k);
    let ctx = AssistantContext::from_config(config)?;
    let embedding = embed_one(ctx.embedder.as_ref(), &query).await?;
    let results = ctx.memory.similarity_search(&embedding, k, RecordFilter::Any)?;
    if results.is_empty() {
        println!("No memory records.");
        return Ok(());
    }

    for scored in &results {
        println!(
            "{:.3}  {:<12}  {}",
            scored.score,
            scored.record.kind.as_str(),
            truncate_output(&scored.record.content, 100)
        );
    }
    Ok(())
}
