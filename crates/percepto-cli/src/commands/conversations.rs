use percepto_config::PerceptoConfig;
use percepto_core::PerceptoError;

use super::{open_stores, truncate_output};

pub(super) fn cmd_conversations(
    config: PerceptoConfig,
    id: Option<i64>,
    limit: usize,
    json: bool,
) -> percepto_core::Result<()> {
    let (_, transcripts) = open_stores(&config)?;

    let Some(id) = id else {
        let conversations = transcripts.list_conversations()?;
        if json {
            println!("{}", serde_json::to_string_pretty(&conversations)?);
            return Ok(());
        }
        if conversations.is_empty() {
            println!("No conversations yet.");
            return Ok(());
        }
        for c in &conversations {
            println!(
                "{:>5}  \x1b[90m{}\x1b[0m  {:<32}  {} message(s)",
                c.id,
                c.created_at.format("%Y-%m-%d %H:%M"),
                c.title.as_deref().unwrap_or("(untitled)"),
                c.message_count
            );
        }
        return Ok(());
    };

    let conversation = transcripts
        .conversation(id)?
        .ok_or_else(|| PerceptoError::Transcript(format!("conversation {id} not found")))?;
    let messages = transcripts.messages(id, limit)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    println!(
        "\x1b[1m{}\x1b[0m ({} message(s))",
        conversation.title.as_deref().unwrap_or("(untitled)"),
        conversation.message_count
    );
    println!("{}", "-".repeat(60));
    for m in &messages {
        println!("\x1b[90m{}\x1b[0m", m.timestamp.format("%Y-%m-%d %H:%M:%S"));
        println!("\x1b[36myou>\x1b[0m {}", m.user_input);
        println!("\x1b[32mpercepto>\x1b[0m {}", truncate_output(&m.ai_response, 500));
        println!();
    }
    Ok(())
}
