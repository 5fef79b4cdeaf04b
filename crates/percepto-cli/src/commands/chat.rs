use std::io::Write;
use tokio::io::AsyncBufReadExt;

use percepto_config::PerceptoConfig;
use percepto_runtime::{Assistant, AssistantContext, ConversationTarget, Interaction};

pub(super) async fn cmd_ask(
    config: PerceptoConfig,
    query: String,
    new: bool,
    json: bool,
) -> percepto_core::Result<()> {
    let assistant = Assistant::new(AssistantContext::from_config(config)?);
    let target = if new {
        ConversationTarget::New
    } else {
        ConversationTarget::Latest
    };

    let interaction = assistant.handle(&query, target).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&interaction)?);
    } else {
        print_answer(&interaction);
    }

    // Let consolidation and title generation finish before the process exits.
    assistant.wait_background().await;
    Ok(())
}

pub(super) async fn cmd_chat(
    config: PerceptoConfig,
    conversation: Option<i64>,
) -> percepto_core::Result<()> {
    let user_name = config.assistant.user_name.clone();
    let assistant = Assistant::new(AssistantContext::from_config(config)?);

    let mut target = match conversation {
        Some(id) => {
            if assistant.context().transcripts.conversation(id)?.is_none() {
                return Err(percepto_core::PerceptoError::Transcript(format!(
                    "conversation {id} not found"
                )));
            }
            ConversationTarget::Existing(id)
        }
        None => ConversationTarget::New,
    };

    println!("Percepto chat with {user_name}");
    println!("   Type '/new' to start a new conversation");
    println!("   Type '/quit' or Ctrl+D to exit");
    println!();

    let stdin = tokio::io::stdin();
    let reader = tokio::io::BufReader::new(stdin);
    let mut lines = reader.lines();

    loop {
        eprint!("\x1b[36myou>\x1b[0m ");
        std::io::stderr().flush().ok();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match trimmed {
            "/quit" | "/exit" | "exit" | "quit" => {
                println!("Goodbye!");
                break;
            }
            "/new" => {
                target = ConversationTarget::New;
                println!("\x1b[90m(new conversation)\x1b[0m");
                continue;
            }
            _ => {}
        }

        match assistant.handle(trimmed, target).await {
            Ok(interaction) => {
                target = ConversationTarget::Existing(interaction.conversation_id);
                print_answer(&interaction);
            }
            Err(e) => println!("\x1b[31mError: {e}\x1b[0m"),
        }
        println!();
    }

    assistant.wait_background().await;
    Ok(())
}

fn print_answer(interaction: &Interaction) {
    let response = &interaction.response;
    eprint!("\x1b[32mpercepto>\x1b[0m ");
    println!("{}", response.answer);
    if let Some(url) = &response.source_url {
        println!("\x1b[90m   Sources: {url}\x1b[0m");
    }
}
