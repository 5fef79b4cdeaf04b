use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use percepto_config::{ConfigLoader, PerceptoConfig, WarningSeverity};
use percepto_core::PerceptoError;
use percepto_memory::{InteractionCounter, MemoryKind, MemoryStore, RecordFilter, TranscriptStore};
use percepto_tools::ToolSet;

mod chat;
mod conversations;
mod memory;

/// Percepto: a personal assistant with self-consolidating memory
#[derive(Parser)]
#[command(name = "percepto", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to percepto.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single query and save it to the transcript
    Ask {
        /// The query text
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        /// Start a new conversation instead of continuing the latest one
        #[arg(long)]
        new: bool,
        /// Output the interaction as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive chat in the terminal
    Chat {
        /// Continue a specific conversation
        #[arg(long)]
        conversation: Option<i64>,
    },
    /// Store facts in memory (defaults to `assistant.facts` from the config)
    Seed {
        /// Facts to store instead of the configured ones
        facts: Vec<String>,
    },
    /// Cluster and summarize memory, replacing raw records with summaries
    Consolidate {
        /// Run even if the interaction threshold has not been reached
        #[arg(long)]
        force: bool,
    },
    /// Inspect memory records
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
    /// List conversations, or show the messages of one
    Conversations {
        /// Conversation to show
        id: Option<i64>,
        /// Maximum number of messages to show
        #[arg(short = 'n', long, default_value = "100")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show current configuration (API keys masked)
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show memory, transcript and tool status
    Status,
}

#[derive(Subcommand)]
enum MemoryAction {
    /// List records, oldest first
    List {
        /// Only records of this kind: fact, conversation, summary
        #[arg(short, long)]
        kind: Option<String>,
    },
    /// Find the records most similar to a query
    Search {
        query: String,
        /// Number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
}

impl Cli {
    pub async fn run(self) -> percepto_core::Result<()> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // Resolve log level: --verbose > --quiet > --log-level > config default
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level.as_deref().unwrap_or(&config.logging.level)
        };
        init_tracing(log_level, &config.logging.format);
        debug!(config = %config_loader.path().display(), "configuration loaded");

        match self.command {
            Commands::Ask { query, new, json } => chat::cmd_ask(config, query.join(" "), new, json).await,
            Commands::Chat { conversation } => chat::cmd_chat(config, conversation).await,
            Commands::Seed { facts } => memory::cmd_seed(config, facts).await,
            Commands::Consolidate { force } => memory::cmd_consolidate(config, force).await,
            Commands::Memory { action } => match action {
                MemoryAction::List { kind } => memory::cmd_list(config, kind),
                MemoryAction::Search { query, top_k } => memory::cmd_search(config, query, top_k).await,
            },
            Commands::Conversations { id, limit, json } => {
                conversations::cmd_conversations(config, id, limit, json)
            }
            Commands::Config { json } => Self::cmd_config(config, config_loader.path(), json),
            Commands::Status => Self::cmd_status(config, config_loader.path()),
        }
    }

    fn cmd_config(config: PerceptoConfig, path: &std::path::Path, json: bool) -> percepto_core::Result<()> {
        let config = masked(config);
        if json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!("# {}", path.display());
            println!(
                "{}",
                toml::to_string_pretty(&config).map_err(|e| PerceptoError::Config(e.to_string()))?
            );
        }
        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    eprintln!("{w}");
                }
            }
            Err(e) => eprintln!("{e}"),
        }
        Ok(())
    }

    fn cmd_status(config: PerceptoConfig, path: &std::path::Path) -> percepto_core::Result<()> {
        let db_path = config.memory.resolved_db_path();
        println!("Percepto v{}", env!("CARGO_PKG_VERSION"));
        println!("   Config:     {}", path.display());
        println!("   Database:   {}", db_path.display());
        println!("   Model:      {}", config.assistant.model);
        println!(
            "   Embeddings: {} ({}, {} dims)",
            config.embedding.provider, config.embedding.model, config.embedding.dimensions
        );

        let (memory, transcripts) = open_stores(&config)?;
        println!();
        println!("Memory ({})", memory.collection());
        for kind in [MemoryKind::Fact, MemoryKind::Conversation, MemoryKind::Summary] {
            println!("   {:<13} {}", kind.as_str(), memory.count(RecordFilter::Only(kind))?);
        }

        println!();
        println!(
            "Interactions since last consolidation: {} / {}",
            transcripts.count()?,
            config.memory.consolidation_threshold
        );
        println!("Conversations: {}", transcripts.list_conversations()?.len());

        let tools = ToolSet::from_config(&config)?;
        let connected: Vec<&str> = tools.kinds().iter().map(|k| k.as_str()).collect();
        println!(
            "Tools: {}",
            if connected.is_empty() {
                "none connected".to_string()
            } else {
                connected.join(", ")
            }
        );

        if let Ok(warnings) = config.validate() {
            let issues = warnings
                .iter()
                .filter(|w| w.severity != WarningSeverity::Info)
                .count();
            if issues > 0 {
                println!();
                println!("{issues} configuration warning(s); run `percepto config` for details");
            }
        }
        Ok(())
    }
}

fn init_tracing(log_level: &str, format: &str) {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level))
    };
    match format {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .init(),
        "compact" => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_target(false)
            .with_writer(std::io::stderr)
            .init(),
    }
}

/// Open the memory and transcript stores without connecting any provider.
fn open_stores(config: &PerceptoConfig) -> percepto_core::Result<(MemoryStore, TranscriptStore)> {
    let db_path = config.memory.resolved_db_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok((
        MemoryStore::open(&db_path, &config.memory.collection)?,
        TranscriptStore::open(&db_path)?,
    ))
}

fn masked(mut config: PerceptoConfig) -> PerceptoConfig {
    let services = &mut config.services;
    for key in [
        &mut services.openai_api_key,
        &mut services.weather_api_key,
        &mut services.google_api_key,
        &mut services.serpapi_api_key,
    ] {
        if key.is_some() {
            *key = Some("********".into());
        }
    }
    config
}

/// Truncate a string to `max` characters on one line, appending "..." if truncated.
fn truncate_output(s: &str, max: usize) -> String {
    let flat = s.replace('\n', " ");
    if flat.chars().count() <= max {
        flat
    } else {
        format!("{}...", flat.chars().take(max).collect::<String>())
    }
}
