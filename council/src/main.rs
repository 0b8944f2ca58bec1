//! Council CLI: put one question before the council.
//!
//! ```bash
//! # Full report once the turn completes
//! OPENROUTER_API_KEY=... council "Should we rewrite the service in Rust?"
//!
//! # Stream stage events as JSON lines
//! council --stream "Should we rewrite the service in Rust?"
//!
//! # Override personas and models from a TOML file
//! council --config council.toml "..."
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;

use council::storage::ConversationStore;
use council::{Council, CouncilConfig, InMemoryStore, OpenRouterClient, TurnOutcome};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The question to put before the council
    question: String,

    /// Stream stage events as JSON lines instead of printing a final report
    #[arg(long, default_value_t = false)]
    stream: bool,

    /// Path to a TOML file overriding personas, models, and timeouts
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => CouncilConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => CouncilConfig::default(),
    }
    .with_env_overrides();

    let client = Arc::new(OpenRouterClient::from_env()?);
    let council = Council::new(config, client);

    if args.stream {
        stream_turn(&council, &args.question).await
    } else {
        let outcome = council.run_turn(&args.question).await;
        print_report(&outcome);
        Ok(())
    }
}

async fn stream_turn(council: &Council, question: &str) -> Result<()> {
    let store = InMemoryStore::new();
    let conversation_id = uuid::Uuid::new_v4().to_string();
    store.create_conversation(&conversation_id).await?;

    let (tx, mut rx) = mpsc::channel(32);
    let turn = council.run_conversation_turn(&store, &conversation_id, question, tx);
    let printer = async {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => eprintln!("failed to encode event: {e}"),
            }
        }
    };
    tokio::join!(turn, printer);
    Ok(())
}

fn print_report(outcome: &TurnOutcome) {
    println!("## Council\n");
    for persona in &outcome.personas {
        println!("- {} {} ({})", persona.icon, persona.name, persona.role);
    }

    println!("\n## Responses\n");
    for result in &outcome.stage1 {
        println!("### {} {}\n", result.persona_icon, result.persona_name);
        println!("{}\n", result.response);
    }

    if !outcome.metadata.aggregate_rankings.is_empty() {
        println!("## Peer ranking (lower is better)\n");
        for entry in &outcome.metadata.aggregate_rankings {
            println!(
                "- {}: {:.2} across {} rankings",
                entry.persona_name, entry.average_rank, entry.rankings_count
            );
        }
        println!();
    }

    println!("## Final answer ({})\n", outcome.stage3.model);
    println!("{}", outcome.stage3.response);
}
