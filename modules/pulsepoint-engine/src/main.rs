use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pulsepoint_common::Config;
use pulsepoint_engine::{EngineSettings, Orchestrator, RunGuard};
use pulsepoint_sources::SourceCatalog;
use pulsepoint_store::PgStore;
use pulsepoint_summarizer::GeminiSummarizer;

#[derive(Parser)]
#[command(name = "pulsepoint", about = "Open-source intelligence completion engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new topic from a previously-unused tag and populate it.
    Discover,
    /// Top up insufficient sources for incomplete topics.
    Complete,
    /// Recount a topic's progress from its persisted results.
    Reconcile { topic: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pulsepoint=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let store = PgStore::connect(&config.database_url).await?;
    store.migrate().await?;

    let catalog = SourceCatalog::standard(&config);
    let summarizer = Arc::new(GeminiSummarizer::new(&config.gemini_api_key));
    let orchestrator = Orchestrator::new(
        Arc::new(store),
        catalog,
        summarizer,
        RunGuard::new(),
        EngineSettings::from_config(&config),
    );

    match cli.command {
        Command::Discover => {
            orchestrator.run_discovery_pass().await;
        }
        Command::Complete => {
            orchestrator.run_completion_pass().await;
        }
        Command::Reconcile { topic } => match orchestrator.reconcile_topic(&topic).await? {
            Some(progress) => info!(
                complete = progress.complete,
                "Reconciliation complete: {:?}", progress.satisfied
            ),
            None => info!(topic = topic.as_str(), "No such topic"),
        },
    }

    Ok(())
}
