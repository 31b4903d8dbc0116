//! `folio`: run the writer → reviewer → editor workflow over a book and
//! query what it produced.

mod app;
mod config;
mod run;

use app::App;
use clap::{Parser, Subcommand};
use config::FolioConfig;
use folio_memory::Metadata;
use folio_orchestrator::WorkflowOptions;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "folio", about = "Folio: AI book transformation pipeline")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "folio.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire a book and run it through the agent chain
    Run {
        /// URL of the first chapter
        source: String,
        /// Number of chapters to acquire
        #[arg(long, default_value_t = 1)]
        chapters: usize,
        /// Wait for a human review after each AI pass
        #[arg(long)]
        human_in_loop: bool,
        /// Route stdin lines through the voice command handler
        #[arg(long)]
        voice: bool,
        /// Score passes without updating the value table
        #[arg(long)]
        no_learning: bool,
    },
    /// Similarity search over stored chapters
    Search {
        query: String,
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
        /// Metadata filter, repeatable
        #[arg(long = "filter", value_name = "KEY=VALUE", value_parser = parse_filter)]
        filters: Vec<(String, serde_json::Value)>,
    },
    /// Reward, content and processing statistics
    Stats,
}

/// `key=value`. The value is read as JSON when it parses (numbers, booleans),
/// else taken as a string.
fn parse_filter(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty filter key in '{raw}'"));
    }
    let value = value.trim();
    let value = serde_json::from_str(value)
        .ok()
        .filter(|v: &serde_json::Value| !v.is_object() && !v.is_array())
        .unwrap_or_else(|| serde_json::Value::from(value));
    Ok((key.to_string(), value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = FolioConfig::load(&cli.config).await?;
    info!(
        config = %cli.config.display(),
        data_dir = %config.data_dir.display(),
        "Configuration loaded"
    );
    let app = App::build(config).await?;

    match cli.command {
        Commands::Run {
            source,
            chapters,
            human_in_loop,
            voice,
            no_learning,
        } => {
            let options = WorkflowOptions {
                chapter_count: chapters,
                human_in_loop,
                voice_enabled: voice,
                learning_enabled: !no_learning,
            };
            run::run(&app, &source, options).await?;
        }
        Commands::Search {
            query,
            limit,
            filters,
        } => {
            let filters: Metadata = filters.into_iter().collect();
            let results = app
                .orchestrator
                .search_content(&query, &filters, limit)
                .await?;
            if results.chapters.is_empty() {
                println!("No matching chapters.");
            } else {
                for hit in &results.chapters {
                    let title = hit
                        .metadata
                        .get("title")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or("untitled");
                    let preview: String = hit.content.chars().take(80).collect();
                    println!("{:.3}  {}  {}", hit.distance, title, hit.id);
                    println!("       {preview}");
                }
                println!(
                    "\n{} result(s), relevance {:.3}",
                    results.chapters.len(),
                    results.relevance_score
                );
            }
        }
        Commands::Stats => {
            let metrics = app.orchestrator.performance_metrics().await?;
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }
    }

    Ok(())
}
