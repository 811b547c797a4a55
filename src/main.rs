//! # Gaucho CLI (`gaucho`)
//!
//! Runs the course advisor API server, and exposes the same pipelines for
//! one-off use from a shell.
//!
//! ## Usage
//!
//! ```bash
//! gaucho --config ./config/gaucho.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gaucho serve` | Start the HTTP API server |
//! | `gaucho transcript <file.pdf>` | Print completed and available courses for a transcript |
//! | `gaucho ask "<query>"` | Answer a question from the grade-distribution index |
//! | `gaucho catalog` | Load the course catalog and print a summary |
//!
//! API keys (`OPENAI_API_KEY`, `ARYN_API_KEY`, `PINECONE_API_KEY`,
//! `ANTHROPIC_API_KEY`) are read from the environment or a `.env` file.
//! Logs go to stderr and are filtered with `RUST_LOG` (default `info`).

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use gauchoclass::catalog::Catalog;
use gauchoclass::config;
use gauchoclass::server::{self, AppState};

/// Gaucho course advisor: transcript analysis and course Q&A.
#[derive(Parser)]
#[command(name = "gaucho", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/gaucho.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server on `[server].bind`.
    Serve,

    /// Run a transcript PDF through the advisor and print the report as JSON.
    Transcript {
        /// Path to the transcript PDF.
        file: PathBuf,
    },

    /// Ask a question about course grade distributions.
    Ask {
        /// The question text.
        query: String,
    },

    /// Load and validate the course catalog.
    Catalog,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Transcript { file } => {
            let pdf = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let state = AppState::from_config(&cfg)?;
            let report = state.advisor.analyze(pdf).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Ask { query } => {
            if query.trim().is_empty() {
                anyhow::bail!("Query is required");
            }
            let state = AppState::from_config(&cfg)?;
            println!("{}", state.chat.answer(&query).await?);
        }
        Commands::Catalog => {
            let catalog = Catalog::load(&cfg.catalog.path)?;
            println!("Catalog: {}", cfg.catalog.path.display());
            println!("  courses:     {}", catalog.len());
            println!("  departments: {}", catalog.departments().len());
            if catalog.duplicates_dropped() > 0 {
                println!(
                    "  warning: {} duplicate course codes ignored",
                    catalog.duplicates_dropped()
                );
            }
        }
    }

    Ok(())
}
