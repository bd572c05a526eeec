//! `deckard`: serve the query API or build the stores it reads.
//!
//! ```bash
//! deckard serve
//! deckard build library
//! deckard build-qa
//! deckard query library "When is the library open?"
//! ```

use std::sync::Arc;

use ai_llm_service::LlmServiceProfiles;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use contextor::{DeckardConfig, Registry, config_path, data_dir};
use rag_store::IndicatifProgress;
use tracing::warn;

#[derive(Parser)]
#[command(name = "deckard", version, about = "Retrieval-augmented question answering service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API (default).
    Serve,

    /// Rebuild the vector, context and keyword stores of one or all pipelines.
    Build {
        /// Pipeline name; every pipeline when omitted.
        pipeline: Option<String>,
    },

    /// Rebuild the curated QA store.
    BuildQa,

    /// Answer one query through the full pipeline and print the result.
    Query {
        pipeline: String,
        query: String,
        /// Print the whole response as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the environment may be set by the caller.
    dotenvy::dotenv().ok();
    ai_llm_service::telemetry::init("info");

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => api::start().await.context("server stopped with an error")?,
        Command::Build { pipeline } => build(pipeline.as_deref()).await?,
        Command::BuildQa => build_qa().await?,
        Command::Query {
            pipeline,
            query,
            json,
        } => run_query(&pipeline, &query, json).await?,
    }
    Ok(())
}

/// Hashing encoders need no LLM endpoint, so profiles are optional here.
fn registry() -> Registry {
    let llm = match LlmServiceProfiles::from_env() {
        Ok(p) => Some(Arc::new(p)),
        Err(e) => {
            warn!(error = %e, "LLM profiles unavailable; only hashing encoders will work");
            None
        }
    };
    Registry::new(data_dir(), llm)
}

async fn build(only: Option<&str>) -> Result<()> {
    let path = config_path();
    let config = DeckardConfig::load(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    let registry = registry();

    let names = match only {
        Some(name) => vec![config.pipeline(name)?.name.clone()],
        None => config.pipeline_names(),
    };
    for name in names {
        let pipeline = config.pipeline(&name)?;
        println!("{} {}", "building".bold(), name.cyan());
        let report = registry
            .rag_builder(pipeline)
            .await?
            .build(&IndicatifProgress::bar(0))
            .await
            .with_context(|| format!("building pipeline {name}"))?;
        println!(
            "{} {name}: {} documents, {} chunks, {} ignored",
            "done".green().bold(),
            report.processed,
            report.chunks,
            report.ignored
        );
    }
    Ok(())
}

async fn build_qa() -> Result<()> {
    let path = config_path();
    let config = DeckardConfig::load(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    let Some(qa) = config.qa.as_ref() else {
        println!("{}", "no qa section in the pipeline file".yellow());
        return Ok(());
    };

    let report = registry()
        .qa_builder(qa)?
        .build(&IndicatifProgress::bar(0))
        .await
        .context("building QA store")?;
    println!(
        "{} {}: {} phrasings stored, {} ignored",
        "done".green().bold(),
        qa.name,
        report.processed,
        report.ignored
    );
    Ok(())
}

async fn run_query(pipeline: &str, query: &str, json: bool) -> Result<()> {
    let state = api::core::app_state::AppState::from_env().await?;
    let resp =
        api::core::coordinator::run_query(&state, query, pipeline, Some("cli".into())).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&resp)?);
        return Ok(());
    }

    let verdict = if resp.is_answer {
        "answered".green().bold()
    } else {
        "not answered".red().bold()
    };
    println!("{verdict} {}", resp.id.dimmed());
    println!("{}", resp.response);
    for url in &resp.source_urls {
        println!("  {} {url}", "source".cyan());
    }
    if let Some(err) = &resp.error {
        println!("{} {err}", "error".red());
    }
    Ok(())
}
