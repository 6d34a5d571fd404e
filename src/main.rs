//! Search Relevance Evaluator CLI
//!
//! Runs queries against configured search sources, has the results judged,
//! and compares the sources.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use search_relevance_eval::{
    aggregate::{LabelSummary, RankedRow, compare, rank_runs, summarize},
    config::Config,
    judge::{JudgmentClient, Label},
    orchestrator::{EvaluationRun, FailurePolicy, Orchestrator},
    persistence::{dedup_paths, find_run_artifacts, load_run},
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Search Relevance Evaluator - compare search backends by judged relevance
#[derive(Parser)]
#[command(name = "search-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect, judge, and summarize results for every configured source
    Run {
        /// File with one query per line, or a JSON array of strings
        #[arg(short, long)]
        queries: PathBuf,

        /// Remove previous artifacts from the work directory first
        #[arg(long)]
        clear_work_dir: bool,

        /// Keep going when a source fails instead of aborting the run
        #[arg(long)]
        keep_going: bool,

        /// Write the comparison table as JSON (needs two or more sources)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print label counts for saved run artifacts
    Summary {
        /// Run artifacts (<source>_eval.json)
        #[arg(required = true)]
        artifacts: Vec<PathBuf>,
    },

    /// Compare saved run artifacts side by side
    Compare {
        /// Run artifacts (<source>_eval.json)
        artifacts: Vec<PathBuf>,

        /// Directory to search for run artifacts
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Output path for the comparison table JSON
        #[arg(short, long, default_value = "comparison.json")]
        output: PathBuf,
    },

    /// Test judgment service connection
    Test,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            queries,
            clear_work_dir,
            keep_going,
            output,
        } => cmd_run(cli.config, queries, clear_work_dir, keep_going, output).await,
        Commands::Summary { artifacts } => cmd_summary(artifacts),
        Commands::Compare {
            artifacts,
            dir,
            output,
        } => cmd_compare(artifacts, dir, output),
        Commands::Test => cmd_test(cli.config).await,
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Read queries from a text file (one per line) or a JSON array.
fn load_queries(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read queries from {}", path.display()))?;

    let queries: Vec<String> = if content.trim_start().starts_with('[') {
        serde_json::from_str(&content).context("Queries file is not a JSON array of strings")?
    } else {
        content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    };

    if queries.is_empty() {
        anyhow::bail!("No queries found in {}", path.display());
    }
    Ok(queries)
}

async fn cmd_run(
    config_path: Option<PathBuf>,
    queries_path: PathBuf,
    clear_work_dir: bool,
    keep_going: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let queries = load_queries(&queries_path)?;

    println!(
        "Evaluating {} sources over {} queries (limit {})",
        config.sources.len(),
        queries.len(),
        config.limit
    );

    let policy = if keep_going {
        FailurePolicy::CollectPartial
    } else {
        FailurePolicy::AbortOnFirst
    };
    let (orchestrator, pipelines) = Orchestrator::from_config(&config)?;
    let orchestrator = orchestrator
        .with_failure_policy(policy)
        .clear_work_dir(clear_work_dir);

    let start = Instant::now();
    let runs = orchestrator
        .run(pipelines, &queries)
        .await
        .context("Evaluation failed")?;

    println!("\nCompleted in {:.2?}", start.elapsed());
    println!("Artifacts in: {}", orchestrator.work_dir().display());

    let ranked = rank_runs(runs.into_values())?;
    print_summaries(&ranked);

    if let Some(output) = output {
        write_comparison(&ranked, &output)?;
    }

    Ok(())
}

fn cmd_summary(artifacts: Vec<PathBuf>) -> Result<()> {
    let runs = load_runs(&dedup_paths(artifacts))?;
    print_summaries(&rank_runs(runs).context("Cannot summarize artifacts")?);
    Ok(())
}

fn cmd_compare(artifacts: Vec<PathBuf>, dir: Option<PathBuf>, output: PathBuf) -> Result<()> {
    let mut paths = artifacts;
    if let Some(dir) = dir {
        paths.extend(find_run_artifacts(&dir).context("Failed to scan artifact directory")?);
    }

    let ranked = rank_runs(load_runs(&dedup_paths(paths))?)
        .context("Artifacts must come from distinct sources")?;
    print_summaries(&ranked);
    write_comparison(&ranked, &output)
}

fn load_runs(paths: &[PathBuf]) -> Result<Vec<EvaluationRun>> {
    paths
        .iter()
        .map(|p| load_run(p).with_context(|| format!("Failed to load {}", p.display())))
        .collect()
}

fn print_summaries(ranked: &BTreeMap<String, Vec<RankedRow>>) {
    println!("\n{:<30} {:>16} {:>16} {:>16} {:>6}", "Source", "GREAT", "OK", "BAD", "Total");
    println!("{}", "─".repeat(88));
    for (source_id, rows) in ranked {
        let summary = summarize(rows);
        println!(
            "{:<30} {:>16} {:>16} {:>16} {:>6}",
            source_id,
            summary_cell(&summary, Label::Great),
            summary_cell(&summary, Label::Ok),
            summary_cell(&summary, Label::Bad),
            summary.total
        );
    }
    println!();
}

fn summary_cell(summary: &LabelSummary, label: Label) -> String {
    format!("{} ({})", summary.count(label), summary.format_percentage(label))
}

fn write_comparison(ranked: &BTreeMap<String, Vec<RankedRow>>, output: &Path) -> Result<()> {
    let table = compare(ranked).context("Cannot build comparison")?;
    let json = serde_json::to_string_pretty(&table)?;
    std::fs::write(output, json)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "Comparison of {} sources ({} rows) saved to {}",
        table.sources.len(),
        table.len(),
        output.display()
    );
    Ok(())
}

async fn cmd_test(config_path: Option<PathBuf>) -> Result<()> {
    println!("Testing judgment service connection...\n");

    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;

    println!("Configuration:");
    println!("  API Base:  {}", config.judge.api_base);
    println!(
        "  API Key:   {}...",
        key_preview(&config.judge.api_key)
    );
    println!("  Sources:   {}", config.sources.len());
    println!();

    if let Err(e) = config.validate() {
        println!("Configuration error: {}", e);
        return Ok(());
    }

    let client = JudgmentClient::new(config.judge);

    println!("Sending test request...");
    match client.test_connection().await {
        Ok(()) => println!("Connection successful!"),
        Err(e) => println!("Connection failed: {}", e),
    }

    Ok(())
}

/// First eight characters of an API key.
fn key_preview(key: &str) -> String {
    key.chars().take(8).collect()
}
