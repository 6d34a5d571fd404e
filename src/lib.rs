//! Search Relevance Evaluator - compare search backends with a remote
//! relevance-judgment service.
//!
//! # Overview
//!
//! For every configured search source the evaluator:
//! 1. Runs a list of queries against the source and keeps the top results
//! 2. Submits all (query, result) pairs to the judgment service as one job
//! 3. Polls the job until the service has labeled every pair GREAT, OK or BAD
//!
//! Sources run concurrently. Their judgments are then ranked per query and
//! outer-joined on (query, rank) for side-by-side comparison.
//!
//! # Quick Start
//!
//! ```no_run
//! use search_relevance_eval::{
//!     aggregate::{compare, normalize, summarize},
//!     config::Config,
//!     judge::Label,
//!     orchestrator::Orchestrator,
//! };
//! use std::collections::BTreeMap;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     config.validate()?;
//!
//!     let (orchestrator, pipelines) = Orchestrator::from_config(&config)?;
//!     let queries = vec!["red dress".to_string(), "jeans for men".to_string()];
//!     let runs = orchestrator.run(pipelines, &queries).await?;
//!
//!     let ranked: BTreeMap<_, _> = runs
//!         .iter()
//!         .map(|(id, run)| (id.clone(), normalize(run)))
//!         .collect();
//!
//!     for (id, rows) in &ranked {
//!         let summary = summarize(rows);
//!         println!("{}: GREAT {}", id, summary.format_percentage(Label::Great));
//!     }
//!
//!     if ranked.len() >= 2 {
//!         let table = compare(&ranked)?;
//!         println!("{} comparison rows", table.len());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **ResultCollector**: runs queries through a [`collector::SearchSource`]
//! - **JudgmentClient**: submits and polls judgment jobs
//! - **Orchestrator**: one concurrent pipeline per source
//! - **aggregate**: rank assignment, comparison table, label summary

pub mod aggregate;
pub mod collector;
pub mod config;
pub mod error;
pub mod judge;
pub mod orchestrator;
pub mod persistence;

// Re-export commonly used types
pub use aggregate::{
    ComparisonTable, LabelSummary, RankedRow, compare, normalize, rank_runs, summarize,
};
pub use collector::{ResultCollector, ResultItem, ResultSet, SearchSource};
pub use config::Config;
pub use error::{EvalError, Result};
pub use judge::{JobState, Judgment, JudgmentClient, Label, PollPolicy};
pub use orchestrator::{EvaluationRun, FailurePolicy, Orchestrator, SourcePipeline};
pub use persistence::{load_run, save_run_artifact};
