//! Concurrent evaluation of several search sources.
//!
//! Each configured source gets its own pipeline task:
//! collect results → save them → submit to the judgment service → poll until
//! done → save the run artifact. Pipelines share nothing; their outcomes are
//! gathered in completion order through a [`JoinSet`].

use crate::collector::ResultCollector;
use crate::config::{Config, SourceConfig};
use crate::error::{EvalError, Result};
use crate::judge::{Judgment, JudgmentClient};
use crate::persistence::{reset_work_dir, result_set_path, run_artifact_path, save_result_set};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::Instrument;

/// Complete labeled output of one source over one set of queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRun {
    pub source_id: String,
    /// Judgments in submission order.
    pub judgments: Vec<Judgment>,
}

/// One source to evaluate.
#[derive(Clone)]
pub struct SourcePipeline {
    pub source_id: String,
    pub collector: ResultCollector,
    /// Maximum results kept per query.
    pub limit: usize,
    /// Judgment client for this source; the orchestrator's client otherwise.
    pub client: Option<JudgmentClient>,
}

impl SourcePipeline {
    pub fn new(source_id: impl Into<String>, collector: ResultCollector, limit: usize) -> Self {
        Self {
            source_id: source_id.into(),
            collector,
            limit,
            client: None,
        }
    }

    /// Judge this source with `client` instead of the orchestrator's.
    pub fn with_client(mut self, client: JudgmentClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Build a pipeline from a source definition.
    pub fn from_config(config: &SourceConfig, default_limit: usize) -> Result<Self> {
        Ok(Self::new(
            config.id.clone(),
            ResultCollector::from_config(config)?,
            config.limit.unwrap_or(default_limit),
        ))
    }
}

/// What to do when one pipeline fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Cancel the other pipelines and return the first error.
    #[default]
    AbortOnFirst,
    /// Let every pipeline finish; failed sources are left out of the result.
    CollectPartial,
}

/// Runs source pipelines concurrently.
pub struct Orchestrator {
    client: JudgmentClient,
    work_dir: PathBuf,
    policy: FailurePolicy,
    clear_work_dir: bool,
}

impl Orchestrator {
    pub fn new(client: JudgmentClient, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            work_dir: work_dir.into(),
            policy: FailurePolicy::default(),
            clear_work_dir: false,
        }
    }

    /// Build an orchestrator and its pipelines from configuration.
    pub fn from_config(config: &Config) -> Result<(Self, Vec<SourcePipeline>)> {
        let pipelines = config
            .sources
            .iter()
            .map(|source| SourcePipeline::from_config(source, config.limit))
            .collect::<Result<Vec<_>>>()?;
        let orchestrator = Self::new(
            JudgmentClient::new(config.judge.clone()),
            config.work_dir.clone(),
        );
        Ok((orchestrator, pipelines))
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Empty the work directory before running.
    pub fn clear_work_dir(mut self, clear: bool) -> Self {
        self.clear_work_dir = clear;
        self
    }

    pub fn work_dir(&self) -> &PathBuf {
        &self.work_dir
    }

    /// Evaluate every pipeline over `queries`.
    ///
    /// Under [`FailurePolicy::AbortOnFirst`] the first failure cancels the
    /// remaining pipelines and is returned as [`EvalError::Pipeline`] naming
    /// the source. Under [`FailurePolicy::CollectPartial`] failures are logged
    /// and only successful runs are returned.
    pub async fn run(
        &self,
        pipelines: Vec<SourcePipeline>,
        queries: &[String],
    ) -> Result<HashMap<String, EvaluationRun>> {
        if self.policy == FailurePolicy::CollectPartial {
            let outcomes = self.run_all(pipelines, queries).await?;
            let mut runs = HashMap::new();
            for (source_id, outcome) in outcomes {
                match outcome {
                    Ok(run) => {
                        runs.insert(source_id, run);
                    }
                    Err(err) => {
                        tracing::warn!(source = %source_id, error = %err, "source left out of results");
                    }
                }
            }
            return Ok(runs);
        }

        let (mut tasks, ids) = self.spawn_all(pipelines, queries)?;
        let mut runs = HashMap::new();

        while let Some(joined) = tasks.join_next_with_id().await {
            let (source_id, outcome) = resolve(joined, &ids);
            match outcome {
                Ok(run) => {
                    runs.insert(source_id, run);
                }
                Err(err) => {
                    tasks.abort_all();
                    tracing::error!(source = %source_id, error = %err, "pipeline failed, aborting run");
                    return Err(EvalError::in_pipeline(source_id, err));
                }
            }
        }

        Ok(runs)
    }

    /// Evaluate every pipeline and report each source's outcome separately.
    ///
    /// Never cancels a pipeline because another failed.
    pub async fn run_all(
        &self,
        pipelines: Vec<SourcePipeline>,
        queries: &[String],
    ) -> Result<HashMap<String, Result<EvaluationRun>>> {
        let (mut tasks, ids) = self.spawn_all(pipelines, queries)?;
        let mut outcomes = HashMap::new();

        while let Some(joined) = tasks.join_next_with_id().await {
            let (source_id, outcome) = resolve(joined, &ids);
            if let Err(err) = &outcome {
                tracing::warn!(source = %source_id, error = %err, "pipeline failed");
            }
            outcomes.insert(source_id, outcome);
        }

        Ok(outcomes)
    }

    fn spawn_all(
        &self,
        pipelines: Vec<SourcePipeline>,
        queries: &[String],
    ) -> Result<(JoinSet<Result<EvaluationRun>>, HashMap<Id, String>)> {
        if pipelines.is_empty() {
            return Err(EvalError::InvalidConfig(
                "at least one source pipeline is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = pipelines
            .iter()
            .find(|p| !seen.insert(p.source_id.as_str()))
        {
            return Err(EvalError::InvalidConfig(format!(
                "duplicate source id '{}'",
                dup.source_id
            )));
        }

        if self.clear_work_dir {
            reset_work_dir(&self.work_dir)?;
        } else {
            fs::create_dir_all(&self.work_dir).map_err(|e| EvalError::io(&self.work_dir, e))?;
        }

        let queries: Arc<[String]> = Arc::from(queries.to_vec());
        let mut tasks = JoinSet::new();
        let mut ids = HashMap::new();

        tracing::info!(
            sources = pipelines.len(),
            queries = queries.len(),
            "starting evaluation"
        );

        for pipeline in pipelines {
            let source_id = pipeline.source_id.clone();
            let span = tracing::info_span!("pipeline", source = %source_id);
            let client = pipeline
                .client
                .clone()
                .unwrap_or_else(|| self.client.clone());
            let handle = tasks.spawn(
                run_pipeline(
                    client,
                    self.work_dir.clone(),
                    pipeline,
                    Arc::clone(&queries),
                )
                .instrument(span),
            );
            ids.insert(handle.id(), source_id);
        }

        Ok((tasks, ids))
    }
}

/// Attach the source id to a finished task's outcome.
fn resolve(
    joined: std::result::Result<(Id, Result<EvaluationRun>), JoinError>,
    ids: &HashMap<Id, String>,
) -> (String, Result<EvaluationRun>) {
    match joined {
        Ok((id, outcome)) => (ids.get(&id).cloned().unwrap_or_default(), outcome),
        Err(join_err) => (
            ids.get(&join_err.id()).cloned().unwrap_or_default(),
            Err(EvalError::TaskFailed(join_err.to_string())),
        ),
    }
}

async fn run_pipeline(
    client: JudgmentClient,
    work_dir: PathBuf,
    pipeline: SourcePipeline,
    queries: Arc<[String]>,
) -> Result<EvaluationRun> {
    let source_id = pipeline.source_id;

    tracing::info!(backend = pipeline.collector.source_name(), "collecting results");
    let results = pipeline.collector.collect(&queries, pipeline.limit).await?;
    save_result_set(&results, &result_set_path(&work_dir, &source_id))?;

    let job_name = format!("{}_eval", source_id);
    let status = client
        .evaluate(&results, &job_name, &run_artifact_path(&work_dir, &source_id))
        .await?;

    let judgments = status.judgments()?;
    if judgments.len() != results.len() {
        tracing::warn!(
            submitted = results.len(),
            judged = judgments.len(),
            "judgment count differs from submitted pairs"
        );
    }

    tracing::info!(judgments = judgments.len(), "pipeline finished");
    Ok(EvaluationRun {
        source_id,
        judgments,
    })
}
