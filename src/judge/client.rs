//! HTTP client for the judgment service.
//!
//! A judgment job is created with one POST carrying every (query, object)
//! pair, then observed with GETs until it reaches a terminal state.

use super::poll::{PollOutcome, PollPolicy};
use super::types::{JobState, JobStatus};
use crate::collector::ResultSet;
use crate::config::JudgeConfig;
use crate::error::{EvalError, Result};
use crate::persistence::save_run_artifact;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Request body for job submission.
#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    configuration: JobConfiguration<'a>,
    data: &'a ResultSet,
}

#[derive(Debug, Serialize)]
struct JobConfiguration<'a> {
    eval_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

/// Client for submitting and polling judgment jobs.
#[derive(Clone)]
pub struct JudgmentClient {
    client: Client,
    config: JudgeConfig,
    policy: PollPolicy,
}

impl JudgmentClient {
    /// Create a new client; polling follows the config's poll settings.
    pub fn new(config: JudgeConfig) -> Self {
        let policy = config.poll_policy();
        Self {
            client: Client::new(),
            config,
            policy,
        }
    }

    /// Replace the polling policy.
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn poll_policy(&self) -> &PollPolicy {
        &self.policy
    }

    fn evaluations_endpoint(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        format!("{}/v1/evaluations", base)
    }

    fn status_endpoint(&self, job_id: &str) -> String {
        format!("{}/{}", self.evaluations_endpoint(), job_id)
    }

    /// Submit all pairs of `results` as one job; returns the job id.
    pub async fn submit(&self, results: &ResultSet, job_name: &str) -> Result<String> {
        let request = SubmitRequest {
            configuration: JobConfiguration {
                eval_name: job_name,
            },
            data: results,
        };

        let response = self
            .client
            .post(self.evaluations_endpoint())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            return Err(EvalError::SubmissionFailed {
                status_code: status.as_u16(),
                body,
            });
        }

        let submitted: SubmitResponse = serde_json::from_str(&body).map_err(|e| {
            EvalError::Serialization(format!(
                "Submission response has no job id: {}. Response: {}",
                e, body
            ))
        })?;

        tracing::info!(job_name, job_id = %submitted.id, pairs = results.len(), "submitted judgment job");
        Ok(submitted.id)
    }

    /// Fetch the current status of a job once.
    pub async fn poll(&self, job_id: &str) -> Result<JobStatus> {
        let response = self
            .client
            .get(self.status_endpoint(job_id))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(EvalError::JudgmentFailed {
                status_code: status.as_u16(),
                raw_response: body,
            });
        }

        let raw: serde_json::Value = serde_json::from_str(&body)?;
        JobStatus::parse(status.as_u16(), raw)
    }

    /// Poll until the job completes.
    ///
    /// `accepted` and `processing` keep polling; `failed` and `error` stop
    /// immediately with [`EvalError::JudgmentFailed`].
    pub async fn wait_for_completion(&self, job_id: &str) -> Result<JobStatus> {
        self.policy
            .run(job_id, move || async move {
                let status = self.poll(job_id).await?;
                match status.state {
                    JobState::Completed => Ok(PollOutcome::Ready(status)),
                    JobState::Failed | JobState::Error => {
                        tracing::warn!(job_id, state = ?status.state, "judgment job failed");
                        Err(EvalError::JudgmentFailed {
                            status_code: status.http_status,
                            raw_response: status.raw.to_string(),
                        })
                    }
                    JobState::Accepted | JobState::Processing => Ok(PollOutcome::Pending),
                }
            })
            .await
    }

    /// Submit, wait for completion, and save the completed status to `save_to`.
    ///
    /// The artifact is on disk before this returns.
    pub async fn evaluate(
        &self,
        results: &ResultSet,
        job_name: &str,
        save_to: &Path,
    ) -> Result<JobStatus> {
        let job_id = self.submit(results, job_name).await?;
        let status = self.wait_for_completion(&job_id).await?;
        save_run_artifact(&status.raw, save_to)?;
        tracing::info!(job_id = %job_id, path = %save_to.display(), "judgment job completed");
        Ok(status)
    }

    /// Check that the service is reachable and accepts the API key.
    pub async fn test_connection(&self) -> Result<()> {
        let response = self
            .client
            .get(self.evaluations_endpoint())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(EvalError::Config(format!(
                "Judgment API rejected the API key ({})",
                response.status()
            ))),
            status if status.is_server_error() => Err(EvalError::Http(format!(
                "Judgment API unavailable ({})",
                status
            ))),
            _ => Ok(()),
        }
    }
}
