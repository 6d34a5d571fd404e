//! Wire types of the judgment service.

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Relevance label assigned to a (query, object) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    Great,
    Ok,
    Bad,
}

impl Label {
    /// All labels, best first.
    pub const ALL: [Label; 3] = [Label::Great, Label::Ok, Label::Bad];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Great => "GREAT",
            Label::Ok => "OK",
            Label::Bad => "BAD",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a judgment job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Accepted,
    Processing,
    Completed,
    Failed,
    Error,
}

impl JobState {
    /// Still waiting on the service.
    pub fn is_pending(&self) -> bool {
        matches!(self, JobState::Accepted | JobState::Processing)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, JobState::Failed | JobState::Error)
    }
}

/// The service's verdict on one pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub score: f64,
    pub label: Label,
    #[serde(default)]
    pub explanation: String,
}

/// One judged (query, object) pair, in submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<Value>,
    #[serde(default)]
    pub object: Value,
    #[serde(rename = "judgement")]
    pub verdict: Verdict,
}

impl Judgment {
    pub fn label(&self) -> Label {
        self.verdict.label
    }

    pub fn score(&self) -> f64 {
        self.verdict.score
    }

    pub fn explanation(&self) -> &str {
        &self.verdict.explanation
    }
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: JobState,
}

#[derive(Debug, Deserialize)]
struct CompletedBody {
    #[serde(default)]
    judgements: Vec<Judgment>,
}

/// One observation of a job's status.
#[derive(Debug, Clone)]
pub struct JobStatus {
    /// HTTP status of the status request.
    pub http_status: u16,
    pub state: JobState,
    /// The status document as returned by the service.
    pub raw: Value,
}

impl JobStatus {
    /// Parse a status response body.
    pub fn parse(http_status: u16, raw: Value) -> Result<Self> {
        let body = StatusBody::deserialize(&raw).map_err(|e| {
            EvalError::Serialization(format!("Unrecognized job status: {}. Response: {}", e, raw))
        })?;
        Ok(Self {
            http_status,
            state: body.status,
            raw,
        })
    }

    /// Judgments embedded in a completed status, in submission order.
    pub fn judgments(&self) -> Result<Vec<Judgment>> {
        let body = CompletedBody::deserialize(&self.raw)
            .map_err(|e| EvalError::Serialization(format!("Malformed judgements: {}", e)))?;
        Ok(body.judgements)
    }
}
