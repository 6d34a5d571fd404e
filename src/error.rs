//! Error types for the evaluator.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Errors that can occur while collecting, judging, or aggregating results.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// HTTP transport error (connection refused, TLS, timeout...).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A search source could not return results.
    #[error("Search source failed{}: {message}", fmt_status(.status))]
    SourceFailure {
        status: Option<u16>,
        message: String,
    },

    /// The judgment service rejected the batch at submission time.
    #[error("Judgment submission failed with status {status_code}: {body}")]
    SubmissionFailed { status_code: u16, body: String },

    /// The judgment job reached the `failed` or `error` state.
    #[error("Judgment job failed (status {status_code}): {raw_response}")]
    JudgmentFailed {
        status_code: u16,
        raw_response: String,
    },

    /// The judgment job did not reach a terminal state in time.
    #[error("Judgment job '{job_id}' still pending after {waited:?}")]
    PollTimeout { job_id: String, waited: Duration },

    /// Comparison needs at least two evaluation runs.
    #[error("At least two evaluation runs are required to compare, got {found}")]
    InsufficientSources { found: usize },

    /// Two runs carry the same source id.
    #[error("Source '{0}' appears in more than one run")]
    DuplicateSource(String),

    /// A per-source pipeline failed; identifies the source.
    #[error("Pipeline for source '{source_id}' failed: {source}")]
    Pipeline {
        source_id: String,
        #[source]
        source: Box<EvalError>,
    },

    /// A pipeline task panicked or was cancelled before reporting.
    #[error("Pipeline task did not finish: {0}")]
    TaskFailed(String),

    /// The run artifact does not exist.
    #[error("Run artifact not found at '{0}'")]
    ArtifactNotFound(PathBuf),
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

impl EvalError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap an error with the id of the source whose pipeline produced it.
    pub fn in_pipeline(source_id: impl Into<String>, err: EvalError) -> Self {
        Self::Pipeline {
            source_id: source_id.into(),
            source: Box::new(err),
        }
    }

    /// The failing source id, if this error came out of a pipeline.
    pub fn source_id(&self) -> Option<&str> {
        match self {
            Self::Pipeline { source_id, .. } => Some(source_id),
            _ => None,
        }
    }

    /// The error underneath any pipeline wrapping.
    pub fn root(&self) -> &EvalError {
        match self {
            Self::Pipeline { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<reqwest::Error> for EvalError {
    fn from(err: reqwest::Error) -> Self {
        EvalError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        EvalError::Serialization(err.to_string())
    }
}
