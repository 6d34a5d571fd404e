//! Configuration for the evaluator.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::error::{EvalError, Result};
use crate::judge::PollPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default base URL of the judgment service.
pub const DEFAULT_JUDGE_API_BASE: &str = "https://api.objective.inc";

/// Judgment service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    /// Base URL for the judgment API (e.g., "https://api.objective.inc")
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// API key sent as a bearer token
    #[serde(default)]
    pub api_key: String,

    /// Delay before the first re-poll of a pending job
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Multiplier applied to the poll delay after each pending poll (1.0 = fixed)
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Upper bound on the poll delay
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    /// Give up on a job after this many seconds (0 = wait forever)
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
}

fn default_api_base() -> String {
    DEFAULT_JUDGE_API_BASE.to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_backoff_factor() -> f64 {
    1.0
}

fn default_max_interval_ms() -> u64 {
    30_000
}

fn default_max_wait_secs() -> u64 {
    1800
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: String::new(),
            poll_interval_ms: default_poll_interval_ms(),
            backoff_factor: default_backoff_factor(),
            max_interval_ms: default_max_interval_ms(),
            max_wait_secs: default_max_wait_secs(),
        }
    }
}

impl JudgeConfig {
    /// Polling behaviour derived from this config.
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            backoff_factor: self.backoff_factor,
            max_interval: Duration::from_millis(self.max_interval_ms),
            max_wait: (self.max_wait_secs > 0).then(|| Duration::from_secs(self.max_wait_secs)),
        }
    }
}

/// OpenSearch source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSearchConfig {
    /// Scheme and host, e.g. "https://localhost"
    pub host: String,
    #[serde(default = "default_opensearch_port")]
    pub port: u16,
    pub index: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Verify TLS certificates
    #[serde(default)]
    pub ssl_verify: bool,
    /// Request body with a `"{query}"` placeholder string
    pub query_template: serde_json::Value,
}

fn default_opensearch_port() -> u16 {
    9200
}

/// Hosted vector index source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Falls back to `OBJECTIVE_API_KEY` when empty
    #[serde(default)]
    pub api_key: String,
    pub index_id: String,
    #[serde(default = "default_object_fields")]
    pub object_fields: String,
}

fn default_object_fields() -> String {
    "*".to_string()
}

/// Backend-specific part of a source definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceKind {
    OpenSearch(OpenSearchConfig),
    Objective(ObjectiveConfig),
}

/// One search source to evaluate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Identifier used for artifacts and comparison columns
    pub id: String,
    /// Per-source override of the result limit
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(flatten)]
    pub kind: SourceKind,
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Judgment service settings
    #[serde(default)]
    pub judge: JudgeConfig,

    /// Directory for scrape and evaluation artifacts
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Maximum results kept per query
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Sources to evaluate
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("work")
}

fn default_limit() -> usize {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            judge: JudgeConfig::default(),
            work_dir: default_work_dir(),
            limit: default_limit(),
            sources: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (OBJECTIVE_EVAL_API_KEY, EVAL_API_BASE, ...)
    /// 2. Config file (`path`, or ~/.config/search-relevance-eval/config.yaml)
    /// 3. Default values
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::config_file_path() {
                Some(default_path) if default_path.exists() => {
                    Self::load_from_file(&default_path)?
                }
                _ => Config::default(),
            },
        };

        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| EvalError::Config(format!("Failed to parse config file: {}", e)))
    }

    fn apply_env(&mut self) {
        if let Ok(api_base) = env::var("EVAL_API_BASE") {
            self.judge.api_base = api_base;
        }

        if let Ok(api_key) = env::var("OBJECTIVE_EVAL_API_KEY") {
            self.judge.api_key = api_key;
        }

        if let Ok(interval) = env::var("EVAL_POLL_INTERVAL_MS") {
            if let Ok(ms) = interval.parse() {
                self.judge.poll_interval_ms = ms;
            }
        }

        if let Ok(max_wait) = env::var("EVAL_MAX_WAIT_SECS") {
            if let Ok(secs) = max_wait.parse() {
                self.judge.max_wait_secs = secs;
            }
        }

        if let Ok(work_dir) = env::var("EVAL_WORK_DIR") {
            self.work_dir = PathBuf::from(work_dir);
        }

        if let Ok(index_key) = env::var("OBJECTIVE_API_KEY") {
            for source in &mut self.sources {
                if let SourceKind::Objective(objective) = &mut source.kind {
                    if objective.api_key.is_empty() {
                        objective.api_key = index_key.clone();
                    }
                }
            }
        }
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "search-relevance-eval")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate that required configuration is present.
    pub fn validate(&self) -> Result<()> {
        if self.judge.api_key.is_empty() {
            return Err(EvalError::Config(
                "Judgment API key is required. Set OBJECTIVE_EVAL_API_KEY environment variable or add to config file.".to_string()
            ));
        }

        if self.judge.api_base.is_empty() {
            return Err(EvalError::Config(
                "Judgment API base URL is required. Set EVAL_API_BASE environment variable or add to config file.".to_string()
            ));
        }

        if self.judge.poll_interval_ms == 0 {
            return Err(EvalError::InvalidConfig(
                "judge.poll_interval_ms must be greater than zero".to_string(),
            ));
        }

        if !self.judge.backoff_factor.is_finite() || self.judge.backoff_factor < 1.0 {
            return Err(EvalError::InvalidConfig(
                "judge.backoff_factor must be a finite number of at least 1.0".to_string(),
            ));
        }

        if self.limit == 0 || self.sources.iter().any(|s| s.limit == Some(0)) {
            return Err(EvalError::InvalidConfig(
                "limit must be greater than zero".to_string(),
            ));
        }

        if self.sources.is_empty() {
            return Err(EvalError::InvalidConfig(
                "at least one source must be configured".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return Err(EvalError::InvalidConfig("source id must not be empty".to_string()));
            }
            if !seen.insert(source.id.as_str()) {
                return Err(EvalError::InvalidConfig(format!(
                    "duplicate source id '{}'",
                    source.id
                )));
            }
        }

        Ok(())
    }

    /// Create a config from explicit values (useful for testing).
    pub fn with_judge(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            judge: JudgeConfig {
                api_base: api_base.into(),
                api_key: api_key.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
