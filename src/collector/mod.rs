//! Result collection from search sources.
//!
//! A [`SearchSource`] answers one query with an ordered list of opaque result
//! objects. The [`ResultCollector`] runs a list of queries through a source and
//! flattens the answers into a [`ResultSet`] ready for judgment.

mod objective;
mod opensearch;

pub use objective::ObjectiveSource;
pub use opensearch::OpenSearchSource;

use crate::config::{SourceConfig, SourceKind};
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// A search backend under evaluation.
#[async_trait]
pub trait SearchSource: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &str;

    /// Return result objects for `query` in the backend's relevance order.
    ///
    /// Implementations may return more than `limit` items; the collector
    /// enforces the limit.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Value>>;
}

/// One search result tagged with the query that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    pub query: String,
    /// Backend-defined document, passed through untouched.
    pub object: Value,
}

/// Ordered results of one source over a list of queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    pub items: Vec<ResultItem>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Runs queries through one [`SearchSource`].
#[derive(Clone)]
pub struct ResultCollector {
    source: Arc<dyn SearchSource>,
}

impl ResultCollector {
    pub fn new(source: Arc<dyn SearchSource>) -> Self {
        Self { source }
    }

    /// Build the collector for a configured source.
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let source: Arc<dyn SearchSource> = match &config.kind {
            SourceKind::OpenSearch(os) => Arc::new(OpenSearchSource::new(os.clone())?),
            SourceKind::Objective(obj) => Arc::new(ObjectiveSource::new(obj.clone())),
        };
        Ok(Self::new(source))
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Query the source for each query in order, keeping at most `limit`
    /// results per query.
    ///
    /// The first failing query aborts collection.
    pub async fn collect(&self, queries: &[String], limit: usize) -> Result<ResultSet> {
        let mut results = ResultSet::default();

        for query in queries {
            let objects = self.source.search(query, limit).await?;
            tracing::debug!(
                source = self.source.name(),
                query = %query,
                returned = objects.len(),
                "collected results"
            );

            results
                .items
                .extend(objects.into_iter().take(limit).map(|object| ResultItem {
                    query: query.clone(),
                    object,
                }));
        }

        Ok(results)
    }
}

/// Map a non-success HTTP response from a source into a [`EvalError::SourceFailure`].
pub(crate) async fn source_failure(backend: &str, response: reqwest::Response) -> EvalError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    EvalError::SourceFailure {
        status: Some(status.as_u16()),
        message: format!("Failed to query {}: {}", backend, body),
    }
}

/// Map a transport error from a source into a [`EvalError::SourceFailure`].
pub(crate) fn transport_failure(backend: &str, err: reqwest::Error) -> EvalError {
    EvalError::SourceFailure {
        status: err.status().map(|s| s.as_u16()),
        message: format!("Failed to connect to {}: {}", backend, err),
    }
}
