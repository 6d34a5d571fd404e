//! OpenSearch full-text source.

use super::{SearchSource, source_failure, transport_failure};
use crate::config::OpenSearchConfig;
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

/// Placeholder string replaced by the query in the request template.
const QUERY_PLACEHOLDER: &str = "{query}";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Hits,
}

#[derive(Debug, Default, Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source", default)]
    source: Value,
}

/// Queries an OpenSearch index through the `_search` endpoint.
pub struct OpenSearchSource {
    client: Client,
    config: OpenSearchConfig,
}

impl OpenSearchSource {
    pub fn new(config: OpenSearchConfig) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!config.ssl_verify)
            .build()
            .map_err(|e| EvalError::Config(format!("Failed to build OpenSearch client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        let host = self.config.host.trim_end_matches('/');
        format!("{}:{}/{}/_search", host, self.config.port, self.config.index)
    }

    /// Substitute `query` for every `"{query}"` string in the template,
    /// object keys included.
    fn render_query(template: &Value, query: &str) -> Value {
        match template {
            Value::String(s) if s == QUERY_PLACEHOLDER => Value::String(query.to_string()),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| Self::render_query(item, query))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| {
                        let key = if k == QUERY_PLACEHOLDER {
                            query.to_string()
                        } else {
                            k.clone()
                        };
                        (key, Self::render_query(v, query))
                    })
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

#[async_trait]
impl SearchSource for OpenSearchSource {
    fn name(&self) -> &str {
        "opensearch"
    }

    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<Value>> {
        let body = Self::render_query(&self.config.query_template, query);

        let mut request = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&body);
        if !self.config.username.is_empty() {
            request = request.basic_auth(&self.config.username, Some(&self.config.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_failure("OpenSearch", e))?;

        if !response.status().is_success() {
            return Err(source_failure("OpenSearch", response).await);
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| transport_failure("OpenSearch", e))?;

        Ok(parsed.hits.hits.into_iter().map(|hit| hit.source).collect())
    }
}
