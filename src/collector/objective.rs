//! Hosted vector index source.

use super::{SearchSource, source_failure, transport_failure};
use crate::config::ObjectiveConfig;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    object: Value,
}

/// Queries a hosted index through its search endpoint.
pub struct ObjectiveSource {
    client: Client,
    config: ObjectiveConfig,
}

impl ObjectiveSource {
    pub fn new(config: ObjectiveConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        format!("{}/v1/indexes/{}/search", base, self.config.index_id)
    }
}

#[async_trait]
impl SearchSource for ObjectiveSource {
    fn name(&self) -> &str {
        "objective"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Value>> {
        let limit = limit.to_string();
        let response = self
            .client
            .get(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .query(&[
                ("query", query),
                ("limit", limit.as_str()),
                ("object_fields", self.config.object_fields.as_str()),
            ])
            .send()
            .await
            .map_err(|e| transport_failure("index", e))?;

        if !response.status().is_success() {
            return Err(source_failure("index", response).await);
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| transport_failure("index", e))?;

        Ok(parsed.results.into_iter().map(|hit| hit.object).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_construction() {
        let source = ObjectiveSource::new(ObjectiveConfig {
            api_base: "https://api.example.com/".to_string(),
            api_key: "k".to_string(),
            index_id: "idx_1".to_string(),
            object_fields: "*".to_string(),
        });
        assert_eq!(
            source.endpoint(),
            "https://api.example.com/v1/indexes/idx_1/search"
        );
    }
}
