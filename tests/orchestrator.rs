//! Orchestrator Tests
//!
//! Run several source pipelines concurrently against in-memory search sources
//! and a mock judgment service.

use async_trait::async_trait;
use search_relevance_eval::aggregate::{compare, normalize};
use search_relevance_eval::collector::{ResultCollector, SearchSource};
use search_relevance_eval::config::JudgeConfig;
use search_relevance_eval::error::{EvalError, Result};
use search_relevance_eval::judge::{JudgmentClient, PollPolicy};
use search_relevance_eval::orchestrator::{FailurePolicy, Orchestrator, SourcePipeline};
use search_relevance_eval::persistence::{load_result_set, result_set_path, run_artifact_path};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Returns three results per query after an optional delay.
struct StaticSource {
    delay: Duration,
}

#[async_trait]
impl SearchSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<Value>> {
        tokio::time::sleep(self.delay).await;
        Ok((0..3).map(|i| json!({"id": format!("{query}-{i}")})).collect())
    }
}

struct BrokenSource;

#[async_trait]
impl SearchSource for BrokenSource {
    fn name(&self) -> &str {
        "broken"
    }

    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<Value>> {
        Err(EvalError::SourceFailure {
            status: Some(500),
            message: "index unavailable".to_string(),
        })
    }
}

fn pipeline(id: &str, source: impl SearchSource + 'static) -> SourcePipeline {
    SourcePipeline::new(id, ResultCollector::new(Arc::new(source)), 2)
}

fn fast(id: &str) -> SourcePipeline {
    pipeline(
        id,
        StaticSource {
            delay: Duration::ZERO,
        },
    )
}

fn queries() -> Vec<String> {
    vec!["red dress".to_string(), "jeans".to_string()]
}

fn judgement(query: &str, label: &str) -> Value {
    json!({
        "query": query,
        "object_id": null,
        "object": {"q": query},
        "judgement": {"score": 0.5, "label": label, "explanation": "mock"}
    })
}

async fn judge_server() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/evaluations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "eval_1"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/evaluations/eval_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "judgements": [
                judgement("red dress", "GREAT"),
                judgement("red dress", "OK"),
                judgement("jeans", "BAD"),
                judgement("jeans", "GREAT")
            ]
        })))
        .mount(&server)
        .await;

    server
}

fn orchestrator(server: &MockServer, work_dir: &TempDir) -> Orchestrator {
    let client = JudgmentClient::new(JudgeConfig {
        api_base: server.uri(),
        api_key: "test-key".to_string(),
        ..Default::default()
    })
    .with_poll_policy(PollPolicy::fixed(Duration::from_millis(10)));
    Orchestrator::new(client, work_dir.path())
}

#[tokio::test]
async fn test_run_evaluates_every_source() {
    let server = judge_server().await;
    let dir = TempDir::new().unwrap();

    let runs = orchestrator(&server, &dir)
        .run(vec![fast("alpha"), fast("beta")], &queries())
        .await
        .unwrap();

    assert_eq!(runs.len(), 2);
    for id in ["alpha", "beta"] {
        let run = &runs[id];
        assert_eq!(run.source_id, id);
        assert_eq!(run.judgments.len(), 4);
        assert!(run_artifact_path(dir.path(), id).exists());

        // Limit 2 applied per query before submission.
        let collected = load_result_set(&result_set_path(dir.path(), id)).unwrap();
        assert_eq!(collected.len(), 4);
    }

    let ranked: BTreeMap<_, _> = runs
        .values()
        .map(|run| (run.source_id.clone(), normalize(run)))
        .collect();
    let table = compare(&ranked).unwrap();
    assert_eq!(table.len(), 4);
}

#[tokio::test]
async fn test_abort_on_first_failure_names_source() {
    let server = judge_server().await;
    let dir = TempDir::new().unwrap();

    let slow = pipeline(
        "slow",
        StaticSource {
            delay: Duration::from_secs(5),
        },
    );

    let err = orchestrator(&server, &dir)
        .with_failure_policy(FailurePolicy::AbortOnFirst)
        .run(vec![slow, pipeline("broken", BrokenSource)], &queries())
        .await
        .unwrap_err();

    assert_eq!(err.source_id(), Some("broken"));
    assert!(matches!(
        err.root(),
        EvalError::SourceFailure {
            status: Some(500),
            ..
        }
    ));

    // The slow pipeline was cancelled before producing anything.
    assert!(!result_set_path(dir.path(), "slow").exists());
    assert!(!run_artifact_path(dir.path(), "slow").exists());
}

#[tokio::test]
async fn test_run_all_reports_each_source() {
    let server = judge_server().await;
    let dir = TempDir::new().unwrap();

    let outcomes = orchestrator(&server, &dir)
        .run_all(
            vec![fast("alpha"), pipeline("broken", BrokenSource), fast("gamma")],
            &queries(),
        )
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes["alpha"].as_ref().unwrap().judgments.len(), 4);
    assert_eq!(outcomes["gamma"].as_ref().unwrap().judgments.len(), 4);
    assert!(matches!(
        outcomes["broken"],
        Err(EvalError::SourceFailure { .. })
    ));
}

#[tokio::test]
async fn test_collect_partial_keeps_successful_runs() {
    let server = judge_server().await;
    let dir = TempDir::new().unwrap();

    let runs = orchestrator(&server, &dir)
        .with_failure_policy(FailurePolicy::CollectPartial)
        .run(vec![fast("alpha"), pipeline("broken", BrokenSource)], &queries())
        .await
        .unwrap();

    assert_eq!(runs.len(), 1);
    assert!(runs.contains_key("alpha"));
}

#[tokio::test]
async fn test_judgment_failure_is_attributed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/evaluations"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();

    let err = orchestrator(&server, &dir)
        .run(vec![fast("alpha")], &queries())
        .await
        .unwrap_err();

    assert_eq!(err.source_id(), Some("alpha"));
    assert!(matches!(
        err.root(),
        EvalError::SubmissionFailed {
            status_code: 401,
            ..
        }
    ));
}

#[tokio::test]
async fn test_duplicate_source_ids_rejected() {
    let server = judge_server().await;
    let dir = TempDir::new().unwrap();

    let err = orchestrator(&server, &dir)
        .run(vec![fast("alpha"), fast("alpha")], &queries())
        .await
        .unwrap_err();

    assert!(matches!(err, EvalError::InvalidConfig(_)));
}

#[tokio::test]
async fn test_pipeline_client_overrides_shared_client() {
    let rejecting = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/evaluations"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&rejecting)
        .await;
    let accepting = judge_server().await;
    let dir = TempDir::new().unwrap();

    let own_client = JudgmentClient::new(JudgeConfig {
        api_base: accepting.uri(),
        api_key: "other-key".to_string(),
        ..Default::default()
    })
    .with_poll_policy(PollPolicy::fixed(Duration::from_millis(10)));

    let outcomes = orchestrator(&rejecting, &dir)
        .run_all(
            vec![fast("alpha").with_client(own_client), fast("beta")],
            &queries(),
        )
        .await
        .unwrap();

    assert_eq!(outcomes["alpha"].as_ref().unwrap().judgments.len(), 4);
    assert!(matches!(
        outcomes["beta"],
        Err(EvalError::SubmissionFailed {
            status_code: 401,
            ..
        })
    ));
}
