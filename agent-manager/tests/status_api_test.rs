// Integration tests for the agent status API

use agent_manager::agents::wikipedia::config::STATISTICS_PATH;
use agent_manager::agents::wikipedia::WikipediaAgent;
use agent_manager::api::{create_router, ApiState};
use agent_manager::runners::scheduler::SchedulerSettings;
use agent_manager::{Agent, AgentManager, CycleOutcome, EndpointConfig};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use pulse::clock::SystemClock;
use pulse::config::{FailurePolicy, FetchConfig};
use pulse::metric::MemorySink;
use pulse::AgentIdentity;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct StaticAgent {
    identity: AgentIdentity,
}

#[async_trait]
impl Agent for StaticAgent {
    fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    async fn poll_cycle(&mut self) -> CycleOutcome {
        CycleOutcome::Reported { metrics: 1 }
    }
}

fn settings() -> SchedulerSettings {
    SchedulerSettings {
        interval: Duration::from_millis(50),
        cycle_timeout: Duration::from_secs(5),
        failure_policy: FailurePolicy::Fixed,
    }
}

fn app(manager: &AgentManager) -> Router {
    create_router(ApiState {
        status_map: manager.status_map(),
    })
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health() {
    let manager = AgentManager::new(settings(), Arc::new(MemorySink::new()));
    let (status, json) = get_json(app(&manager), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_list_agents_empty() {
    let manager = AgentManager::new(settings(), Arc::new(MemorySink::new()));
    let (status, json) = get_json(app(&manager), "/api/agents").await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["agents"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_list_agents_reports_status() {
    let manager = AgentManager::new(settings(), Arc::new(MemorySink::new()));
    for label in ["beta", "alpha"] {
        manager
            .register(
                Box::new(StaticAgent {
                    identity: AgentIdentity::new("com.example.static", "2.0.0", label),
                }),
                None,
            )
            .await
            .unwrap();
    }

    tokio::time::sleep(Duration::from_millis(30)).await;

    let (status, json) = get_json(app(&manager), "/api/agents").await;
    assert_eq!(status, StatusCode::OK);

    let agents = json["agents"].as_array().unwrap();
    assert_eq!(agents.len(), 2);
    assert_eq!(agents[0]["key"], "com.example.static:alpha");
    assert_eq!(agents[1]["key"], "com.example.static:beta");
    assert_eq!(agents[0]["version"], "2.0.0");
    assert!(agents[0]["poll_count"].as_u64().unwrap() >= 1);
    assert_eq!(agents[0]["last_outcome"], "reported 1 metrics");
    assert_eq!(agents[0]["backing_off"], false);

    manager.shutdown().await;
}

#[tokio::test]
async fn test_get_unknown_agent_is_404() {
    let manager = AgentManager::new(settings(), Arc::new(MemorySink::new()));
    let (status, json) = get_json(app(&manager), "/api/agents/io.pulse.json:nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("io.pulse.json:nope"));
}

#[tokio::test]
async fn test_wikipedia_agent_end_to_end() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", STATISTICS_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"query":{"statistics":{"articles":6800000,"pages":61000000}}}"#)
        .create_async()
        .await;

    let sink = Arc::new(MemorySink::new());
    let manager = AgentManager::new(settings(), sink.clone());
    let agent = WikipediaAgent::with_endpoint(
        "Wikipedia EN",
        EndpointConfig::new("http", server.host_with_port(), STATISTICS_PATH),
        &FetchConfig::default(),
        sink.clone(),
        Arc::new(SystemClock),
    )
    .unwrap();

    let key = manager.register(Box::new(agent), None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let uri = format!("/api/agents/{}", key.replace(' ', "%20"));
    let (status, json) = get_json(app(&manager), &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["label"], "Wikipedia EN");
    assert!(json["poll_count"].as_u64().unwrap() >= 2);
    assert_eq!(json["error_count"], 0);

    manager.shutdown().await;

    assert_eq!(sink.registered().len(), 1);
    assert_eq!(sink.latest("Articles/Count"), Some(6_800_000.0));
    // Unchanged counter between cycles
    assert_eq!(sink.latest("Articles/Created"), Some(0.0));
}
