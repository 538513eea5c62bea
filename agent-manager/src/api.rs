//! Agent Manager HTTP API: read-only status endpoints.
//!
//! Exposes three routes:
//! - `GET /health` - liveness check
//! - `GET /api/agents` - status of every registered agent
//! - `GET /api/agents/:key` - status of one agent by `guid:label` key

use crate::manager::StatusMap;
use crate::runners::scheduler::AgentStatus;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;

/// Shared state for the status API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub status_map: StatusMap,
}

/// A single entry in the `GET /api/agents` response.
#[derive(Debug, Serialize)]
pub struct AgentInfo {
    pub key: String,
    #[serde(flatten)]
    pub status: AgentStatus,
    pub backing_off: bool,
}

impl AgentInfo {
    fn new(key: String, status: AgentStatus) -> Self {
        let backing_off = status.is_backing_off();
        Self {
            key,
            status,
            backing_off,
        }
    }
}

#[derive(Serialize)]
pub struct AgentListResponse {
    pub agents: Vec<AgentInfo>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

// ---------------------------------------------------------------------------
// Business logic
// ---------------------------------------------------------------------------

/// Snapshot of every agent's status, sorted by key.
pub async fn list_agents(status_map: &StatusMap) -> Vec<AgentInfo> {
    let entries: Vec<_> = {
        let map = status_map.lock().await;
        map.iter()
            .map(|(key, status)| (key.clone(), status.clone()))
            .collect()
    };

    let mut agents = Vec::with_capacity(entries.len());
    for (key, status) in entries {
        let snapshot = status.lock().await.clone();
        agents.push(AgentInfo::new(key, snapshot));
    }
    agents.sort_by(|a, b| a.key.cmp(&b.key));
    agents
}

/// Snapshot of one agent's status.
pub async fn find_agent(status_map: &StatusMap, key: &str) -> Option<AgentInfo> {
    let status = status_map.lock().await.get(key).cloned()?;
    let snapshot = status.lock().await.clone();
    Some(AgentInfo::new(key.to_string(), snapshot))
}

// ---------------------------------------------------------------------------
// HTTP handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn get_agents(State(state): State<ApiState>) -> Json<AgentListResponse> {
    Json(AgentListResponse {
        agents: list_agents(&state.status_map).await,
    })
}

async fn get_agent(
    State(state): State<ApiState>,
    Path(key): Path<String>,
) -> Result<Json<AgentInfo>, AppError> {
    find_agent(&state.status_map, &key)
        .await
        .map(Json)
        .ok_or(AppError::NotFound(key))
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

enum AppError {
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let AppError::NotFound(key) = self;
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Agent '{}' not found", key),
            }),
        )
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/agents", get(get_agents))
        .route("/api/agents/:key", get(get_agent))
        .with_state(state)
}
