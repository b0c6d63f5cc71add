use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::orchestrator::OrchestratorStats;
use crate::state::AppState;

/// Structured health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub instances: OrchestratorStats,
}

/// Structured health check endpoint. Returns server status and instance counts as JSON.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.orchestrator.stats();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        instances: stats,
    })
}

/// Readiness check. Ready while a Lobby instance exists or can be created.
pub async fn readiness_check(State(state): State<AppState>) -> &'static str {
    let orchestrator = Arc::clone(&state.orchestrator);
    let refilled = tokio::task::spawn_blocking(move || orchestrator.ensure_lobby_pool_non_empty())
        .await
        .unwrap_or(false);
    if !refilled {
        return "not ready: no lobby instance available";
    }
    "ready"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_serializes() {
        let resp = HealthResponse {
            status: "healthy",
            version: "0.1.0",
            instances: OrchestratorStats {
                templates: 2,
                lobby_instances: 1,
                active_instances: 3,
                members: 7,
            },
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"healthy\""));
        assert!(json.contains("\"lobby_instances\":1"));
        assert!(json.contains("\"members\":7"));
    }
}
