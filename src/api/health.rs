/// Health check endpoints
///
/// Liveness answers as long as the process runs; readiness also checks the
/// database and the code store.
use crate::{context::AppContext, db};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Health of one dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    /// "healthy" or "unhealthy"
    pub status: String,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_basic))
        .route("/health/ready", get(readiness_probe))
}

/// Basic health check
pub async fn health_basic(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": ctx.config.service.version
    }))
}

fn component(name: &str, started: Instant, result: Result<(), String>) -> ComponentHealth {
    ComponentHealth {
        name: name.to_string(),
        status: if result.is_ok() { "healthy" } else { "unhealthy" }.to_string(),
        response_time_ms: started.elapsed().as_millis() as u64,
        error: result.err(),
    }
}

/// Readiness probe - can we serve logins right now
pub async fn readiness_probe(
    State(ctx): State<AppContext>,
) -> (StatusCode, Json<serde_json::Value>) {
    let started = Instant::now();
    let database = component(
        "database",
        started,
        db::test_connection(&ctx.account_db)
            .await
            .map_err(|e| e.to_string()),
    );

    let started = Instant::now();
    let store = component(
        "code_store",
        started,
        ctx.store
            .get("health:probe")
            .await
            .map(|_| ())
            .map_err(|e| e.to_string()),
    );

    let ready = database.error.is_none() && store.error.is_none();
    let status = if ready {
        StatusCode::OK
    } else {
        tracing::warn!("Readiness check failed");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if ready { "ready" } else { "not_ready" },
            "checks": [database, store],
        })),
    )
}
