/// HTTP server setup and routing
use crate::{
    api::middleware::general_rate_limit,
    context::AppContext,
    error::{DeskError, DeskResult},
};
use axum::{
    http::{header, Method, StatusCode},
    middleware,
    response::Json,
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Build the main application router
/// Returns Router<()> because state is already provided
pub fn build_router(ctx: AppContext) -> Router {
    // Create CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .merge(crate::api::routes(ctx.clone()))
        // Unknown paths still pass through the layers below
        .fallback(not_found)
        // Provide state - converts Router<AppContext> to Router<()>
        .with_state(ctx.clone())
        .layer(middleware::from_fn_with_state(ctx, general_rate_limit))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

/// 404 handler
async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "NotFound",
            "message": "Endpoint not found"
        })),
    )
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> DeskResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("Repair Desk listening on {}", addr);
    info!("   Service URL: {}", ctx.service_url());

    let app = build_router(ctx);

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| DeskError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    // Peer addresses feed the per-client rate limits
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| DeskError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
