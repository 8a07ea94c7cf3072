/// API routes and handlers
pub mod auth;
pub mod health;
pub mod middleware;
pub mod users;

use crate::context::AppContext;
use axum::{middleware::from_fn_with_state, routing::post, Router};

/// Build API routes
pub fn routes(ctx: AppContext) -> Router<AppContext> {
    // Starting a challenge sends mail, so it has its own quota
    let challenge_starts = Router::new()
        .route("/auth/login", post(auth::start_login))
        .route("/auth/register", post(auth::start_registration))
        .route_layer(from_fn_with_state(ctx, middleware::challenge_rate_limit));

    Router::new()
        .merge(health::routes())
        .merge(challenge_starts)
        .merge(auth::routes())
        .merge(users::routes())
}
