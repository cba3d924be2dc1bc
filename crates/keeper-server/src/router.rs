use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all Keeper endpoints.
pub fn build_router(state: AppState, allow_cors: bool) -> Router {
    let router = Router::new()
        .route("/health", get(handler::health_handler))
        .route("/state", get(handler::get_state).post(handler::post_state))
        .route("/auth/handles/:handle", post(handler::issue_pairing))
        .route("/auth/redeem/:key", post(handler::redeem))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if allow_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
