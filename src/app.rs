use axum::Router;
use tower_http::cors::CorsLayer;

use crate::routes::{health, messages, overview, positions, reports, review};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/api/messages", messages::router())
        .nest("/api/reports", reports::router())
        .nest("/api/review", review::router())
        .nest("/api/positions", positions::router())
        .nest("/api/overview", overview::router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
