use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

use super::{chat, courses, profs};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat::chat))
        .route("/getprofs", post(profs::get_profs))
        .route("/getcourses", get(courses::get_courses))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(120)))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
