mod courses;

pub use courses::*;

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::db::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Unauthenticated catalog routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/courses", get(list_courses))
        .route("/courses/{slug}", get(get_course))
}
