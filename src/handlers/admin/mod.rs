mod catalog;
mod enrollments;
mod partners;

pub use catalog::*;
pub use enrollments::*;
pub use partners::*;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::db::AppState;
use crate::middleware::admin_auth;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/courses", post(create_course).get(list_courses))
        .route("/admin/courses/{course_id}", put(update_course))
        .route("/admin/courses/{course_id}/tariffs", post(create_tariff))
        .route("/admin/tariffs/{tariff_id}", put(update_tariff))
        .route("/admin/enrollments", get(list_enrollments))
        .route("/admin/partners", post(create_partner).get(list_partners))
        .route("/admin/rewards/{reward_id}/mark-paid", post(mark_reward_paid))
        .layer(middleware::from_fn_with_state(state, admin_auth))
}
