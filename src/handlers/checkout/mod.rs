mod session;
mod verify;

pub use session::*;
pub use verify::*;

use axum::{Router, routing::post};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/checkout/session", post(create_checkout_session))
        .route("/checkout/verify", post(verify_checkout_session))
}
