pub mod stripe;

pub use stripe::handle_stripe_webhook;

use axum::{Router, routing::post};

use crate::db::AppState;

/// Processor callbacks. Authenticated by signature, never rate limited.
pub fn router() -> Router<AppState> {
    Router::new().route("/webhook/stripe", post(handle_stripe_webhook))
}
