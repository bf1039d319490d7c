pub mod account;
pub mod admin;
pub mod checkout;
pub mod partners;
pub mod public;
pub mod webhooks;

use axum::Router;

use crate::config::RateLimitConfig;
use crate::db::AppState;
use crate::rate_limit::{self, RateLimitLayer};

fn limited(router: Router<AppState>, layer: Option<RateLimitLayer>) -> Router<AppState> {
    match layer {
        Some(layer) => router.layer(layer),
        None => router,
    }
}

/// Full API router. Pass `None` for `rate_limit` where no peer address is
/// available (tests driving the router with `oneshot`).
pub fn router(state: AppState, rate_limit: Option<RateLimitConfig>) -> Router<AppState> {
    let strict = rate_limit.map(|r| rate_limit::strict_layer(r.strict_rpm));
    let standard = rate_limit.map(|r| rate_limit::standard_layer(r.standard_rpm));
    let relaxed = rate_limit.map(|r| rate_limit::relaxed_layer(r.relaxed_rpm));

    Router::new()
        // Catalog and health (no auth)
        .merge(limited(public::router(), relaxed))
        // Checkout and verification (bearer token, calls the processor)
        .merge(limited(checkout::router(), strict))
        // Student dashboard and referral attribution (bearer token)
        .merge(limited(account::router(), standard.clone()))
        // Partner portal (partner account)
        .merge(limited(partners::router(state.clone()), standard.clone()))
        // Admin panel (admin role)
        .merge(limited(admin::router(state), standard))
        // Processor webhooks (signature auth)
        .merge(webhooks::router())
}
