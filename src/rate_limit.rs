//! Per-IP rate limiting tiers.
//!
//! - Strict: /checkout/* (each request reaches the payment processor)
//! - Standard: signed-in student, partner and admin routes
//! - Relaxed: catalog and /health
//!
//! Webhooks are never limited.
//!
//! Configure via RATE_LIMIT_STRICT_RPM, RATE_LIMIT_STANDARD_RPM and
//! RATE_LIMIT_RELAXED_RPM (defaults 10/30/60).

use std::sync::Arc;
use std::time::Duration;

use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;

/// Rate limiter layer type alias using governor types directly
pub type RateLimitLayer = GovernorLayer<
    tower_governor::key_extractor::PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    axum::body::Body,
>;

/// Replenish one request every `60 / rpm` seconds with a burst of `rpm`.
fn create_layer(requests_per_minute: u32) -> RateLimitLayer {
    let requests_per_minute = requests_per_minute.max(1);
    let period_secs = (60 / requests_per_minute as u64).max(1);

    // Period and burst are both non-zero here, so the builder always succeeds.
    let config = GovernorConfigBuilder::default()
        .period(Duration::from_secs(period_secs))
        .burst_size(requests_per_minute)
        .finish()
        .expect("non-zero rate limit period and burst");

    GovernorLayer::new(Arc::new(config))
}

pub fn strict_layer(requests_per_minute: u32) -> RateLimitLayer {
    create_layer(requests_per_minute)
}

pub fn standard_layer(requests_per_minute: u32) -> RateLimitLayer {
    create_layer(requests_per_minute)
}

pub fn relaxed_layer(requests_per_minute: u32) -> RateLimitLayer {
    create_layer(requests_per_minute)
}
