//! coursepay - payment, enrollment and referral backend for a course-selling site
//!
//! This library provides the checkout flow (session creation, webhook-driven
//! enrollment activation, verification fallback), the referral ledger, and the
//! catalog, dashboard, partner and admin APIs around them.

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod fulfillment;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod payments;
pub mod rate_limit;
pub mod util;
