mod from_row;
mod schema;
pub mod queries;

pub use from_row::{FromRow, query_all, query_one};
pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::jwt::AccessTokens;
use crate::payments::PaymentGateway;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Checkout processor (Stripe in production, a fake in tests)
    pub payments: Arc<dyn PaymentGateway>,
    /// Verifier for hosted-auth access tokens
    pub tokens: Arc<AccessTokens>,
    /// Webhook signing secret. Webhooks are rejected while this is unset.
    pub webhook_secret: Option<String>,
    /// Public site base URL for checkout return URLs
    pub site_url: String,
    pub currency: String,
    pub commission_percent: u32,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    create_pool_with_size(database_path, 10)
}

pub fn create_pool_with_size(database_path: &str, max_size: u32) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
    });
    Pool::builder().max_size(max_size).build(manager)
}
