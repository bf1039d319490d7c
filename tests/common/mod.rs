//! Test utilities and fixtures for coursepay integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use rusqlite::Connection;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

pub use coursepay::db::{AppState, DbPool, create_pool_with_size, init_db, queries};
pub use coursepay::error::{AppError, Result, msg};
pub use coursepay::handlers;
pub use coursepay::jwt::AccessTokens;
pub use coursepay::models::*;
pub use coursepay::payments::{
    CheckoutMetadata, CheckoutRequest, CreatedCheckout, PaymentGateway, StripeCheckoutSession,
};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const JWT_SECRET: &[u8] = b"test-jwt-secret-for-integration-tests";
pub const AUDIENCE: &str = "authenticated";
pub const SITE_URL: &str = "https://school.example.com";

// ============ Fake payment processor ============

/// In-memory stand-in for Stripe. Records created sessions and serves
/// whatever sessions a test registers for retrieval.
#[derive(Default)]
pub struct FakeGateway {
    pub created: Mutex<Vec<CheckoutRequest>>,
    sessions: Mutex<HashMap<String, StripeCheckoutSession>>,
    failing: Mutex<bool>,
}

impl FakeGateway {
    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn last_created(&self) -> Option<CheckoutRequest> {
        self.created.lock().unwrap().last().cloned()
    }

    /// Make every processor call fail with an upstream error.
    pub fn fail_requests(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn put_session(&self, session: StripeCheckoutSession) {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session);
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CreatedCheckout> {
        if *self.failing.lock().unwrap() {
            return Err(AppError::Upstream("fake processor down".into()));
        }
        let mut created = self.created.lock().unwrap();
        created.push(request.clone());
        let id = format!("cs_test_{}", created.len());
        Ok(CreatedCheckout {
            url: format!("https://checkout.stripe.test/c/pay/{}", id),
            id,
        })
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<StripeCheckoutSession> {
        if *self.failing.lock().unwrap() {
            return Err(AppError::Upstream("fake processor down".into()));
        }
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| AppError::Upstream(format!("No such checkout.session: {}", session_id)))
    }
}

// ============ App harness ============

pub struct TestApp {
    /// Keeps the database file alive for the test's duration
    _dir: TempDir,
    pub state: AppState,
    pub gateway: Arc<FakeGateway>,
    pub tokens: Arc<AccessTokens>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(Some(WEBHOOK_SECRET.to_string()))
    }

    pub fn without_webhook_secret() -> Self {
        Self::build(None)
    }

    fn build(webhook_secret: Option<String>) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("coursepay-test.db");
        let pool = create_pool_with_size(path.to_str().unwrap(), 4)
            .expect("Failed to create test pool");
        {
            let conn = pool.get().unwrap();
            init_db(&conn).expect("Failed to initialize schema");
        }

        let gateway = Arc::new(FakeGateway::default());
        let tokens = Arc::new(AccessTokens::new(JWT_SECRET, AUDIENCE).unwrap());

        let state = AppState {
            db: pool,
            payments: gateway.clone(),
            tokens: tokens.clone(),
            webhook_secret,
            site_url: SITE_URL.to_string(),
            currency: "usd".to_string(),
            commission_percent: 10,
        };

        Self {
            _dir: dir,
            state,
            gateway,
            tokens,
        }
    }

    pub fn router(&self) -> Router {
        handlers::router(self.state.clone(), None).with_state(self.state.clone())
    }

    pub fn conn(&self) -> r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager> {
        self.state.db.get().expect("Failed to get connection")
    }

    /// Access token for a user, signed like the auth provider would.
    pub fn token(&self, user_id: &str, email: &str) -> String {
        self.tokens
            .issue(user_id, Some(email), 3600)
            .expect("Failed to issue token")
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send("GET", uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send("PUT", uri, token, Some(body)).await
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        send_request(self.router(), request).await
    }

    /// Deliver a webhook body with the given `stripe-signature` header (if any).
    pub async fn webhook(&self, body: &[u8], signature: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook/stripe")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header("stripe-signature", signature);
        }
        let request = builder.body(Body::from(body.to_vec())).unwrap();
        send_request(self.router(), request).await
    }

    /// Deliver a correctly signed webhook.
    pub async fn signed_webhook(&self, body: &[u8]) -> (StatusCode, Value) {
        let header = stripe_signature_header(body, WEBHOOK_SECRET, now());
        self.webhook(body, Some(&header)).await
    }
}

pub async fn send_request(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

// ============ Fixtures ============

pub struct Catalog {
    pub course: Course,
    pub tariff: Tariff,
}

pub fn create_test_course(conn: &Connection, slug: &str, is_active: bool) -> Course {
    queries::create_course(
        conn,
        &CreateCourse {
            slug: slug.to_string(),
            title: format!("Course {}", slug),
            description: None,
            is_active,
        },
    )
    .expect("Failed to create test course")
}

pub fn create_test_tariff(conn: &Connection, course_id: &str, name: &str, price: f64) -> Tariff {
    queries::create_tariff(
        conn,
        course_id,
        &CreateTariff {
            name: name.to_string(),
            price,
            is_active: true,
            sort_order: 0,
        },
    )
    .expect("Failed to create test tariff")
}

/// One active course with one active tariff.
pub fn create_test_catalog(conn: &Connection, price: f64) -> Catalog {
    let course = create_test_course(conn, "rust-basics", true);
    let tariff = create_test_tariff(conn, &course.id, "Standard", price);
    Catalog { course, tariff }
}

pub fn create_test_profile(conn: &Connection, id: &str, email: &str) -> Profile {
    queries::ensure_profile(conn, id, Some(email)).expect("Failed to create test profile")
}

pub fn create_test_admin(conn: &Connection, id: &str, email: &str) -> Profile {
    create_test_profile(conn, id, email);
    queries::set_profile_role(conn, id, ProfileRole::Admin)
        .expect("Failed to set role")
        .expect("Profile should exist")
}

pub fn create_test_partner(conn: &Connection, user_id: &str, email: &str, code: &str) -> Partner {
    create_test_profile(conn, user_id, email);
    queries::create_partner(
        conn,
        &CreatePartner {
            user_id: user_id.to_string(),
            referral_code: code.to_string(),
        },
    )
    .expect("Failed to create test partner")
}

/// A processor session as `retrieve` or a webhook would return it.
pub fn paid_session(
    session_id: &str,
    user_id: &str,
    catalog: &Catalog,
    amount_total: i64,
) -> StripeCheckoutSession {
    StripeCheckoutSession {
        id: session_id.to_string(),
        payment_status: "paid".to_string(),
        customer_email: Some(format!("{}@example.com", user_id)),
        amount_total: Some(amount_total),
        currency: Some("usd".to_string()),
        payment_intent: Some(format!("pi_{}", session_id)),
        client_reference_id: Some(user_id.to_string()),
        metadata: CheckoutMetadata {
            user_id: Some(user_id.to_string()),
            course_id: Some(catalog.course.id.clone()),
            tariff_id: Some(catalog.tariff.id.clone()),
        },
        ..Default::default()
    }
}

/// A `checkout.session.completed` event body wrapping `session`.
pub fn checkout_completed_event(event_id: &str, session: &StripeCheckoutSession) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "data": { "object": session }
    }))
    .unwrap()
}

/// Stripe-style signature header computed independently of the crate.
pub fn stripe_signature_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(format!("{}.", timestamp).as_bytes());
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
    .unwrap()
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
