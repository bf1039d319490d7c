//! Stripe webhook receiver: POST /webhook/stripe

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

fn setup_buyer(app: &TestApp) -> Catalog {
    let conn = app.conn();
    create_test_profile(&conn, "buyer-1", "buyer-1@example.com");
    create_test_catalog(&conn, 49.99)
}

#[tokio::test]
async fn test_webhook_without_secret_is_refused_before_any_write() {
    let app = TestApp::without_webhook_secret();
    let catalog = setup_buyer(&app);
    let body = checkout_completed_event(
        "evt_1",
        &paid_session("cs_1", "buyer-1", &catalog, 4999),
    );

    let (status, _) = app.signed_webhook(&body).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let conn = app.conn();
    assert_eq!(count_rows(&conn, "enrollments"), 0);
    assert_eq!(count_rows(&conn, "webhook_events"), 0);
}

#[tokio::test]
async fn test_webhook_missing_signature_header() {
    let app = TestApp::new();
    let catalog = setup_buyer(&app);
    let body = checkout_completed_event(
        "evt_1",
        &paid_session("cs_1", "buyer-1", &catalog, 4999),
    );

    let (status, body) = app.webhook(&body, None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"], msg::MISSING_SIGNATURE);
    assert_eq!(count_rows(&app.conn(), "enrollments"), 0);
}

#[tokio::test]
async fn test_webhook_wrong_secret_rejected() {
    let app = TestApp::new();
    let catalog = setup_buyer(&app);
    let body = checkout_completed_event(
        "evt_1",
        &paid_session("cs_1", "buyer-1", &catalog, 4999),
    );
    let header = stripe_signature_header(&body, "whsec_attacker", now());

    let (status, resp) = app.webhook(&body, Some(&header)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["details"], msg::INVALID_SIGNATURE);
    let conn = app.conn();
    assert_eq!(count_rows(&conn, "enrollments"), 0);
    assert_eq!(count_rows(&conn, "webhook_events"), 0);
}

#[tokio::test]
async fn test_webhook_tampered_body_rejected() {
    let app = TestApp::new();
    let catalog = setup_buyer(&app);
    let original = checkout_completed_event(
        "evt_1",
        &paid_session("cs_1", "buyer-1", &catalog, 100),
    );
    let header = stripe_signature_header(&original, WEBHOOK_SECRET, now());
    let tampered = checkout_completed_event(
        "evt_1",
        &paid_session("cs_1", "buyer-1", &catalog, 4999),
    );

    let (status, _) = app.webhook(&tampered, Some(&header)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(count_rows(&app.conn(), "enrollments"), 0);
}

#[tokio::test]
async fn test_webhook_stale_timestamp_rejected() {
    let app = TestApp::new();
    let catalog = setup_buyer(&app);
    let body = checkout_completed_event(
        "evt_1",
        &paid_session("cs_1", "buyer-1", &catalog, 4999),
    );
    // 10 minutes old, outside the 5 minute tolerance
    let header = stripe_signature_header(&body, WEBHOOK_SECRET, now() - 600);

    let (status, _) = app.webhook(&body, Some(&header)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(count_rows(&app.conn(), "enrollments"), 0);
}

#[tokio::test]
async fn test_webhook_out_of_range_timestamp_rejected() {
    let app = TestApp::new();
    let catalog = setup_buyer(&app);
    let body = checkout_completed_event(
        "evt_1",
        &paid_session("cs_1", "buyer-1", &catalog, 4999),
    );

    for ts in [i64::MIN, i64::MAX] {
        let header = format!("t={},v1={}", ts, "0".repeat(64));
        let (status, _) = app.webhook(&body, Some(&header)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "timestamp {}", ts);
    }
    assert_eq!(count_rows(&app.conn(), "enrollments"), 0);
}

#[tokio::test]
async fn test_webhook_malformed_signature_header() {
    let app = TestApp::new();
    let body = br#"{"id":"evt_1","type":"ping","data":{"object":{}}}"#;

    for header in ["garbage", "t=abc,v1=deadbeef", "v1=deadbeef"] {
        let (status, _) = app.webhook(body, Some(header)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "header {:?}", header);
    }
}

#[tokio::test]
async fn test_webhook_paid_session_activates_enrollment() {
    let app = TestApp::new();
    let catalog = setup_buyer(&app);
    let body = checkout_completed_event(
        "evt_1",
        &paid_session("cs_1", "buyer-1", &catalog, 4999),
    );

    let (status, resp) = app.signed_webhook(&body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp, json!({"received": true}));

    let enrollment = queries::get_enrollment(&app.conn(), "buyer-1", &catalog.course.id)
        .unwrap()
        .expect("enrollment should exist");
    assert_eq!(enrollment.status, EnrollmentStatus::Active);
    assert_eq!(enrollment.payment_status, PaymentStatus::Paid);
    assert_eq!(enrollment.amount_paid, Some(49.99));
    assert_eq!(enrollment.payment_id.as_deref(), Some("pi_cs_1"));
    assert_eq!(enrollment.tariff_id.as_deref(), Some(catalog.tariff.id.as_str()));
}

#[tokio::test]
async fn test_webhook_without_amount_falls_back_to_tariff_price() {
    let app = TestApp::new();
    let catalog = setup_buyer(&app);
    let mut session = paid_session("cs_1", "buyer-1", &catalog, 0);
    session.amount_total = None;
    let body = checkout_completed_event("evt_1", &session);

    let (status, _) = app.signed_webhook(&body).await;

    assert_eq!(status, StatusCode::OK);
    let enrollment = queries::get_enrollment(&app.conn(), "buyer-1", &catalog.course.id)
        .unwrap()
        .unwrap();
    assert_eq!(enrollment.amount_paid, Some(49.99));
}

#[tokio::test]
async fn test_webhook_redelivery_is_idempotent() {
    let app = TestApp::new();
    let catalog = setup_buyer(&app);
    let body = checkout_completed_event(
        "evt_1",
        &paid_session("cs_1", "buyer-1", &catalog, 4999),
    );

    let (first, _) = app.signed_webhook(&body).await;
    let enrollment_id = queries::get_enrollment(&app.conn(), "buyer-1", &catalog.course.id)
        .unwrap()
        .unwrap()
        .id;
    let (second, resp) = app.signed_webhook(&body).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(resp["received"], true);

    let conn = app.conn();
    assert_eq!(count_rows(&conn, "enrollments"), 1);
    assert_eq!(count_rows(&conn, "webhook_events"), 1);
    let enrollment = queries::get_enrollment(&conn, "buyer-1", &catalog.course.id)
        .unwrap()
        .unwrap();
    assert_eq!(enrollment.id, enrollment_id);
}

#[tokio::test]
async fn test_webhook_new_event_for_same_session_keeps_one_enrollment() {
    let app = TestApp::new();
    let catalog = setup_buyer(&app);
    let session = paid_session("cs_1", "buyer-1", &catalog, 4999);

    app.signed_webhook(&checkout_completed_event("evt_1", &session)).await;
    let (status, _) = app
        .signed_webhook(&checkout_completed_event("evt_2", &session))
        .await;

    assert_eq!(status, StatusCode::OK);
    let conn = app.conn();
    assert_eq!(count_rows(&conn, "enrollments"), 1);
    assert_eq!(count_rows(&conn, "webhook_events"), 2);
}

#[tokio::test]
async fn test_webhook_marks_local_checkout_session_completed() {
    let app = TestApp::new();
    let catalog = setup_buyer(&app);
    queries::create_checkout_session(
        &app.conn(),
        &CreateCheckoutSession {
            id: "cs_1".into(),
            user_id: "buyer-1".into(),
            course_id: catalog.course.id.clone(),
            tariff_id: catalog.tariff.id.clone(),
            unit_amount: 4999,
            currency: "usd".into(),
        },
    )
    .unwrap();

    let body = checkout_completed_event(
        "evt_1",
        &paid_session("cs_1", "buyer-1", &catalog, 4999),
    );
    app.signed_webhook(&body).await;

    let stored = queries::get_checkout_session(&app.conn(), "cs_1")
        .unwrap()
        .unwrap();
    assert!(stored.completed_at.is_some());
}

#[tokio::test]
async fn test_webhook_missing_metadata_is_acknowledged() {
    let app = TestApp::new();
    let catalog = setup_buyer(&app);
    let mut session = paid_session("cs_1", "buyer-1", &catalog, 4999);
    session.metadata = CheckoutMetadata::default();
    let body = checkout_completed_event("evt_1", &session);

    let (status, resp) = app.signed_webhook(&body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["received"], true);
    let conn = app.conn();
    assert_eq!(count_rows(&conn, "enrollments"), 0);
    assert_eq!(count_rows(&conn, "webhook_events"), 1);
}

#[tokio::test]
async fn test_webhook_unknown_course_is_acknowledged() {
    let app = TestApp::new();
    let catalog = setup_buyer(&app);
    let mut session = paid_session("cs_1", "buyer-1", &catalog, 4999);
    session.metadata.course_id = Some("deleted-course".into());
    let body = checkout_completed_event("evt_1", &session);

    let (status, _) = app.signed_webhook(&body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(count_rows(&app.conn(), "enrollments"), 0);
}

#[tokio::test]
async fn test_webhook_unknown_buyer_is_acknowledged() {
    let app = TestApp::new();
    let catalog = setup_buyer(&app);
    let body = checkout_completed_event(
        "evt_1",
        &paid_session("cs_1", "never-signed-in", &catalog, 4999),
    );

    let (status, _) = app.signed_webhook(&body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(count_rows(&app.conn(), "enrollments"), 0);
}

#[tokio::test]
async fn test_webhook_unpaid_session_is_ignored() {
    let app = TestApp::new();
    let catalog = setup_buyer(&app);
    let mut session = paid_session("cs_1", "buyer-1", &catalog, 4999);
    session.payment_status = "unpaid".into();
    let body = checkout_completed_event("evt_1", &session);

    let (status, _) = app.signed_webhook(&body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(count_rows(&app.conn(), "enrollments"), 0);
}

#[tokio::test]
async fn test_webhook_other_event_types_are_acknowledged() {
    let app = TestApp::new();
    let body = serde_json::to_vec(&json!({
        "id": "evt_refund",
        "type": "charge.refunded",
        "data": {"object": {"id": "ch_1"}}
    }))
    .unwrap();

    let (status, resp) = app.signed_webhook(&body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["received"], true);
    assert_eq!(count_rows(&app.conn(), "enrollments"), 0);
}

#[tokio::test]
async fn test_webhook_unparsable_body_with_valid_signature() {
    let app = TestApp::new();
    let body = b"not json at all";

    let (status, _) = app.signed_webhook(body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(count_rows(&app.conn(), "webhook_events"), 0);
}
