//! Checkout session creation: POST /checkout/session

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

#[tokio::test]
async fn test_checkout_requires_token() {
    let app = TestApp::new();
    let catalog = create_test_catalog(&app.conn(), 49.0);

    let (status, _) = app
        .post(
            "/checkout/session",
            None,
            json!({"courseId": catalog.course.id, "tariffId": catalog.tariff.id}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .post(
            "/checkout/session",
            Some("not-a-jwt"),
            json!({"courseId": catalog.course.id, "tariffId": catalog.tariff.id}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.gateway.created_count(), 0);
}

#[tokio::test]
async fn test_checkout_token_from_other_issuer_rejected() {
    let app = TestApp::new();
    let catalog = create_test_catalog(&app.conn(), 49.0);
    let foreign = AccessTokens::new(b"some-other-secret", AUDIENCE)
        .unwrap()
        .issue("user-1", Some("user-1@example.com"), 3600)
        .unwrap();

    let (status, _) = app
        .post(
            "/checkout/session",
            Some(&foreign),
            json!({"courseId": catalog.course.id, "tariffId": catalog.tariff.id}),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_checkout_missing_ids_is_bad_request() {
    let app = TestApp::new();
    let token = app.token("user-1", "user-1@example.com");

    for body in [
        json!({}),
        json!({"courseId": "c1"}),
        json!({"tariffId": "t1"}),
        json!({"courseId": "  ", "tariffId": "t1"}),
    ] {
        let (status, body) = app.post("/checkout/session", Some(&token), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["details"], msg::COURSE_ID_REQUIRED);
    }
    assert_eq!(app.gateway.created_count(), 0);
}

#[tokio::test]
async fn test_checkout_unknown_or_inactive_course_is_not_found() {
    let app = TestApp::new();
    let token = app.token("user-1", "user-1@example.com");
    let (inactive, inactive_tariff) = {
        let conn = app.conn();
        let course = create_test_course(&conn, "archived", false);
        let tariff = create_test_tariff(&conn, &course.id, "Standard", 20.0);
        (course, tariff)
    };

    let (status, body) = app
        .post(
            "/checkout/session",
            Some(&token),
            json!({"courseId": "missing", "tariffId": "missing"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["details"], msg::COURSE_NOT_FOUND);

    let (status, _) = app
        .post(
            "/checkout/session",
            Some(&token),
            json!({"courseId": inactive.id, "tariffId": inactive_tariff.id}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.gateway.created_count(), 0);
}

#[tokio::test]
async fn test_checkout_tariff_must_belong_to_course() {
    let app = TestApp::new();
    let token = app.token("user-1", "user-1@example.com");
    let (catalog, other_tariff) = {
        let conn = app.conn();
        let catalog = create_test_catalog(&conn, 49.0);
        let other = create_test_course(&conn, "other-course", true);
        let other_tariff = create_test_tariff(&conn, &other.id, "Standard", 10.0);
        (catalog, other_tariff)
    };

    let (status, body) = app
        .post(
            "/checkout/session",
            Some(&token),
            json!({"courseId": catalog.course.id, "tariffId": other_tariff.id}),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["details"], msg::TARIFF_NOT_FOUND);
}

#[tokio::test]
async fn test_checkout_inactive_tariff_is_not_found() {
    let app = TestApp::new();
    let token = app.token("user-1", "user-1@example.com");
    let catalog = {
        let conn = app.conn();
        let catalog = create_test_catalog(&conn, 49.0);
        queries::update_tariff(
            &conn,
            &catalog.tariff.id,
            &UpdateTariff {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
        catalog
    };

    let (status, _) = app
        .post(
            "/checkout/session",
            Some(&token),
            json!({"courseId": catalog.course.id, "tariffId": catalog.tariff.id}),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_checkout_already_purchased_is_conflict_without_processor_call() {
    let app = TestApp::new();
    let token = app.token("user-1", "user-1@example.com");
    let catalog = {
        let conn = app.conn();
        let catalog = create_test_catalog(&conn, 49.0);
        create_test_profile(&conn, "user-1", "user-1@example.com");
        queries::upsert_paid_enrollment(
            &conn,
            &UpsertEnrollment {
                user_id: "user-1".into(),
                course_id: catalog.course.id.clone(),
                tariff_id: catalog.tariff.id.clone(),
                payment_id: "pi_earlier".into(),
                amount_paid: 49.0,
            },
        )
        .unwrap();
        catalog
    };

    let (status, body) = app
        .post(
            "/checkout/session",
            Some(&token),
            json!({"courseId": catalog.course.id, "tariffId": catalog.tariff.id}),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["details"], msg::ALREADY_PURCHASED);
    assert_eq!(app.gateway.created_count(), 0);
}

#[tokio::test]
async fn test_checkout_creates_processor_session() {
    let app = TestApp::new();
    let token = app.token("user-1", "Buyer@Example.com");
    let catalog = create_test_catalog(&app.conn(), 49.99);

    let (status, body) = app
        .post(
            "/checkout/session",
            Some(&token),
            json!({"courseId": catalog.course.id, "tariffId": catalog.tariff.id}),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sessionId"], "cs_test_1");
    assert_eq!(body["url"], "https://checkout.stripe.test/c/pay/cs_test_1");

    let request = app.gateway.last_created().expect("processor should be called");
    assert_eq!(request.unit_amount, 4999);
    assert_eq!(request.currency, "usd");
    assert_eq!(request.product_name, "Course rust-basics — Standard");
    assert_eq!(request.customer_email.as_deref(), Some("buyer@example.com"));
    assert_eq!(request.client_reference_id, "user-1");
    assert_eq!(
        request.metadata,
        CheckoutMetadata {
            user_id: Some("user-1".into()),
            course_id: Some(catalog.course.id.clone()),
            tariff_id: Some(catalog.tariff.id.clone()),
        }
    );
    assert_eq!(
        request.success_url,
        format!("{}/payment/success?session_id={{CHECKOUT_SESSION_ID}}", SITE_URL)
    );
    assert_eq!(request.cancel_url, format!("{}/courses/rust-basics", SITE_URL));

    let stored = queries::get_checkout_session(&app.conn(), "cs_test_1")
        .unwrap()
        .expect("checkout session should be recorded");
    assert_eq!(stored.user_id, "user-1");
    assert_eq!(stored.unit_amount, 4999);
    assert!(stored.completed_at.is_none());
}

#[tokio::test]
async fn test_checkout_rounds_price_to_minor_units() {
    let app = TestApp::new();
    let token = app.token("user-1", "user-1@example.com");
    let catalog = create_test_catalog(&app.conn(), 19.995);

    let (status, _) = app
        .post(
            "/checkout/session",
            Some(&token),
            json!({"courseId": catalog.course.id, "tariffId": catalog.tariff.id}),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let unit_amount = app.gateway.last_created().unwrap().unit_amount;
    assert!(unit_amount == 1999 || unit_amount == 2000, "got {}", unit_amount);
}

#[tokio::test]
async fn test_checkout_pending_enrollment_does_not_block() {
    let app = TestApp::new();
    let token = app.token("user-1", "user-1@example.com");
    let catalog = {
        let conn = app.conn();
        let catalog = create_test_catalog(&conn, 49.0);
        create_test_profile(&conn, "user-1", "user-1@example.com");
        conn.execute(
            "INSERT INTO enrollments (id, user_id, course_id, payment_status, status, created_at, updated_at)
             VALUES ('e1', 'user-1', ?1, 'pending', 'pending', 0, 0)",
            [&catalog.course.id],
        )
        .unwrap();
        catalog
    };

    let (status, _) = app
        .post(
            "/checkout/session",
            Some(&token),
            json!({"courseId": catalog.course.id, "tariffId": catalog.tariff.id}),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.gateway.created_count(), 1);
}

#[tokio::test]
async fn test_checkout_processor_failure_is_bad_gateway() {
    let app = TestApp::new();
    let token = app.token("user-1", "user-1@example.com");
    let catalog = create_test_catalog(&app.conn(), 49.0);
    app.gateway.fail_requests(true);

    let (status, body) = app
        .post(
            "/checkout/session",
            Some(&token),
            json!({"courseId": catalog.course.id, "tariffId": catalog.tariff.id}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Payment provider error");
    assert_eq!(count_rows(&app.conn(), "checkout_sessions"), 0);
}
