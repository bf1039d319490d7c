use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::fulfillment::{self, Resolution};
use crate::payments::{
    CHECKOUT_SESSION_COMPLETED, StripeCheckoutSession, StripeWebhookEvent,
    verify_webhook_signature,
};

const PROVIDER: &str = "stripe";

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

const ACK: WebhookAck = WebhookAck { received: true };

/// Parsed webhook payload, reduced to what this service acts on.
#[derive(Debug)]
enum WebhookEvent {
    CheckoutCompleted(StripeCheckoutSession),
    Ignored,
}

fn parse_event(event: &StripeWebhookEvent) -> Result<WebhookEvent> {
    if event.event_type != CHECKOUT_SESSION_COMPLETED {
        return Ok(WebhookEvent::Ignored);
    }

    let session: StripeCheckoutSession = serde_json::from_value(event.data.object.clone())
        .map_err(|e| {
            tracing::error!("Failed to parse checkout session: {}", e);
            AppError::BadRequest("Invalid checkout session".into())
        })?;

    if !session.is_paid() {
        tracing::debug!(
            session_id = %session.id,
            payment_status = %session.payment_status,
            "Checkout completed without payment, ignoring"
        );
        return Ok(WebhookEvent::Ignored);
    }

    Ok(WebhookEvent::CheckoutCompleted(session))
}

fn extract_signature(headers: &HeaderMap) -> Result<&str> {
    headers
        .get("stripe-signature")
        .ok_or_else(|| AppError::BadRequest(msg::MISSING_SIGNATURE.into()))?
        .to_str()
        .map_err(|e| {
            tracing::debug!("Invalid UTF-8 in Stripe signature header: {}", e);
            AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into())
        })
}

/// Fulfill a paid session. Sessions that can never be fulfilled (missing
/// metadata, unknown course/tariff/buyer) are logged and acknowledged.
fn process_checkout(
    conn: &Connection,
    session: &StripeCheckoutSession,
    commission_percent: u32,
) -> Result<()> {
    match fulfillment::resolve_purchase(conn, &session.metadata)? {
        Resolution::Resolved(purchase) => {
            fulfillment::fulfill_purchase(conn, session, &purchase, commission_percent)?;
        }
        Resolution::Unresolved(reason) => {
            tracing::warn!(
                session_id = %session.id,
                "Stripe checkout not fulfilled: {}",
                reason
            );
        }
    }
    Ok(())
}

/// Axum handler for Stripe webhooks.
///
/// Nothing touches the database until the signature is accepted. Without a
/// configured signing secret every delivery is refused with a 500.
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let secret = state
        .webhook_secret
        .as_deref()
        .ok_or_else(|| AppError::Internal(msg::WEBHOOK_SECRET_NOT_CONFIGURED.into()))?;

    let signature = extract_signature(&headers)?;
    let now = chrono::Utc::now().timestamp();
    if !verify_webhook_signature(secret, &body, signature, now)? {
        tracing::warn!("Stripe webhook rejected: invalid signature");
        return Err(AppError::BadRequest(msg::INVALID_SIGNATURE.into()));
    }

    let event: StripeWebhookEvent = serde_json::from_slice(&body).map_err(|e| {
        tracing::error!("Failed to parse Stripe webhook: {}", e);
        AppError::BadRequest("Invalid event payload".into())
    })?;

    let conn = state.db.get()?;

    if queries::is_webhook_event_recorded(&conn, PROVIDER, &event.id)? {
        tracing::debug!(event_id = %event.id, "Stripe event already processed");
        return Ok(Json(ACK));
    }

    match parse_event(&event)? {
        WebhookEvent::CheckoutCompleted(session) => {
            process_checkout(&conn, &session, state.commission_percent)?;
        }
        WebhookEvent::Ignored => {
            tracing::debug!(event_type = %event.event_type, "Ignoring Stripe event");
        }
    }

    queries::record_webhook_event(&conn, PROVIDER, &event.id)?;
    Ok(Json(ACK))
}
