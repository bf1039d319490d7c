use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::{CheckoutMetadata, CheckoutRequest, CreatedCheckout, PaymentGateway, to_major_units};
use crate::error::{AppError, Result, msg};

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Maximum age of a webhook timestamp before it's rejected (in seconds).
pub const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Allowed clock skew for webhook timestamps from the future.
pub const WEBHOOK_FUTURE_SKEW_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct CreateCheckoutSessionResponse {
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: Option<String>,
    api_base: String,
}

impl StripeClient {
    pub fn new(secret_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            secret_key,
            api_base: STRIPE_API_BASE.to_string(),
        }
    }

    fn secret_key(&self) -> Result<&str> {
        self.secret_key
            .as_deref()
            .ok_or_else(|| AppError::Internal(msg::STRIPE_NOT_CONFIGURED.into()))
    }

    async fn read_response<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&text)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or(text);
            return Err(AppError::Upstream(format!("Stripe API {}: {}", status, message)));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse Stripe response: {}", e)))
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CreatedCheckout> {
        let secret_key = self.secret_key()?;

        let mut form: Vec<(&str, String)> = vec![
            ("mode", "payment".into()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("client_reference_id", request.client_reference_id.clone()),
            ("line_items[0][quantity]", "1".into()),
            ("line_items[0][price_data][currency]", request.currency.clone()),
            ("line_items[0][price_data][unit_amount]", request.unit_amount.to_string()),
            (
                "line_items[0][price_data][product_data][name]",
                request.product_name.clone(),
            ),
        ];
        if let Some(email) = &request.customer_email {
            form.push(("customer_email", email.clone()));
        }
        let meta = &request.metadata;
        for (key, value) in [
            ("metadata[user_id]", &meta.user_id),
            ("metadata[course_id]", &meta.course_id),
            ("metadata[tariff_id]", &meta.tariff_id),
        ] {
            if let Some(v) = value {
                form.push((key, v.clone()));
            }
        }

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.api_base))
            .basic_auth(secret_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Stripe API error: {}", e)))?;

        let session: CreateCheckoutSessionResponse = Self::read_response(response).await?;
        Ok(CreatedCheckout {
            id: session.id,
            url: session.url,
        })
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<StripeCheckoutSession> {
        let secret_key = self.secret_key()?;

        let response = self
            .client
            .get(format!(
                "{}/checkout/sessions/{}",
                self.api_base,
                urlencoding::encode(session_id)
            ))
            .basic_auth(secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Stripe API error: {}", e)))?;

        Self::read_response(response).await
    }
}

/// Hex HMAC-SHA256 of `"<timestamp>." + payload` under the signing secret.
pub fn compute_webhook_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal(msg::WEBHOOK_SECRET_NOT_CONFIGURED.into()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a `stripe-signature` header (`t=<ts>,v1=<hex>[,v1=...]`) against the raw body.
///
/// Malformed headers are a `BadRequest`; a well-formed header that doesn't
/// match, or whose timestamp is outside the tolerance window, yields `Ok(false)`.
pub fn verify_webhook_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    now: i64,
) -> Result<bool> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = Some(t);
        } else if let Some(s) = part.strip_prefix("v1=") {
            signatures.push(s);
        }
    }

    let timestamp_str =
        timestamp.ok_or_else(|| AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()))?;
    if signatures.is_empty() {
        return Err(AppError::BadRequest(msg::INVALID_SIGNATURE_FORMAT.into()));
    }
    let timestamp: i64 = timestamp_str
        .parse()
        .map_err(|_| AppError::BadRequest(msg::INVALID_TIMESTAMP_IN_SIGNATURE.into()))?;

    let Some(age) = now.checked_sub(timestamp) else {
        tracing::warn!("Stripe webhook rejected: timestamp out of range ({})", timestamp);
        return Ok(false);
    };
    if age > WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
        tracing::warn!(
            "Stripe webhook rejected: timestamp too old (age={}s, max={}s)",
            age,
            WEBHOOK_TIMESTAMP_TOLERANCE_SECS
        );
        return Ok(false);
    }
    if age < -WEBHOOK_FUTURE_SKEW_SECS {
        tracing::warn!("Stripe webhook rejected: timestamp in the future (age={}s)", age);
        return Ok(false);
    }

    let expected = compute_webhook_signature(secret, timestamp, payload)?;
    let expected_bytes = expected.as_bytes();

    // Signature length is public (64 hex chars), only the content needs constant time.
    Ok(signatures.iter().any(|sig| {
        let provided = sig.as_bytes();
        provided.len() == expected_bytes.len() && bool::from(expected_bytes.ct_eq(provided))
    }))
}

/// Generic Stripe webhook event; `data.object` is parsed based on `type`.
#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// Checkout session object, as delivered in webhooks and returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    /// "paid", "unpaid" or "no_payment_required"
    pub payment_status: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<StripeCustomerDetails>,
    /// Total in minor units
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: CheckoutMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StripeCustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
}

impl StripeCheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }

    pub fn email(&self) -> Option<&str> {
        self.customer_email
            .as_deref()
            .or_else(|| self.customer_details.as_ref()?.email.as_deref())
    }

    /// Session total in major currency units.
    pub fn amount_major(&self) -> Option<f64> {
        self.amount_total.map(to_major_units)
    }

    /// Payment reference stored on the enrollment.
    pub fn payment_reference(&self) -> &str {
        self.payment_intent.as_deref().unwrap_or(&self.id)
    }
}
