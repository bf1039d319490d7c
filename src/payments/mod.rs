mod stripe;

pub use stripe::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Buyer and purchase identifiers attached to a checkout session.
///
/// Every field is optional on the way back in: sessions created outside this
/// service (or by an older version) may carry no metadata at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckoutMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tariff_id: Option<String>,
}

impl CheckoutMetadata {
    /// Returns `(user_id, course_id, tariff_id)` when all three are present and non-empty.
    pub fn purchase(&self) -> Option<(&str, &str, &str)> {
        fn non_empty(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.is_empty())
        }
        Some((
            non_empty(&self.user_id)?,
            non_empty(&self.course_id)?,
            non_empty(&self.tariff_id)?,
        ))
    }
}

/// One-line-item payment session to open with the processor.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub product_name: String,
    /// Minor currency units
    pub unit_amount: i64,
    pub currency: String,
    pub customer_email: Option<String>,
    pub client_reference_id: String,
    pub metadata: CheckoutMetadata,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedCheckout {
    pub id: String,
    pub url: String,
}

/// Hosted checkout processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CreatedCheckout>;

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<StripeCheckoutSession>;
}

/// Convert a major-unit price to the processor's minor units.
pub fn to_minor_units(price: f64) -> i64 {
    (price * 100.0).round() as i64
}

pub fn to_major_units(amount: i64) -> f64 {
    amount as f64 / 100.0
}
