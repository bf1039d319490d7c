use serde::{Deserialize, Serialize};

use super::CourseSummary;

/// Local record of a processor checkout session created by this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    /// Processor session id (`cs_...`)
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub tariff_id: String,
    /// Minor currency units sent to the processor
    pub unit_amount: i64,
    pub currency: String,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct CreateCheckoutSession {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub tariff_id: String,
    pub unit_amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    #[serde(default)]
    pub course_id: String,
    #[serde(default)]
    pub tariff_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub url: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub session_id: String,
}

/// Result of checking a checkout session against the processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResponse {
    /// Processor `payment_status` (`paid`, `unpaid`, `no_payment_required`)
    pub status: String,
    pub session_id: String,
    pub customer_email: Option<String>,
    pub enrollment_activated: bool,
    pub course: Option<CourseSummary>,
    /// Session total in major currency units
    pub amount: Option<f64>,
}
