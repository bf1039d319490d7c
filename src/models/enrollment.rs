use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EnrollmentStatus {
    Pending,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

/// Links a buyer to a purchased course. One row per (user_id, course_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub tariff_id: Option<String>,
    /// Processor payment reference (payment intent, or checkout session id)
    pub payment_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub amount_paid: Option<f64>,
    pub status: EnrollmentStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Enrollment {
    pub fn is_activated(&self) -> bool {
        self.status == EnrollmentStatus::Active && self.payment_status == PaymentStatus::Paid
    }
}

/// Values written by the enrollment upsert.
#[derive(Debug, Clone)]
pub struct UpsertEnrollment {
    pub user_id: String,
    pub course_id: String,
    pub tariff_id: String,
    pub payment_id: String,
    pub amount_paid: f64,
}

/// Enrollment joined with display fields for dashboards and admin lists.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentWithCourse {
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub course_slug: String,
    pub course_title: String,
    pub tariff_name: Option<String>,
    pub user_email: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct EnrollmentFilters {
    #[serde(default)]
    pub course_id: Option<String>,
}
