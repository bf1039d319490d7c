use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    pub id: String,
    pub user_id: String,
    pub referral_code: String,
    pub is_active: bool,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePartner {
    pub user_id: String,
    pub referral_code: String,
}

impl CreatePartner {
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(AppError::BadRequest("userId is required".into()));
        }
        let code = self.referral_code.trim();
        let valid = (3..=32).contains(&code.len())
            && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(AppError::BadRequest(
                "referralCode must be 3-32 letters, digits or dashes".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TrackingStatus {
    Registered,
    Purchased,
}

/// Records that a buyer arrived through a partner's referral link.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralTracking {
    pub id: String,
    pub partner_id: Option<String>,
    pub user_id: String,
    pub status: TrackingStatus,
    pub created_at: i64,
    pub purchased_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TrackReferralRequest {
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RewardStatus {
    Pending,
    Paid,
}

/// Commission credited to a partner for one enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralReward {
    pub id: String,
    pub partner_id: String,
    pub tracking_id: String,
    pub enrollment_id: String,
    pub user_id: String,
    pub amount: f64,
    pub status: RewardStatus,
    pub created_at: i64,
    pub paid_at: Option<i64>,
}

/// Reward row as shown in the partner portal; the buyer email is masked.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerRewardView {
    pub id: String,
    pub amount: f64,
    pub status: RewardStatus,
    pub course_title: Option<String>,
    pub buyer_email: Option<String>,
    pub created_at: i64,
    pub paid_at: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerDashboard {
    pub referral_code: String,
    pub registered_count: i64,
    pub purchased_count: i64,
    pub total_earned: f64,
    pub pending_amount: f64,
    pub paid_amount: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referral_code_validation() {
        let ok = CreatePartner {
            user_id: "u1".into(),
            referral_code: "ANNA-2024".into(),
        };
        assert!(ok.validate().is_ok());

        let bad = CreatePartner {
            user_id: "u1".into(),
            referral_code: "a b".into(),
        };
        assert!(bad.validate().is_err());
    }
}
