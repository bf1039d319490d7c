//! Enrollment activation and referral crediting for paid checkout sessions.
//!
//! Both the webhook receiver and the verification endpoint call
//! [`fulfill_purchase`]. The enrollment upsert keyed on `(user_id, course_id)`
//! and the unique `enrollment_id` on rewards make repeated calls converge on
//! the same rows.

use std::fmt;

use rusqlite::Connection;

use crate::db::queries::{self, NewReward};
use crate::error::Result;
use crate::models::{Course, Enrollment, ReferralReward, Tariff, UpsertEnrollment};
use crate::payments::{CheckoutMetadata, StripeCheckoutSession};
use crate::util::round_money;

/// Buyer, course and tariff named by a session's metadata, all known locally.
#[derive(Debug, Clone)]
pub struct Purchase {
    pub user_id: String,
    pub course: Course,
    pub tariff: Tariff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unresolved {
    MissingMetadata,
    UnknownCourse,
    UnknownTariff,
    UnknownBuyer,
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Unresolved::MissingMetadata => "missing user_id/course_id/tariff_id metadata",
            Unresolved::UnknownCourse => "course does not exist",
            Unresolved::UnknownTariff => "tariff does not exist or belongs to another course",
            Unresolved::UnknownBuyer => "buyer profile does not exist",
        };
        f.write_str(text)
    }
}

pub enum Resolution {
    Resolved(Purchase),
    Unresolved(Unresolved),
}

/// Look up everything the metadata points at.
pub fn resolve_purchase(conn: &Connection, metadata: &CheckoutMetadata) -> Result<Resolution> {
    let Some((user_id, course_id, tariff_id)) = metadata.purchase() else {
        return Ok(Resolution::Unresolved(Unresolved::MissingMetadata));
    };

    let Some(course) = queries::get_course_by_id(conn, course_id)? else {
        return Ok(Resolution::Unresolved(Unresolved::UnknownCourse));
    };
    let tariff = match queries::get_tariff_by_id(conn, tariff_id)? {
        Some(t) if t.course_id == course.id => t,
        _ => return Ok(Resolution::Unresolved(Unresolved::UnknownTariff)),
    };
    if queries::get_profile_by_id(conn, user_id)?.is_none() {
        return Ok(Resolution::Unresolved(Unresolved::UnknownBuyer));
    }

    Ok(Resolution::Resolved(Purchase {
        user_id: user_id.to_string(),
        course,
        tariff,
    }))
}

/// Activate the enrollment for a paid session, then credit the referral partner.
///
/// Only the enrollment write can fail this call. Checkout bookkeeping and
/// referral crediting errors are logged and dropped.
pub fn fulfill_purchase(
    conn: &Connection,
    session: &StripeCheckoutSession,
    purchase: &Purchase,
    commission_percent: u32,
) -> Result<Enrollment> {
    let amount_paid = session.amount_major().unwrap_or(purchase.tariff.price);

    let enrollment = queries::upsert_paid_enrollment(
        conn,
        &UpsertEnrollment {
            user_id: purchase.user_id.clone(),
            course_id: purchase.course.id.clone(),
            tariff_id: purchase.tariff.id.clone(),
            payment_id: session.payment_reference().to_string(),
            amount_paid,
        },
    )?;

    tracing::info!(
        session_id = %session.id,
        user_id = %purchase.user_id,
        course = %purchase.course.slug,
        amount_paid,
        "Enrollment activated"
    );

    if let Err(e) = queries::mark_checkout_session_completed(conn, &session.id) {
        tracing::warn!(session_id = %session.id, "Failed to mark checkout session completed: {}", e);
    }

    if let Err(e) = credit_referral(conn, &enrollment, commission_percent) {
        tracing::warn!(
            enrollment_id = %enrollment.id,
            "Referral crediting failed, enrollment kept: {}",
            e
        );
    }

    Ok(enrollment)
}

/// Credit the buyer's referring partner for an enrollment, at most once.
///
/// Uses the buyer's most recent tracking row. Returns the new reward, or None
/// when there is nobody to credit or the enrollment was already credited.
pub fn credit_referral(
    conn: &Connection,
    enrollment: &Enrollment,
    commission_percent: u32,
) -> Result<Option<ReferralReward>> {
    let Some(tracking) = queries::get_latest_tracking_for_user(conn, &enrollment.user_id)? else {
        return Ok(None);
    };
    let Some(partner_id) = tracking.partner_id.as_deref() else {
        return Ok(None);
    };
    let partner = match queries::get_partner_by_id(conn, partner_id)? {
        Some(p) if p.is_active => p,
        _ => return Ok(None),
    };
    if partner.user_id == enrollment.user_id {
        return Ok(None);
    }

    let paid = enrollment.amount_paid.unwrap_or(0.0);
    let amount = round_money(paid * f64::from(commission_percent) / 100.0);
    if amount <= 0.0 {
        return Ok(None);
    }

    let reward = queries::try_create_reward(
        conn,
        &NewReward {
            partner_id: &partner.id,
            tracking_id: &tracking.id,
            enrollment_id: &enrollment.id,
            user_id: &enrollment.user_id,
            amount,
        },
    )?;

    match &reward {
        Some(r) => {
            queries::mark_tracking_purchased(conn, &tracking.id)?;
            tracing::info!(
                partner_id = %partner.id,
                enrollment_id = %enrollment.id,
                amount = r.amount,
                "Referral reward credited"
            );
        }
        None => {
            tracing::debug!(enrollment_id = %enrollment.id, "Enrollment already credited");
        }
    }

    Ok(reward)
}
