//! Signed-in student routes: dashboard enrollments and referral attribution.

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::Json;
use crate::middleware::AuthUser;
use crate::models::{
    EnrollmentWithCourse, ReferralTracking, TrackReferralRequest, TrackingStatus,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me/enrollments", get(list_my_enrollments))
        .route("/referrals/track", post(track_referral))
}

pub async fn list_my_enrollments(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<EnrollmentWithCourse>>> {
    let conn = state.db.get()?;
    let enrollments = queries::list_active_enrollments_for_user(&conn, user.id())?;
    Ok(Json(enrollments))
}

/// Attribute the caller to a partner's referral code.
///
/// Repeating the same code is a no-op; a different code starts a new
/// attribution, and the latest one wins at purchase time.
pub async fn track_referral(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<TrackReferralRequest>,
) -> Result<Json<ReferralTracking>> {
    let code = request.code.trim();
    if code.is_empty() {
        return Err(AppError::BadRequest(msg::REFERRAL_CODE_REQUIRED.into()));
    }

    let conn = state.db.get()?;

    let partner = queries::get_partner_by_code(&conn, code)?
        .filter(|p| p.is_active)
        .or_not_found(msg::REFERRAL_CODE_NOT_FOUND)?;
    if partner.user_id == user.id() {
        return Err(AppError::BadRequest(msg::SELF_REFERRAL.into()));
    }

    if let Some(latest) = queries::get_latest_tracking_for_user(&conn, user.id())?
        && latest.partner_id.as_deref() == Some(partner.id.as_str())
        && latest.status == TrackingStatus::Registered
    {
        return Ok(Json(latest));
    }

    let tracking = queries::create_tracking(&conn, &partner.id, user.id())?;
    tracing::info!(partner_id = %partner.id, user_id = %user.id(), "Referral tracked");

    Ok(Json(tracking))
}
