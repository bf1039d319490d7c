use axum::extract::State;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::fulfillment::{self, Resolution};
use crate::middleware::AuthUser;
use crate::models::{CourseSummary, VerificationResponse, VerifyRequest};

/// Check a checkout session with the processor after the browser returns.
///
/// If the session is paid but the webhook has not landed yet, this runs the
/// same fulfillment the webhook would, so the buyer sees the course at once.
pub async fn verify_checkout_session(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerificationResponse>> {
    let session_id = request.session_id.trim();
    if session_id.is_empty() {
        return Err(AppError::BadRequest(msg::SESSION_ID_REQUIRED.into()));
    }

    let session = state.payments.retrieve_checkout_session(session_id).await?;

    if let Some(owner) = session.metadata.user_id.as_deref()
        && owner != user.id()
    {
        tracing::warn!(
            session_id = %session.id,
            caller = %user.id(),
            "Checkout verification by a different user"
        );
        return Err(AppError::Forbidden(
            msg::SESSION_BELONGS_TO_ANOTHER_USER.into(),
        ));
    }

    let conn = state.db.get()?;

    let course = match session.metadata.course_id.as_deref() {
        Some(course_id) => queries::get_course_by_id(&conn, course_id)?,
        None => None,
    };

    let mut enrollment = None;
    if session.is_paid() {
        match fulfillment::resolve_purchase(&conn, &session.metadata)? {
            Resolution::Resolved(purchase) => {
                enrollment = Some(fulfillment::fulfill_purchase(
                    &conn,
                    &session,
                    &purchase,
                    state.commission_percent,
                )?);
            }
            Resolution::Unresolved(reason) => {
                tracing::warn!(session_id = %session.id, "Paid session not fulfilled: {}", reason);
            }
        }
    }
    if enrollment.is_none()
        && let Some(course) = &course
    {
        enrollment = queries::get_enrollment(&conn, user.id(), &course.id)?;
    }

    Ok(Json(VerificationResponse {
        status: session.payment_status.clone(),
        session_id: session.id.clone(),
        customer_email: session.email().map(String::from),
        enrollment_activated: enrollment.is_some_and(|e| e.is_activated()),
        course: course.as_ref().map(CourseSummary::from),
        amount: session.amount_major(),
    }))
}
