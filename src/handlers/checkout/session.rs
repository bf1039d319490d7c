use axum::extract::State;

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::Json;
use crate::middleware::AuthUser;
use crate::models::{
    CheckoutResponse, CreateCheckoutRequest, CreateCheckoutSession, PaymentStatus,
};
use crate::payments::{CheckoutMetadata, CheckoutRequest, to_minor_units};

/// Open a processor checkout for one tariff of a course.
///
/// Buyers who already paid for the course are turned away with a 409 before
/// the processor is contacted.
pub async fn create_checkout_session(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateCheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let course_id = request.course_id.trim();
    let tariff_id = request.tariff_id.trim();
    if course_id.is_empty() || tariff_id.is_empty() {
        return Err(AppError::BadRequest(msg::COURSE_ID_REQUIRED.into()));
    }

    let (course, tariff) = {
        let conn = state.db.get()?;

        let course = queries::get_course_by_id(&conn, course_id)?
            .filter(|c| c.is_active)
            .or_not_found(msg::COURSE_NOT_FOUND)?;
        let tariff = queries::get_tariff_by_id(&conn, tariff_id)?
            .filter(|t| t.is_active && t.course_id == course.id)
            .or_not_found(msg::TARIFF_NOT_FOUND)?;

        let existing = queries::get_enrollment(&conn, user.id(), &course.id)?;
        if existing.is_some_and(|e| e.payment_status == PaymentStatus::Paid) {
            return Err(AppError::Conflict(msg::ALREADY_PURCHASED.into()));
        }

        (course, tariff)
    };

    let unit_amount = to_minor_units(tariff.price);
    let checkout = state
        .payments
        .create_checkout_session(&CheckoutRequest {
            product_name: format!("{} — {}", course.title, tariff.name),
            unit_amount,
            currency: state.currency.clone(),
            customer_email: user.email().map(String::from),
            client_reference_id: user.id().to_string(),
            metadata: CheckoutMetadata {
                user_id: Some(user.id().to_string()),
                course_id: Some(course.id.clone()),
                tariff_id: Some(tariff.id.clone()),
            },
            success_url: format!(
                "{}/payment/success?session_id={{CHECKOUT_SESSION_ID}}",
                state.site_url
            ),
            cancel_url: format!("{}/courses/{}", state.site_url, course.slug),
        })
        .await?;

    let conn = state.db.get()?;
    queries::create_checkout_session(
        &conn,
        &CreateCheckoutSession {
            id: checkout.id.clone(),
            user_id: user.id().to_string(),
            course_id: course.id.clone(),
            tariff_id: tariff.id.clone(),
            unit_amount,
            currency: state.currency.clone(),
        },
    )?;

    tracing::info!(
        session_id = %checkout.id,
        user_id = %user.id(),
        course = %course.slug,
        unit_amount,
        "Checkout session created"
    );

    Ok(Json(CheckoutResponse {
        url: checkout.url,
        session_id: checkout.id,
    }))
}
