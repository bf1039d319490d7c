use axum::{Extension, extract::State, http::StatusCode};

use crate::db::{AppState, queries};
use crate::error::{OptionExt, Result, ResultExt, msg};
use crate::extractors::{Json, Path};
use crate::middleware::AdminContext;
use crate::models::{CreatePartner, Partner, ReferralReward};

/// Turn an existing profile into a referral partner.
pub async fn create_partner(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Json(input): Json<CreatePartner>,
) -> Result<(StatusCode, Json<Partner>)> {
    input.validate()?;

    let conn = state.db.get()?;
    queries::get_profile_by_id(&conn, &input.user_id)?.or_not_found(msg::PROFILE_NOT_FOUND)?;
    let partner = queries::create_partner(&conn, &input).conflict_on_unique(msg::PARTNER_EXISTS)?;

    tracing::info!(admin = %ctx.profile.id, partner_id = %partner.id, "Partner created");
    Ok((StatusCode::CREATED, Json(partner)))
}

pub async fn list_partners(State(state): State<AppState>) -> Result<Json<Vec<Partner>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_partners(&conn)?))
}

/// Record that a pending reward has been paid out to the partner.
pub async fn mark_reward_paid(
    State(state): State<AppState>,
    Extension(ctx): Extension<AdminContext>,
    Path(reward_id): Path<String>,
) -> Result<Json<ReferralReward>> {
    let conn = state.db.get()?;
    let reward = queries::mark_reward_paid(&conn, &reward_id)?.or_not_found(msg::REWARD_NOT_FOUND)?;

    tracing::info!(admin = %ctx.profile.id, reward_id = %reward.id, amount = reward.amount, "Reward marked paid");
    Ok(Json(reward))
}
