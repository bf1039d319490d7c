use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::authenticate;
use crate::db::{AppState, queries};
use crate::error::{AppError, msg};
use crate::models::{Partner, Profile};

#[derive(Clone)]
pub struct PartnerContext {
    pub profile: Profile,
    pub partner: Partner,
}

/// Partner portal guard: the caller must own an active partner account.
pub async fn partner_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let profile = authenticate(&state, request.headers())?;

    let partner = {
        let conn = state.db.get()?;
        queries::get_partner_by_user_id(&conn, &profile.id)?
    }
    .filter(|p| p.is_active)
    .ok_or_else(|| AppError::Forbidden(msg::PARTNER_REQUIRED.into()))?;

    request
        .extensions_mut()
        .insert(PartnerContext { profile, partner });
    Ok(next.run(request).await)
}
