use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::authenticate;
use crate::db::AppState;
use crate::error::{AppError, msg};
use crate::models::Profile;

#[derive(Clone)]
pub struct AdminContext {
    pub profile: Profile,
}

/// Admin panel guard: 401 without a valid token, 403 unless the profile role is admin.
pub async fn admin_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let profile = authenticate(&state, request.headers())?;

    if !profile.is_admin() {
        tracing::debug!(user_id = %profile.id, "Rejected non-admin on admin route");
        return Err(AppError::Forbidden(msg::ADMIN_REQUIRED.into()));
    }

    request.extensions_mut().insert(AdminContext { profile });
    Ok(next.run(request).await)
}
