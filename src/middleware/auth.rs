use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::Profile;
use crate::util::extract_bearer_token;

/// Verify the bearer token and load (or create) the caller's profile.
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Profile> {
    let token = extract_bearer_token(headers).ok_or(AppError::Unauthorized)?;
    let claims = state.tokens.verify(token)?;

    let conn = state.db.get()?;
    queries::ensure_profile(&conn, &claims.user_id, claims.email.as_deref())
}

/// Signed-in caller. Rejects with 401 when the token is missing or invalid.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Profile);

impl AuthUser {
    pub fn id(&self) -> &str {
        &self.0.id
    }

    pub fn email(&self) -> Option<&str> {
        self.0.email.as_deref()
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        authenticate(state, &parts.headers).map(AuthUser)
    }
}
