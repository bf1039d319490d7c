use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Error messages shared between handlers and tests.
pub mod msg {
    pub const COURSE_NOT_FOUND: &str = "Course not found";
    pub const TARIFF_NOT_FOUND: &str = "Tariff not found";
    pub const REWARD_NOT_FOUND: &str = "Reward not found";
    pub const REFERRAL_CODE_NOT_FOUND: &str = "Referral code not found";
    pub const PROFILE_NOT_FOUND: &str = "Profile not found";
    pub const SLUG_TAKEN: &str = "A course with this slug already exists";
    pub const PARTNER_EXISTS: &str = "User is already a partner or the referral code is taken";
    pub const REFERRAL_CODE_REQUIRED: &str = "code is required";
    pub const ALREADY_PURCHASED: &str = "Course already purchased";
    pub const COURSE_ID_REQUIRED: &str = "courseId and tariffId are required";
    pub const SESSION_ID_REQUIRED: &str = "session_id is required";
    pub const SESSION_BELONGS_TO_ANOTHER_USER: &str = "Checkout session belongs to another user";
    pub const SELF_REFERRAL: &str = "Partners cannot refer themselves";
    pub const ADMIN_REQUIRED: &str = "Admin role required";
    pub const PARTNER_REQUIRED: &str = "Partner account required";
    pub const MISSING_SIGNATURE: &str = "Missing stripe-signature header";
    pub const INVALID_SIGNATURE: &str = "Invalid signature";
    pub const INVALID_SIGNATURE_FORMAT: &str = "Invalid signature format";
    pub const INVALID_TIMESTAMP_IN_SIGNATURE: &str = "Invalid timestamp in signature";
    pub const WEBHOOK_SECRET_NOT_CONFIGURED: &str = "Webhook signing secret not configured";
    pub const STRIPE_NOT_CONFIGURED: &str = "Stripe secret key not configured";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Payment processor unreachable or returned an error
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone())),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "Forbidden", Some(msg.clone())),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", Some(msg.clone())),
            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Payment provider error", None)
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Converts `Option<T>` lookups into `NotFound` errors.
pub trait OptionExt<T> {
    fn or_not_found(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, message: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(message.to_string()))
    }
}

/// Maps UNIQUE constraint violations on insert/update to `Conflict`.
pub trait ResultExt<T> {
    fn conflict_on_unique(self, message: &str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn conflict_on_unique(self, message: &str) -> Result<T> {
        self.map_err(|e| match e {
            AppError::Database(ref db) if is_unique_violation(db) => {
                AppError::Conflict(message.to_string())
            }
            other => other,
        })
    }
}

/// Returns true when a rusqlite error is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
