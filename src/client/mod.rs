//! Client side of the checkout flow.
//!
//! [`CoursePayClient`] talks to the checkout endpoints over HTTP.
//! [`poll_verification`] is what the payment-success page runs after the
//! processor redirects back: it bridges the gap until the webhook lands.

mod http;
mod poll;

pub use http::*;
pub use poll::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response; `message` comes from the `{error, details}` body.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
