use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ClientError, VerificationSource};
use crate::models::{CheckoutResponse, CreateCheckoutRequest, VerificationResponse, VerifyRequest};

/// HTTP client for the checkout endpoints, acting as one signed-in user.
#[derive(Clone)]
pub struct CoursePayClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl CoursePayClient {
    pub fn new(base_url: &str, access_token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        }
    }

    /// Start a checkout. Redirect the browser to the returned `url`.
    pub async fn create_checkout(
        &self,
        course_id: &str,
        tariff_id: &str,
    ) -> Result<CheckoutResponse, ClientError> {
        let body = CreateCheckoutRequest {
            course_id: course_id.to_string(),
            tariff_id: tariff_id.to_string(),
        };
        self.post_with_auth("/checkout/session", &body).await
    }

    pub async fn verify_checkout(&self, session_id: &str) -> Result<VerificationResponse, ClientError> {
        let body = VerifyRequest {
            session_id: session_id.to_string(),
        };
        self.post_with_auth("/checkout/verify", &body).await
    }

    async fn post_with_auth<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        handle_response(response).await
    }
}

impl std::fmt::Debug for CoursePayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoursePayClient")
            .field("base_url", &self.base_url)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

async fn handle_response<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let status = response.status().as_u16();

    if !response.status().is_success() {
        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<String>,
            details: Option<String>,
        }

        let error_body = response.json::<ErrorResponse>().await.ok();
        let message = match error_body {
            Some(ErrorResponse {
                error: Some(err),
                details: Some(details),
            }) => format!("{}: {}", err, details),
            Some(ErrorResponse {
                error: Some(err), ..
            }) => err,
            Some(ErrorResponse {
                details: Some(details),
                ..
            }) => details,
            _ => format!("Request failed: {}", status),
        };

        return Err(ClientError::Api { status, message });
    }

    response
        .json()
        .await
        .map_err(|e| ClientError::Decode(e.to_string()))
}

#[async_trait]
impl VerificationSource for CoursePayClient {
    async fn verify(&self, session_id: &str) -> Result<VerificationResponse, ClientError> {
        self.verify_checkout(session_id).await
    }
}
