//! Hosted-auth access token verification.
//!
//! The auth provider signs access tokens with a shared HS256 secret. The
//! subject is the user id; `email` is a custom top-level claim.

use std::collections::HashSet;

use jwt_simple::prelude::{Claims, Duration, HS256Key, MACLike, VerificationOptions};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Custom (non-standard) claims carried by access tokens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Identity extracted from a verified access token.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthClaims {
    pub user_id: String,
    pub email: Option<String>,
}

/// jwt-simple refuses HS256 keys shorter than 96 bits.
pub const MIN_SECRET_LEN: usize = 12;

pub struct AccessTokens {
    key: HS256Key,
    audience: String,
}

impl AccessTokens {
    pub fn new(secret: &[u8], audience: impl Into<String>) -> Result<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AppError::Internal(format!(
                "Access token secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        Ok(Self {
            key: HS256Key::from_bytes(secret),
            audience: audience.into(),
        })
    }

    /// Random key, for dev mode without a configured secret.
    pub fn generate(audience: impl Into<String>) -> Self {
        Self {
            key: HS256Key::generate(),
            audience: audience.into(),
        }
    }

    pub fn verify(&self, token: &str) -> Result<AuthClaims> {
        let mut allowed_audiences = HashSet::new();
        allowed_audiences.insert(self.audience.clone());

        let options = VerificationOptions {
            allowed_audiences: Some(allowed_audiences),
            ..Default::default()
        };

        let verified = self
            .key
            .verify_token::<TokenClaims>(token, Some(options))
            .map_err(|e| {
                tracing::debug!("Access token rejected: {}", e);
                AppError::Unauthorized
            })?;

        let user_id = verified
            .subject
            .filter(|s| !s.is_empty())
            .ok_or(AppError::Unauthorized)?;

        Ok(AuthClaims {
            user_id,
            email: verified.custom.email,
        })
    }

    /// Sign a token the way the auth provider does. Used for seeding and tests.
    pub fn issue(&self, user_id: &str, email: Option<&str>, valid_for_secs: u64) -> Result<String> {
        let custom = TokenClaims {
            email: email.map(String::from),
        };
        let claims = Claims::with_custom_claims(custom, Duration::from_secs(valid_for_secs))
            .with_subject(user_id)
            .with_audience(&self.audience);
        self.key
            .authenticate(claims)
            .map_err(|e| AppError::Internal(format!("Failed to sign access token: {}", e)))
    }
}
