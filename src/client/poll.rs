use std::time::Duration;

use async_trait::async_trait;

use super::ClientError;
use crate::models::VerificationResponse;

/// Delay before the single retry.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Anything that can answer "is this checkout session fulfilled yet?".
#[async_trait]
pub trait VerificationSource: Send + Sync {
    async fn verify(&self, session_id: &str) -> Result<VerificationResponse, ClientError>;
}

#[derive(Debug)]
pub enum PollOutcome {
    /// The enrollment is active; show the course.
    Activated(VerificationResponse),
    /// Payment may still be settling; tell the buyer access will appear shortly.
    Processing,
    /// The first verification call failed outright.
    Failed(ClientError),
}

impl PollOutcome {
    pub fn is_activated(&self) -> bool {
        matches!(self, PollOutcome::Activated(_))
    }
}

/// Verify once, and if the enrollment isn't active yet, wait `retry_delay`
/// and verify exactly one more time.
///
/// An error on the first call is reported as `Failed`. After the retry,
/// anything short of an activated enrollment (errors included) is `Processing`.
pub async fn poll_verification<V>(source: &V, session_id: &str, retry_delay: Duration) -> PollOutcome
where
    V: VerificationSource + ?Sized,
{
    match source.verify(session_id).await {
        Ok(response) if response.enrollment_activated => return PollOutcome::Activated(response),
        Ok(response) => {
            tracing::debug!(
                session_id,
                status = %response.status,
                "Enrollment not active yet, retrying in {:?}",
                retry_delay
            );
        }
        Err(e) => return PollOutcome::Failed(e),
    }

    tokio::time::sleep(retry_delay).await;

    match source.verify(session_id).await {
        Ok(response) if response.enrollment_activated => PollOutcome::Activated(response),
        Ok(_) => PollOutcome::Processing,
        Err(e) => {
            tracing::debug!(session_id, "Verification retry failed: {}", e);
            PollOutcome::Processing
        }
    }
}
