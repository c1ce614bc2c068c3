//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::StrydeError;

/// Wrap a future with a timeout.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, StrydeError>>,
) -> Result<T, StrydeError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(StrydeError::Timeout(duration.as_millis() as u64)),
    }
}
