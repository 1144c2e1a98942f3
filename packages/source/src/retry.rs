//! Bounded retry with exponential backoff for upstream requests.
//!
//! Only server errors (HTTP 5xx) are retried. Any other status is handed
//! back to the caller as-is, including 4xx, so the caller decides what a
//! non-success means. Transport errors propagate on the first occurrence.
//!
//! ```ignore
//! let response = retry::retry_fetch(&RetryPolicy::default(), || client.get(&url).send()).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::SourceError;

/// Number of attempts made before giving up on a 5xx response.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay before the first retry. Doubles on each subsequent retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait before the second attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Wait after the given 1-based attempt fails: `base * 2^(attempt - 1)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1_u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Anything that carries an HTTP status code.
pub trait HttpStatus {
    /// Numeric status code.
    fn status_code(&self) -> u16;

    /// Whether the status is in the 5xx range.
    fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status_code())
    }
}

impl HttpStatus for reqwest::Response {
    fn status_code(&self) -> u16 {
        self.status().as_u16()
    }
}

/// Calls `send` until it yields a non-5xx response or attempts run out.
///
/// `send` is invoked once per attempt so it can build a fresh request each
/// time. After the final attempt the last response is returned even if it is
/// still a server error.
///
/// # Errors
///
/// * The error from `send`, unchanged, if a transport error occurs.
/// * [`SourceError::NoResponse`] if `policy.max_attempts` is zero.
#[allow(clippy::future_not_send)]
pub async fn retry_fetch<R, E, F, Fut>(policy: &RetryPolicy, mut send: F) -> Result<R, SourceError>
where
    R: HttpStatus,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, E>>,
    SourceError: From<E>,
{
    for attempt in 1..=policy.max_attempts {
        let response = send().await?;

        if !response.is_server_error() {
            return Ok(response);
        }

        if attempt == policy.max_attempts {
            log::warn!(
                "HTTP {} after {attempt} attempts, giving up",
                response.status_code()
            );
            return Ok(response);
        }

        let delay = policy.delay_for(attempt);
        log::warn!(
            "HTTP {} (attempt {attempt}/{}), retrying in {delay:?}...",
            response.status_code(),
            policy.max_attempts
        );
        tokio::time::sleep(delay).await;
    }

    Err(SourceError::NoResponse)
}
