//! Retry policy applied to the snapshot request.
//!
//! The retry dimension is the number of attempts, not elapsed time: the
//! exponential schedule never runs out on its own and the fetcher stops once
//! [`RetryPolicy::max_attempts`] requests have failed.

use backoff::ExponentialBackoff;
use backoff::ExponentialBackoffBuilder;
use chrono::DateTime;
use chrono::Utc;
use reqwest::header::HeaderMap;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use std::num::NonZeroU32;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(120);
pub const DEFAULT_RETRY_STATUSES: [StatusCode; 5] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: NonZeroU32,
    retry_statuses: Vec<StatusCode>,
    backoff_base: Duration,
    max_backoff: Duration,
    honor_retry_after: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: NonZeroU32::new(DEFAULT_MAX_ATTEMPTS).unwrap_or(NonZeroU32::MIN),
            retry_statuses: DEFAULT_RETRY_STATUSES.to_vec(),
            backoff_base: DEFAULT_BACKOFF_BASE,
            max_backoff: DEFAULT_MAX_BACKOFF,
            honor_retry_after: true,
        }
    }
}

impl RetryPolicy {
    /// A policy making a single attempt.
    pub fn no_retry() -> Self {
        Self::default().with_max_attempts(NonZeroU32::MIN)
    }

    pub fn with_max_attempts(self, max_attempts: NonZeroU32) -> Self {
        Self {
            max_attempts,
            ..self
        }
    }

    pub fn with_retry_statuses(self, statuses: impl IntoIterator<Item = StatusCode>) -> Self {
        Self {
            retry_statuses: statuses.into_iter().collect(),
            ..self
        }
    }

    pub fn with_backoff(self, backoff_base: Duration, max_backoff: Duration) -> Self {
        Self {
            backoff_base,
            max_backoff,
            ..self
        }
    }

    pub fn honor_retry_after(self, honor_retry_after: bool) -> Self {
        Self {
            honor_retry_after,
            ..self
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.get()
    }

    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    pub fn is_retryable(&self, status: StatusCode) -> bool {
        self.retry_statuses.contains(&status)
    }

    /// The exponential schedule: `base`, `2 * base`, `4 * base`, ... capped at `max_backoff`.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.backoff_base)
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_interval(self.max_backoff)
            .with_max_elapsed_time(None)
            .build()
    }

    /// The delay requested by the server, if the policy honors it.
    pub fn retry_after(&self, headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
        if !self.honor_retry_after {
            return None;
        }
        let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
        parse_retry_after(value, now).map(|delay| delay.min(self.max_backoff))
    }
}

/// Parses a `Retry-After` header value, given either as delay-seconds or as an HTTP-date.
///
/// A date in the past means "retry now".
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    Some(
        (date.with_timezone(&Utc) - now)
            .to_std()
            .unwrap_or(Duration::ZERO),
    )
}
