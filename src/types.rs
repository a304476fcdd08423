//! Core types for limit configuration and decision results.

use std::time::Duration;

use crate::error::{RateLimitError, StoreError};

/// Behavior of the middleware when a limit is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThrottleBehavior {
    /// Delay the request until the limiter admits it.
    #[default]
    Delay,
    /// Return an error immediately.
    Error,
}

/// A validated set of limit parameters.
///
/// `burst` tokens are available when the bucket is full, and `rate` tokens
/// regenerate every `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    burst: u64,
    rate: u64,
    period: Duration,
}

impl Limit {
    /// Create a limit, rejecting parameters the limiter would refuse anyway.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::InvalidParameters`] if `burst` or `rate` is
    /// zero, or if `period` is shorter than one whole second.
    pub fn new(burst: u64, rate: u64, period: Duration) -> Result<Self, RateLimitError> {
        validate(burst, rate, period)?;
        Ok(Self {
            burst,
            rate,
            period,
        })
    }

    #[must_use]
    pub fn burst(&self) -> u64 {
        self.burst
    }

    #[must_use]
    pub fn rate(&self) -> u64 {
        self.rate
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Time needed to regenerate a single token, at whole-second period
    /// resolution.
    #[inline]
    #[must_use]
    pub fn emission_interval(&self) -> Duration {
        let nanos = u128::from(self.period.as_secs()) * 1_000_000_000 / u128::from(self.rate);
        Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
    }
}

pub(crate) fn validate(burst: u64, rate: u64, period: Duration) -> Result<(), RateLimitError> {
    if burst == 0 || rate == 0 || period.as_secs() == 0 {
        return Err(RateLimitError::InvalidParameters);
    }
    Ok(())
}

/// Arguments of one atomic decision, as shipped to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcraRequest {
    /// Unix time in whole seconds.
    pub now: u64,
    pub burst: u64,
    pub rate: u64,
    /// Period in whole seconds.
    pub period: u64,
    pub cost: u64,
}

impl GcraRequest {
    /// Seconds needed to regenerate a single token.
    #[inline]
    pub(crate) fn emission_interval(&self) -> f64 {
        self.period as f64 / self.rate as f64
    }
}

/// The raw outcome of the atomic procedure.
///
/// This is the `(limited, remaining, retry_in, reset_in)` tuple a store
/// returns, with durations in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GcraReply {
    pub limited: bool,
    pub remaining: u64,
    pub retry_in: u64,
    pub reset_in: u64,
}

impl GcraReply {
    /// Decode the wire tuple returned by a scripted store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MalformedReply`] if `limited` is not 0 or 1, or
    /// any other field is negative.
    pub fn from_tuple(raw: [i64; 4]) -> Result<Self, StoreError> {
        let [limited, remaining, retry_in, reset_in] = raw;
        let limited = match limited {
            0 => false,
            1 => true,
            _ => return Err(StoreError::MalformedReply(raw)),
        };
        let field = |v: i64| u64::try_from(v).map_err(|_| StoreError::MalformedReply(raw));
        Ok(Self {
            limited,
            remaining: field(remaining)?,
            retry_in: field(retry_in)?,
            reset_in: field(reset_in)?,
        })
    }

    /// Encode as the wire tuple.
    #[must_use]
    pub fn into_tuple(self) -> [i64; 4] {
        let clamp = |v: u64| v.min(i64::MAX as u64) as i64;
        [
            i64::from(self.limited),
            clamp(self.remaining),
            clamp(self.retry_in),
            clamp(self.reset_in),
        ]
    }
}

/// The typed result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimitResult {
    /// Whether the request was rejected.
    pub limited: bool,
    /// Number of further cost-1 requests that would be admitted right now.
    pub remaining: u64,
    /// Minimum wait before the same request would be admitted. Zero unless
    /// `limited` is set and the request had a cost.
    pub retry_in: Duration,
    /// Time until the bucket is full again.
    pub reset_in: Duration,
}

impl From<GcraReply> for RateLimitResult {
    fn from(reply: GcraReply) -> Self {
        Self {
            limited: reply.limited,
            remaining: reply.remaining,
            retry_in: Duration::from_secs(reply.retry_in),
            reset_in: Duration::from_secs(reply.reset_in),
        }
    }
}
