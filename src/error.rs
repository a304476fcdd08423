//! Error types for rate limiting.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`Limiter::check`](crate::Limiter::check).
///
/// Callers must treat every variant as "outcome unknown". In particular a
/// [`RateLimitError::Store`] says nothing about whether the request would
/// have been admitted.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Burst or rate is zero, or the period is shorter than one second.
    #[error("zero rate, burst or period provided")]
    InvalidParameters,

    /// The request costs more than a completely refilled bucket holds.
    #[error("cost {cost} higher than burst {burst}")]
    CostExceedsBurst { cost: u64, burst: u64 },

    /// The shared store failed to execute the decision.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The limiter's clock could not be read.
    #[error("clock error: {0}")]
    Clock(#[from] ClockError),
}

/// Failures surfaced by a [`Store`](crate::Store) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Compare-and-set kept failing although the key did not change.
    #[error("gave up after {attempts} compare-and-set attempts without progress")]
    Contention { attempts: u32 },

    /// The atomic procedure returned a tuple outside its domain.
    #[error("malformed reply from store: {0:?}")]
    MalformedReply([i64; 4]),

    /// The store's own clock could not be read.
    #[error("store clock error: {0}")]
    Clock(#[from] ClockError),

    /// Any other backend specific failure.
    #[error("store backend error: {0}")]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Reading a [`Clock`](crate::Clock) failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClockError {
    /// System time is set before the Unix epoch.
    #[error("system time is before the unix epoch")]
    BeforeEpoch,
}

/// Errors produced by [`RateLimitMiddleware`](crate::RateLimitMiddleware).
#[derive(Debug, Error)]
pub enum MiddlewareError {
    /// The request was rate limited and the configured behavior is to error.
    #[error("rate limit exceeded, retry after {retry_in:?}")]
    RateLimited { retry_in: Duration },

    /// The limiter could not reach a decision.
    #[error("rate limit check failed: {0}")]
    Check(#[from] RateLimitError),
}

impl From<MiddlewareError> for reqwest_middleware::Error {
    fn from(err: MiddlewareError) -> Self {
        reqwest_middleware::Error::Middleware(err.into())
    }
}
