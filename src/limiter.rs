//! The limiter façade.

use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::error::RateLimitError;
use crate::store::Store;
use crate::types::{GcraReply, GcraRequest, Limit, RateLimitResult, validate};

/// A GCRA based limiter over a shared store.
///
/// # Thread Safety
///
/// `Limiter` holds no mutable state of its own. All coordination between
/// concurrent callers, in this process or any other, happens inside the
/// store's atomic execution of the decision for a key.
#[derive(Debug, Clone)]
pub struct Limiter<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: Store> Limiter<S, SystemClock> {
    /// Create a limiter reading the system clock.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: Store, C: Clock> Limiter<S, C> {
    /// Create a limiter reading `clock`.
    #[must_use]
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Perform a rate limit check for `key`.
    ///
    /// `burst` is the maximum number of tokens available, and `rate` tokens
    /// regenerate every `period`. The request consumes `cost` tokens; a cost
    /// of zero only inspects the bucket.
    ///
    /// # Errors
    ///
    /// - [`RateLimitError::InvalidParameters`] if `burst` or `rate` is zero
    ///   or `period` is under one second.
    /// - [`RateLimitError::CostExceedsBurst`] if `cost > burst`.
    /// - [`RateLimitError::Store`] if the store fails. The outcome is then
    ///   unknown, and must not be read as "not limited".
    ///
    /// The store is not contacted when the parameters are invalid.
    ///
    /// # Example
    ///
    /// ```rust
    /// use gcra_limiter::{Limiter, MemoryStore};
    /// use std::time::Duration;
    ///
    /// # async fn example() -> Result<(), gcra_limiter::RateLimitError> {
    /// let limiter = Limiter::new(MemoryStore::new());
    ///
    /// let r = limiter.check("user-1234", 100, 10, 1, Duration::from_secs(1)).await?;
    /// assert_eq!((r.limited, r.remaining), (false, 99));
    ///
    /// let r = limiter.check("user-1234", 100, 10, 100, Duration::from_secs(1)).await?;
    /// assert!(r.limited);
    /// assert_eq!(r.retry_in, Duration::from_secs(1));
    /// # Ok(())
    /// # }
    /// ```
    pub async fn check(
        &self,
        key: &str,
        burst: u64,
        rate: u64,
        cost: u64,
        period: Duration,
    ) -> Result<RateLimitResult, RateLimitError> {
        validate(burst, rate, period)?;
        if cost > burst {
            return Err(RateLimitError::CostExceedsBurst { cost, burst });
        }

        let request = GcraRequest {
            now: self.clock.now()?.as_secs(),
            burst,
            rate,
            period: period.as_secs(),
            cost,
        };

        let reply: GcraReply = self.store.execute(key, request).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            key,
            cost,
            limited = reply.limited,
            remaining = reply.remaining,
            retry_in = reply.retry_in,
            reset_in = reply.reset_in,
            "rate limit decision"
        );

        Ok(reply.into())
    }

    /// Perform a rate limit check for `key` against a preconfigured limit.
    ///
    /// # Errors
    ///
    /// As for [`check`](Self::check).
    pub async fn check_limit(
        &self,
        key: &str,
        limit: &Limit,
        cost: u64,
    ) -> Result<RateLimitResult, RateLimitError> {
        self.check(key, limit.burst(), limit.rate(), cost, limit.period())
            .await
    }
}
