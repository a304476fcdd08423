//! Rate limiting middleware for reqwest.

use async_trait::async_trait;
use http::Extensions;
use rand::Rng;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result as MiddlewareResult};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::builder::RateLimitMiddlewareBuilder;
use crate::clock::{Clock, SystemClock};
use crate::error::MiddlewareError;
use crate::limiter::Limiter;
use crate::store::Store;
use crate::types::{Limit, ThrottleBehavior};

/// Guards outgoing requests with a [`Limiter`], one bucket per host.
///
/// Every process pointing its middleware at the same store shares the same
/// buckets, so the limit holds across a whole fleet of clients. When the
/// limiter cannot decide (store or clock failure) the request fails; it is
/// never sent on an unknown outcome.
///
/// Clones share the same limiter.
pub struct RateLimitMiddleware<S, C = SystemClock> {
    pub(crate) limiter: Arc<Limiter<S, C>>,
    pub(crate) limit: Limit,
    pub(crate) cost: u64,
    pub(crate) key_prefix: String,
    pub(crate) on_limit: ThrottleBehavior,
}

impl<S, C> Clone for RateLimitMiddleware<S, C> {
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            limit: self.limit,
            cost: self.cost,
            key_prefix: self.key_prefix.clone(),
            on_limit: self.on_limit,
        }
    }
}

impl<S, C> fmt::Debug for RateLimitMiddleware<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitMiddleware")
            .field("limit", &self.limit)
            .field("cost", &self.cost)
            .field("key_prefix", &self.key_prefix)
            .field("on_limit", &self.on_limit)
            .finish_non_exhaustive()
    }
}

impl<S: Store, C: Clock> RateLimitMiddleware<S, C> {
    /// Create a new builder around `limiter`.
    #[must_use]
    pub fn builder(limiter: Limiter<S, C>) -> RateLimitMiddlewareBuilder<S, C> {
        RateLimitMiddlewareBuilder::new(limiter)
    }

    /// The limiter key for a request: the prefix and the host, without port.
    pub(crate) fn key_for(&self, req: &Request) -> String {
        let host = req.url().host_str().unwrap_or_default();
        format!("{}:{}", self.key_prefix, host)
    }

    async fn check_and_apply_limit(&self, key: &str) -> Result<(), MiddlewareError> {
        loop {
            let result = self.limiter.check_limit(key, &self.limit, self.cost).await?;
            if !result.limited {
                return Ok(());
            }

            match self.on_limit {
                ThrottleBehavior::Delay => {
                    // Add jitter (0-50% of the wait) so woken callers don't stampede
                    let wait = result.retry_in;
                    let jitter_max_nanos = wait.as_nanos() as u64 / 2;
                    let jitter_nanos = if jitter_max_nanos > 0 {
                        rand::rng().random_range(0..=jitter_max_nanos)
                    } else {
                        0
                    };

                    #[cfg(feature = "tracing")]
                    tracing::debug!(key, ?wait, "rate limited, delaying request");

                    sleep(wait + Duration::from_nanos(jitter_nanos)).await;
                }
                ThrottleBehavior::Error => {
                    return Err(MiddlewareError::RateLimited {
                        retry_in: result.retry_in,
                    });
                }
            }
        }
    }
}

#[async_trait]
impl<S, C> Middleware for RateLimitMiddleware<S, C>
where
    S: Store + 'static,
    C: Clock + 'static,
{
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> MiddlewareResult<Response> {
        let key = self.key_for(&req);
        self.check_and_apply_limit(&key).await?;

        next.run(req, extensions).await
    }
}
