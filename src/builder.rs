//! Builder API for configuring the rate limiting middleware.

use std::sync::Arc;

use crate::clock::Clock;
use crate::limiter::Limiter;
use crate::middleware::RateLimitMiddleware;
use crate::store::Store;
use crate::types::{Limit, ThrottleBehavior};

/// Prefix of limiter keys when none is configured.
pub const DEFAULT_KEY_PREFIX: &str = "http";

/// Builder for a [`RateLimitMiddleware`].
#[derive(Debug)]
pub struct RateLimitMiddlewareBuilder<S, C> {
    limiter: Limiter<S, C>,
    limit: Option<Limit>,
    cost: u64,
    key_prefix: String,
    on_limit: ThrottleBehavior,
}

impl<S: Store, C: Clock> RateLimitMiddlewareBuilder<S, C> {
    pub(crate) fn new(limiter: Limiter<S, C>) -> Self {
        Self {
            limiter,
            limit: None,
            cost: 1,
            key_prefix: DEFAULT_KEY_PREFIX.to_owned(),
            on_limit: ThrottleBehavior::default(),
        }
    }

    /// Set the limit applied to each host.
    #[must_use]
    pub fn limit(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the number of tokens each request consumes. Defaults to 1.
    #[must_use]
    pub fn cost(mut self, cost: u64) -> Self {
        self.cost = cost;
        self
    }

    /// Set the namespace prepended to every key, so several middlewares can
    /// share one store without sharing buckets.
    #[must_use]
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the behavior when the limit is exceeded.
    #[must_use]
    pub fn on_limit(mut self, behavior: ThrottleBehavior) -> Self {
        self.on_limit = behavior;
        self
    }

    /// Build the middleware.
    ///
    /// # Panics
    ///
    /// Panics if no limit was configured, or if the cost is zero or larger
    /// than the limit's burst.
    #[must_use]
    pub fn build(self) -> RateLimitMiddleware<S, C> {
        let limit = self
            .limit
            .expect("middleware must have a limit configured via .limit()");
        assert!(self.cost > 0, "cost must be greater than 0");
        assert!(
            self.cost <= limit.burst(),
            "cost must not exceed the limit's burst"
        );

        RateLimitMiddleware {
            limiter: Arc::new(self.limiter),
            limit,
            cost: self.cost,
            key_prefix: self.key_prefix,
            on_limit: self.on_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use std::time::Duration;

    fn limit() -> Limit {
        Limit::new(5, 1, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_builder_api() {
        let middleware = RateLimitMiddleware::builder(Limiter::new(MemoryStore::new()))
            .limit(limit())
            .cost(2)
            .key_prefix("clob")
            .on_limit(ThrottleBehavior::Error)
            .build();

        assert_eq!(middleware.limit, limit());
        assert_eq!(middleware.cost, 2);
        assert_eq!(middleware.key_prefix, "clob");
        assert_eq!(middleware.on_limit, ThrottleBehavior::Error);
    }

    #[test]
    fn test_builder_defaults() {
        let middleware = RateLimitMiddleware::builder(Limiter::new(MemoryStore::new()))
            .limit(limit())
            .build();

        assert_eq!(middleware.cost, 1);
        assert_eq!(middleware.key_prefix, DEFAULT_KEY_PREFIX);
        assert_eq!(middleware.on_limit, ThrottleBehavior::Delay);
    }

    #[test]
    fn test_key_excludes_port() {
        let middleware = RateLimitMiddleware::builder(Limiter::new(MemoryStore::new()))
            .limit(limit())
            .key_prefix("api")
            .build();

        let req = reqwest::Client::new()
            .get("https://api.example.com:8443/book")
            .build()
            .unwrap();
        assert_eq!(middleware.key_for(&req), "api:api.example.com");
    }

    #[test]
    #[should_panic(expected = "middleware must have a limit")]
    fn test_missing_limit_panics() {
        let _ = RateLimitMiddleware::builder(Limiter::new(MemoryStore::new())).build();
    }

    #[test]
    #[should_panic(expected = "cost must not exceed")]
    fn test_cost_above_burst_panics() {
        let _ = RateLimitMiddleware::builder(Limiter::new(MemoryStore::new()))
            .limit(limit())
            .cost(6)
            .build();
    }

    #[test]
    #[should_panic(expected = "cost must be greater than 0")]
    fn test_zero_cost_panics() {
        let _ = RateLimitMiddleware::builder(Limiter::new(MemoryStore::new()))
            .limit(limit())
            .cost(0)
            .build();
    }
}
