//! The boundary to the shared store.
//!
//! A [`Store`] runs the decision procedure for one key as a single atomic
//! unit: read the TAT, decide, and conditionally write the new TAT with an
//! expiry. Two callers on the same key must observe a serial order of those
//! steps, otherwise both can read the same stale TAT and both be admitted.
//!
//! Stores with server-side atomic execution implement [`Store`] directly.
//! Stores that only offer versioned compare-and-set implement [`KeyValue`]
//! and are wrapped in [`CasStore`].

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::StoreError;
use crate::gcra::decide;
use crate::types::{GcraReply, GcraRequest};

/// Atomic execution of the GCRA procedure against a single key.
#[async_trait]
pub trait Store: Send + Sync {
    async fn execute(&self, key: &str, request: GcraRequest) -> Result<GcraReply, StoreError>;
}

#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    async fn execute(&self, key: &str, request: GcraRequest) -> Result<GcraReply, StoreError> {
        (**self).execute(key, request).await
    }
}

/// A stored TAT together with the version it was written at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Versioned {
    pub value: f64,
    pub version: u64,
}

/// A key-value store offering versioned compare-and-set with expiry.
#[async_trait]
pub trait KeyValue: Send + Sync {
    /// Read the live (unexpired) value under `key`.
    async fn get(&self, key: &str) -> Result<Option<Versioned>, StoreError>;

    /// Write `value` with the given expiry if the key is still at
    /// `expected`. `None` expects the key to be absent. Returns whether the
    /// write happened.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<u64>,
        value: f64,
        ttl: Duration,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
impl<K: KeyValue + ?Sized> KeyValue for Arc<K> {
    async fn get(&self, key: &str) -> Result<Option<Versioned>, StoreError> {
        (**self).get(key).await
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<u64>,
        value: f64,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        (**self).compare_and_set(key, expected, value, ttl).await
    }
}

/// Default number of consecutive conflicts without progress before giving
/// up on a key.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 64;

/// Runs the procedure as an optimistic read-decide-swap loop.
///
/// A decision that writes nothing (a rejection or a zero-cost probe) is
/// linearized at its read and returned at once. A decision that writes is
/// retried from a fresh read whenever another caller got there first. Every
/// such conflict is another caller's admission, so the loop ends once the
/// bucket is drained at the latest.
///
/// Only conflicts that leave the key unchanged count towards
/// `max_attempts`. They mean the backend refuses swaps nobody else made.
#[derive(Debug, Clone)]
pub struct CasStore<K> {
    inner: K,
    max_attempts: u32,
}

impl<K: KeyValue> CasStore<K> {
    #[must_use]
    pub fn new(inner: K) -> Self {
        Self::with_max_attempts(inner, DEFAULT_MAX_ATTEMPTS)
    }

    /// Give up after `max_attempts` consecutive failed swaps during which
    /// the key did not change.
    ///
    /// # Panics
    ///
    /// Panics if `max_attempts` is 0.
    #[must_use]
    pub fn with_max_attempts(inner: K, max_attempts: u32) -> Self {
        assert!(max_attempts > 0, "max_attempts must be greater than 0");
        Self {
            inner,
            max_attempts,
        }
    }

    #[must_use]
    pub fn inner(&self) -> &K {
        &self.inner
    }
}

#[async_trait]
impl<K: KeyValue> Store for CasStore<K> {
    async fn execute(&self, key: &str, request: GcraRequest) -> Result<GcraReply, StoreError> {
        let now = request.now as f64;

        let mut seen: Option<Option<u64>> = None;
        let mut stalled = 0;

        loop {
            let current = self.inner.get(key).await?;
            let version = current.map(|v| v.version);

            // A lost swap with the key still at the version we saw means no
            // other writer made progress.
            if seen == Some(version) {
                stalled += 1;
                if stalled >= self.max_attempts {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(key, attempts = stalled, "compare-and-set is not making progress");

                    return Err(StoreError::Contention { attempts: stalled });
                }
            } else {
                stalled = 0;
            }
            seen = Some(version);

            let decision = decide(now, current.map(|v| v.value), &request);
            let Some(write) = decision.write else {
                return Ok(decision.reply);
            };

            if self
                .inner
                .compare_and_set(key, version, write.tat, write.ttl)
                .await?
            {
                return Ok(decision.reply);
            }

            #[cfg(feature = "tracing")]
            tracing::trace!(key, "compare-and-set conflict, retrying");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const NOW: u64 = 1_700_000_000;

    fn request(cost: u64) -> GcraRequest {
        GcraRequest {
            now: NOW,
            burst: 3,
            rate: 1,
            period: 1,
            cost,
        }
    }

    /// A key-value store whose swaps always lose.
    #[derive(Default)]
    struct AlwaysConflicting {
        swaps: AtomicU32,
    }

    #[async_trait]
    impl KeyValue for AlwaysConflicting {
        async fn get(&self, _key: &str) -> Result<Option<Versioned>, StoreError> {
            Ok(None)
        }

        async fn compare_and_set(
            &self,
            _key: &str,
            _expected: Option<u64>,
            _value: f64,
            _ttl: Duration,
        ) -> Result<bool, StoreError> {
            self.swaps.fetch_add(1, Ordering::Relaxed);
            Ok(false)
        }
    }

    /// A key-value store that is down.
    struct Unreachable;

    #[async_trait]
    impl KeyValue for Unreachable {
        async fn get(&self, _key: &str) -> Result<Option<Versioned>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn compare_and_set(
            &self,
            _key: &str,
            _expected: Option<u64>,
            _value: f64,
            _ttl: Duration,
        ) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_contention_gives_up_after_max_attempts() {
        let store = CasStore::with_max_attempts(AlwaysConflicting::default(), 5);

        let err = store.execute("k", request(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Contention { attempts: 5 }));
        assert_eq!(store.inner().swaps.load(Ordering::Relaxed), 5);
    }

    #[tokio::test]
    async fn test_probe_never_swaps() {
        let store = CasStore::new(AlwaysConflicting::default());

        let reply = store.execute("k", request(0)).await.unwrap();
        assert!(!reply.limited);
        assert_eq!(reply.remaining, 3);
        assert_eq!(store.inner().swaps.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_backend_errors_propagate() {
        let store = CasStore::new(Unreachable);

        let err = store.execute("k", request(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    #[should_panic(expected = "max_attempts must be greater than 0")]
    fn test_zero_attempts_panics() {
        let _ = CasStore::with_max_attempts(Unreachable, 0);
    }
}
