//! An in-process shared store.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;
use crate::gcra::{TatWrite, decide};
use crate::store::{KeyValue, Store, Versioned};
use crate::types::{GcraReply, GcraRequest};

#[derive(Debug, Clone, Copy)]
struct Slot {
    tat: f64,
    /// Store clock seconds at which the slot stops existing.
    expires_at: f64,
    version: u64,
}

impl Slot {
    #[inline]
    fn live_at(&self, now: f64) -> bool {
        self.expires_at > now
    }
}

/// A TAT store shared by every clone of the handle.
///
/// Same-key decisions are serialized by holding the key's map entry for
/// the whole read-decide-write sequence, so [`Store::execute`] is atomic
/// per key without any lock of our own. Keys expire by the store's clock
/// and are dropped lazily on access or eagerly by
/// [`purge_expired`](Self::purge_expired).
///
/// # Example
///
/// ```rust
/// use gcra_limiter::{Limiter, MemoryStore};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), gcra_limiter::RateLimitError> {
/// let limiter = Limiter::new(MemoryStore::new());
/// let result = limiter.check("user-1234", 100, 10, 1, Duration::from_secs(1)).await?;
/// assert!(!result.limited);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryStore<C = SystemClock> {
    slots: Arc<DashMap<String, Slot>>,
    versions: Arc<AtomicU64>,
    clock: C,
}

impl MemoryStore<SystemClock> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryStore<C> {
    /// Create a store whose expiry runs on `clock`.
    #[must_use]
    pub fn with_clock(clock: C) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            versions: Arc::new(AtomicU64::new(0)),
            clock,
        }
    }

    fn now(&self) -> Result<f64, StoreError> {
        Ok(self.clock.now()?.as_secs_f64())
    }

    fn slot_for(&self, tat: f64, ttl: Duration, now: f64) -> Slot {
        Slot {
            tat,
            expires_at: now + ttl.as_secs_f64(),
            version: self.versions.fetch_add(1, Ordering::Relaxed) + 1,
        }
    }

    /// The live TAT stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Fails only if the store clock cannot be read.
    pub fn tat(&self, key: &str) -> Result<Option<f64>, StoreError> {
        let now = self.now()?;
        Ok(self
            .slots
            .get(key)
            .filter(|slot| slot.live_at(now))
            .map(|slot| slot.tat))
    }

    /// Drop the state of one key, returning it to a full bucket.
    pub fn remove(&self, key: &str) -> bool {
        self.slots.remove(key).is_some()
    }

    /// Drop all state.
    pub fn clear(&self) {
        self.slots.clear();
    }

    /// Remove every expired key.
    ///
    /// Expired keys already read as absent; this only reclaims memory.
    ///
    /// # Errors
    ///
    /// Fails only if the store clock cannot be read.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = self.now()?;
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.live_at(now));
        Ok(before.saturating_sub(self.slots.len()))
    }

    /// Number of stored keys, including expired ones not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[async_trait]
impl<C: Clock> Store for MemoryStore<C> {
    async fn execute(&self, key: &str, request: GcraRequest) -> Result<GcraReply, StoreError> {
        let clock_now = self.now()?;
        let now = request.now as f64;

        // The entry guard holds the shard lock until the end of the match.
        let reply = match self.slots.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                let live = occupied.get().live_at(clock_now);
                let stored = live.then(|| occupied.get().tat);
                let decision = decide(now, stored, &request);
                match decision.write {
                    Some(TatWrite { tat, ttl }) => {
                        *occupied.get_mut() = self.slot_for(tat, ttl, clock_now);
                    }
                    None if !live => {
                        occupied.remove();
                    }
                    None => {}
                }
                decision.reply
            }
            Entry::Vacant(vacant) => {
                let decision = decide(now, None, &request);
                if let Some(TatWrite { tat, ttl }) = decision.write {
                    vacant.insert(self.slot_for(tat, ttl, clock_now));
                }
                decision.reply
            }
        };

        Ok(reply)
    }
}

#[async_trait]
impl<C: Clock> KeyValue for MemoryStore<C> {
    async fn get(&self, key: &str) -> Result<Option<Versioned>, StoreError> {
        let now = self.now()?;
        Ok(self
            .slots
            .get(key)
            .filter(|slot| slot.live_at(now))
            .map(|slot| Versioned {
                value: slot.tat,
                version: slot.version,
            }))
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<u64>,
        value: f64,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = self.now()?;

        match self.slots.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                let current = Some(occupied.get())
                    .filter(|slot| slot.live_at(now))
                    .map(|slot| slot.version);
                if current != expected {
                    return Ok(false);
                }
                *occupied.get_mut() = self.slot_for(value, ttl, now);
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                if expected.is_some() {
                    return Ok(false);
                }
                vacant.insert(self.slot_for(value, ttl, now));
                Ok(true)
            }
        }
    }
}
