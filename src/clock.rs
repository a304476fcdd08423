//! Time sources.
//!
//! Every evaluator racing on the same key must read one authoritative clock.
//! The limiter and the store each take theirs at construction so that
//! deployments can point both at the same source.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::ClockError;

/// A source of wall-clock time, measured from the Unix epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> Result<Duration, ClockError>;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Result<Duration, ClockError> {
        (**self).now()
    }
}

/// The operating system's real-time clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<Duration, ClockError> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| ClockError::BeforeEpoch)
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so one handle can drive both a limiter and
/// the store it talks to.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock reading `start` after the epoch.
    #[must_use]
    pub fn new(start: Duration) -> Self {
        Self {
            nanos: Arc::new(AtomicU64::new(saturating_nanos(start))),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let by = saturating_nanos(by);
        self.nanos
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_add(by))
            })
            .ok();
    }

    /// Jump to an absolute time. Moving backwards is allowed.
    pub fn set(&self, to: Duration) {
        self.nanos.store(saturating_nanos(to), Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Result<Duration, ClockError> {
        Ok(Duration::from_nanos(self.nanos.load(Ordering::Acquire)))
    }
}

#[inline]
fn saturating_nanos(d: Duration) -> u64 {
    d.as_nanos().min(u64::MAX as u128) as u64
}
