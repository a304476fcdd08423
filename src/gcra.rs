//! GCRA (Generic Cell Rate Algorithm) decision procedure.
//!
//! The only state kept per key is the theoretical arrival time (TAT): the
//! instant at which the bucket would be exactly full again if it drained at
//! the configured rate. Remaining capacity is always projected from
//! `(now, TAT)`, so a decision needs one read and at most one write.
//!
//! [`decide`] is pure. Stores run it inside whatever atomic unit they offer.

use std::time::Duration;

use crate::types::{GcraReply, GcraRequest};

/// A new TAT to persist, with the expiry after which the key reverts to an
/// empty (full bucket) state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TatWrite {
    pub tat: f64,
    pub ttl: Duration,
}

/// Outcome of one evaluation of the procedure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub reply: GcraReply,
    /// Present only for admitted requests with a positive cost.
    pub write: Option<TatWrite>,
}

/// Round half up, i.e. `floor(x + 0.5)`.
///
/// `f64::round` rounds half away from zero, which differs for negative
/// halves and shifts boundary outcomes.
#[inline]
fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

#[inline]
fn ceil_secs(x: f64) -> u64 {
    x.ceil().max(0.0) as u64
}

/// Evaluate one request against the stored TAT.
///
/// `now` is in seconds and should come from the same clock for every caller
/// of a given key. A missing `stored_tat` means the bucket is full.
#[must_use]
pub fn decide(now: f64, stored_tat: Option<f64>, request: &GcraRequest) -> Decision {
    let emission_interval = request.emission_interval();
    let increment = emission_interval * request.cost as f64;
    let burst_offset = emission_interval * request.burst as f64;

    let tat = stored_tat.unwrap_or(now).max(now);

    let new_tat = tat + increment;
    let allow_at = new_tat - burst_offset;
    let diff = now - allow_at;

    // Branches follow the rounded remaining, not the sign of `diff`, so a
    // request short by under half a token is still admitted.
    let remaining = round_half_up(diff / emission_interval);

    if remaining < 0 {
        // Report the capacity actually left; the rejected request consumed
        // nothing. Negative only if the burst shrank since the TAT was written.
        let actual = round_half_up((now - (tat - burst_offset)) / emission_interval);
        return Decision {
            reply: GcraReply {
                limited: true,
                remaining: actual.max(0) as u64,
                retry_in: ceil_secs(-diff),
                reset_in: ceil_secs(tat - now),
            },
            write: None,
        };
    }

    if remaining == 0 && increment <= 0.0 {
        // A zero-cost probe of an exhausted bucket. Waiting never makes it
        // "succeed", so retry_in stays zero.
        return Decision {
            reply: GcraReply {
                limited: true,
                remaining: 0,
                retry_in: 0,
                reset_in: ceil_secs(tat - now),
            },
            write: None,
        };
    }

    let reset_in = ceil_secs(new_tat - now);
    let write = (increment > 0.0).then(|| TatWrite {
        tat: new_tat,
        ttl: Duration::from_secs(reset_in),
    });

    Decision {
        reply: GcraReply {
            limited: false,
            remaining: remaining as u64,
            retry_in: 0,
            reset_in,
        },
        write,
    }
}
