//! Distributed rate limiting with the Generic Cell Rate Algorithm (GCRA).
//!
//! Each limited entity (a user, an API token, an IP) is identified by a key.
//! For every key the shared store holds a single number, the theoretical
//! arrival time (TAT). Remaining capacity, retry and reset times are all
//! projected from that number and the current time, so a decision is one
//! read and at most one conditional write, executed atomically by the store.
//!
//! # Features
//!
//! - **Exact accounting**: sub-period capacity without refill sweeps
//! - **Atomic per key**: correctness rests on the store's atomic execution,
//!   not on in-process locks, so any number of processes can share limits
//! - **Pluggable stores**: implement [`Store`] for a backend with server-side
//!   atomic procedures, or [`KeyValue`] for one with compare-and-set and wrap
//!   it in [`CasStore`]
//! - **Self-cleaning**: keys expire once their bucket is full again
//! - **reqwest middleware**: throttle outgoing requests per host
//!
//! # Example
//!
//! ```rust,no_run
//! use gcra_limiter::{Limiter, MemoryStore};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), gcra_limiter::RateLimitError> {
//! let limiter = Limiter::new(MemoryStore::new());
//!
//! // 100 tokens at most, regenerating at 10 per second
//! let result = limiter.check("user-1234", 100, 10, 1, Duration::from_secs(1)).await?;
//! if result.limited {
//!     println!("retry in {:?}", result.retry_in);
//! } else {
//!     println!("{} left, full again in {:?}", result.remaining, result.reset_in);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Time Resolution
//!
//! The limiter reads its clock in whole seconds, and periods are truncated
//! to whole seconds. A period under one second is rejected. Retry and reset
//! times are rounded up to whole seconds.
//!
//! # Failures
//!
//! A store failure is returned as [`RateLimitError::Store`] and never turned
//! into an "allowed" or "limited" result. Whether to fail open or closed is
//! the caller's decision.
//!
//! # Middleware
//!
//! ```rust,no_run
//! use gcra_limiter::{Limit, Limiter, MemoryStore, RateLimitMiddleware, ThrottleBehavior};
//! use reqwest_middleware::ClientBuilder;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let middleware = RateLimitMiddleware::builder(Limiter::new(MemoryStore::new()))
//!     .limit(Limit::new(50, 10, Duration::from_secs(1)).unwrap())
//!     .on_limit(ThrottleBehavior::Delay)
//!     .build();
//!
//! let client = ClientBuilder::new(reqwest::Client::new())
//!     .with(middleware)
//!     .build();
//!
//! client.get("https://api.example.com/book").send().await.unwrap();
//! # }
//! ```

mod builder;
mod clock;
mod error;
mod gcra;
mod limiter;
mod memory;
mod middleware;
mod store;
mod types;

// Public re-exports
pub use builder::{DEFAULT_KEY_PREFIX, RateLimitMiddlewareBuilder};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ClockError, MiddlewareError, RateLimitError, StoreError};
pub use gcra::{Decision, TatWrite, decide};
pub use limiter::Limiter;
pub use memory::MemoryStore;
pub use middleware::RateLimitMiddleware;
pub use store::{CasStore, DEFAULT_MAX_ATTEMPTS, KeyValue, Store, Versioned};
pub use types::{GcraReply, GcraRequest, Limit, RateLimitResult, ThrottleBehavior};
