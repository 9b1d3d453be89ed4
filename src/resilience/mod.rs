//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Page logic asks for a critical resource:
//!     → retries.rs (optional probe, then read)
//!     → On transient failure: backoff.rs (linear delay), next attempt
//!     → After max_attempts: last error surfaces to the caller
//! ```
//!
//! # Design Decisions
//! - Attempts are strictly sequential; no hedged or parallel reads
//! - Only `TransientBackend` errors are retried
//! - Intermediate failures are logged, never surfaced

pub mod backoff;
pub mod retries;

pub use backoff::linear_backoff;
pub use retries::{RetryLoader, RetryState};
