//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call:
//!     → middleware.rs (rate_limit.rs window check, reject locally if full)
//!     → middleware.rs (token.rs read-or-create, attach CSRF header)
//!     → client transport
//!
//! Page logic (on demand):
//!     → sanitize.rs (escape, strip, validate)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a full window rejects before any network I/O
//! - The limiter window is mutex-guarded so check-and-increment is atomic
//!   across worker threads
//! - Sanitizers are pure functions and never applied implicitly

pub mod middleware;
pub mod rate_limit;
pub mod sanitize;
pub mod token;

pub use middleware::{secure_client, CsrfLayer, RateLimitLayer};
pub use rate_limit::{RateLimitWindow, RateLimiter};
pub use token::{CsrfToken, TokenStore};
