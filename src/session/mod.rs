//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! Page load:
//!     guard.rs (resolve_access) → AuthApi::current_session (once per page)
//!         → AccessOutcome consumed by the hosting shell
//!         → fire-and-forget profile reactivation
//!
//! While the page lives:
//!     user interaction → ActivityClock::touch
//!     timeout.rs (periodic check) → SessionGuard::logout on expiry
//! ```
//!
//! # Design Decisions
//! - Navigation is returned as data, never performed here
//! - A failed session fetch is a decision (redirect), never an error

pub mod guard;
pub mod timeout;

#[cfg(test)]
pub(crate) mod testing;

pub use guard::{
    reactivate_if_deleted, AccessOutcome, AdminRoster, DenyReason, Destination, Identity, Redirect,
    SessionGuard, SESSION_MARKER_KEY,
};
pub use timeout::{ActivityClock, ActivityEvent, SessionTimeout, INACTIVITY_NOTICE};
