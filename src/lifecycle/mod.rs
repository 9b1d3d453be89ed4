//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Teardown (teardown.rs):
//!     page closed / shell exits → background monitors stop
//!
//! Signals (signals.rs):
//!     SIGINT (Ctrl-C) → trigger teardown
//! ```

pub mod signals;
pub mod teardown;

pub use teardown::Teardown;
