//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters via the metrics facade)
//! ```
//!
//! # Design Decisions
//! - Structured key/value fields on every event
//! - Swallowed failures are still logged at warn
//! - No exporter is bundled; the host installs one if it wants counters

pub mod logging;
pub mod metrics;
