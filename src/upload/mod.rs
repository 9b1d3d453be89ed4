//! Upload subsystem.
//!
//! # Data Flow
//! ```text
//! UploadFile
//!     → policy.rs (type, size, owner; no network on rejection)
//!     → pipeline.rs (object storage, then inline fallbacks)
//!     → UploadReceipt { public_locator, strategy_used }
//! ```

pub mod pipeline;
pub mod policy;

pub use pipeline::{AttemptOutcome, Strategy, UploadAttempt, UploadPipeline, UploadReceipt};
pub use policy::{guess_content_type, UploadFile};
