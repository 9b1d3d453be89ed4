//! Client-side trust and resilience layer for the operations dashboard.
//!
//! # Architecture Overview
//!
//! ```text
//!   page logic
//!       │
//!       ├─▶ session::SessionGuard ──────▶ AuthApi / TableApi
//!       ├─▶ resilience::RetryLoader ────▶ TableApi
//!       ├─▶ upload::UploadPipeline ─────▶ StorageApi, then TableApi
//!       └─▶ session::SessionTimeout (background, until teardown)
//!
//!   backend::RestBackend
//!       └─▶ RateLimitLayer ─▶ CsrfLayer ─▶ RequestIdLayer ─▶ ReqwestTransport
//! ```
//!
//! Everything is wired once by [`context::AppContext`].

pub mod backend;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod notice;
pub mod observability;
pub mod persist;
pub mod resilience;
pub mod security;
pub mod session;
pub mod upload;

pub use config::GuardConfig;
pub use context::AppContext;
pub use error::{GuardError, GuardResult, ValidationError};
