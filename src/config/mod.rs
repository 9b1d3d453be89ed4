//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → shared via Arc through AppContext
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use validation::validate_config;
pub use schema::{
    AuthConfig, BackendConfig, GuardConfig, ObservabilityConfig, RateLimitConfig, RetryConfig,
    SecurityConfig, SessionTimeoutConfig, UploadConfig, UploadPolicy,
};
