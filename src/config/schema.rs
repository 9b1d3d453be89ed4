//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the dashboard guard layer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Hosted backend connection settings.
    pub backend: BackendConfig,

    /// Session gating and role settings.
    pub auth: AuthConfig,

    /// Outbound middleware and inactivity settings.
    pub security: SecurityConfig,

    /// Upload policies and fallback behaviour.
    pub upload: UploadConfig,

    /// Retry settings for critical record loads.
    pub retry: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Hosted backend connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the hosted service (e.g., "https://project.example.co").
    pub url: String,

    /// Public anonymous API key sent with every call.
    pub anon_key: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
            request_timeout_secs: 30,
        }
    }
}

/// Session gating configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Addresses granted the admin role. Matched case-insensitively.
    pub admin_emails: Vec<String>,

    /// Login page location.
    pub login_path: String,

    /// Non-privileged landing page.
    pub dashboard_path: String,

    /// Delay before a redirect is followed, in milliseconds.
    pub redirect_delay_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_emails: Vec::new(),
            login_path: "login.html".to_string(),
            dashboard_path: "dashboard.html".to_string(),
            redirect_delay_ms: 100,
        }
    }
}

/// Security middleware configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Header carrying the anti-forgery token.
    pub csrf_header: String,

    /// Durable client state file (CSRF token, access token).
    pub state_path: String,

    pub rate_limit: RateLimitConfig,

    pub session_timeout: SessionTimeoutConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            csrf_header: "X-CSRF-Token".to_string(),
            state_path: ".dashguard/state.json".to_string(),
            rate_limit: RateLimitConfig::default(),
            session_timeout: SessionTimeoutConfig::default(),
        }
    }
}

/// Outbound rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum calls per window.
    pub max_requests: u32,

    /// Window length in milliseconds.
    pub period_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 50,
            period_ms: 60_000,
        }
    }
}

/// Inactivity timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionTimeoutConfig {
    /// Enable the inactivity monitor.
    pub enabled: bool,

    /// Idle minutes before a forced logout.
    pub timeout_minutes: u64,

    /// How often the monitor checks, in seconds.
    pub check_interval_secs: u64,
}

impl Default for SessionTimeoutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_minutes: 30,
            check_interval_secs: 60,
        }
    }
}

/// Constraints for one kind of upload.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Object storage bucket.
    pub bucket: String,

    /// Maximum accepted size in bytes.
    pub max_bytes: usize,

    /// Accepted MIME types.
    pub allowed_types: Vec<String>,

    /// Fall back to inline-encoded persistence when object storage fails.
    #[serde(default = "default_inline_fallback")]
    pub inline_fallback: bool,
}

fn default_inline_fallback() -> bool {
    true
}

const IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

impl UploadPolicy {
    fn images(bucket: &str, max_bytes: usize) -> Self {
        Self {
            bucket: bucket.to_string(),
            max_bytes,
            allowed_types: IMAGE_TYPES.iter().map(|t| t.to_string()).collect(),
            inline_fallback: true,
        }
    }

    /// Profile photos: 2 MiB images.
    pub fn avatar() -> Self {
        Self::images("avatars", 2 * 1024 * 1024)
    }

    /// General uploads: 5 MiB images.
    pub fn general() -> Self {
        Self::images("proofs", 5 * 1024 * 1024)
    }

    /// Report proofs: 10 MiB images or PDF.
    pub fn proof() -> Self {
        let mut policy = Self::images("proofs", 10 * 1024 * 1024);
        policy.allowed_types.push("application/pdf".to_string());
        policy
    }
}

/// Upload pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Dedicated table for inline-encoded assets.
    pub photo_table: String,

    pub avatar: UploadPolicy,
    pub general: UploadPolicy,
    pub proof: UploadPolicy,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            photo_table: "user_photos".to_string(),
            avatar: UploadPolicy::avatar(),
            general: UploadPolicy::general(),
            proof: UploadPolicy::proof(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Linear backoff unit in milliseconds (attempt N waits N units).
    pub base_delay_ms: u64,

    /// Run a cheap connectivity probe before each read.
    pub probe: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            probe: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
