//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! consistency. All problems are reported at once, not just the first.

use std::fmt;

use crate::config::schema::{GuardConfig, UploadPolicy};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match url::Url::parse(&config.backend.url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "backend.url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("backend.url", e.to_string())),
    }
    if config.backend.request_timeout_secs == 0 {
        errors.push(ValidationError::new("backend.request_timeout_secs", "must be > 0"));
    }

    if config.auth.login_path.trim().is_empty() {
        errors.push(ValidationError::new("auth.login_path", "must not be empty"));
    }
    if config.auth.dashboard_path.trim().is_empty() {
        errors.push(ValidationError::new("auth.dashboard_path", "must not be empty"));
    }
    for email in &config.auth.admin_emails {
        if !crate::security::sanitize::validate_email(email) {
            errors.push(ValidationError::new(
                "auth.admin_emails",
                format!("'{}' is not an email address", email),
            ));
        }
    }

    if config.security.csrf_header.trim().is_empty() {
        errors.push(ValidationError::new("security.csrf_header", "must not be empty"));
    } else if http::HeaderName::from_bytes(config.security.csrf_header.as_bytes()).is_err() {
        errors.push(ValidationError::new("security.csrf_header", "not a valid header name"));
    }
    let rate_limit = &config.security.rate_limit;
    if rate_limit.enabled {
        if rate_limit.max_requests == 0 {
            errors.push(ValidationError::new("security.rate_limit.max_requests", "must be > 0"));
        }
        if rate_limit.period_ms == 0 {
            errors.push(ValidationError::new("security.rate_limit.period_ms", "must be > 0"));
        }
    }
    let timeout = &config.security.session_timeout;
    if timeout.enabled {
        if timeout.timeout_minutes == 0 {
            errors.push(ValidationError::new("security.session_timeout.timeout_minutes", "must be > 0"));
        }
        if timeout.check_interval_secs == 0 {
            errors.push(ValidationError::new("security.session_timeout.check_interval_secs", "must be > 0"));
        }
    }

    validate_policy("upload.avatar", &config.upload.avatar, &mut errors);
    validate_policy("upload.general", &config.upload.general, &mut errors);
    validate_policy("upload.proof", &config.upload.proof, &mut errors);
    if config.upload.photo_table.trim().is_empty() {
        errors.push(ValidationError::new("upload.photo_table", "must not be empty"));
    }

    if config.retry.max_attempts == 0 {
        errors.push(ValidationError::new("retry.max_attempts", "must be >= 1"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_policy(field: &str, policy: &UploadPolicy, errors: &mut Vec<ValidationError>) {
    if policy.bucket.trim().is_empty() {
        errors.push(ValidationError::new(format!("{field}.bucket"), "must not be empty"));
    }
    if policy.max_bytes == 0 {
        errors.push(ValidationError::new(format!("{field}.max_bytes"), "must be > 0"));
    }
    if policy.allowed_types.is_empty() {
        errors.push(ValidationError::new(format!("{field}.allowed_types"), "must list at least one type"));
    }
}
