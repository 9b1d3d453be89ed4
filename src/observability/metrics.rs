//! Metrics collection.
//!
//! # Metrics
//! - `dashguard_access_decisions_total` (counter): page gating outcomes by `outcome`
//! - `dashguard_requests_rate_limited_total` (counter): calls rejected locally
//! - `dashguard_retry_attempts_total` (counter): failed read attempts by `resource`
//! - `dashguard_uploads_total` (counter): persisted assets by `strategy`
//! - `dashguard_upload_failures_total` (counter): uploads that exhausted every strategy
//! - `dashguard_forced_logouts_total` (counter): inactivity logouts

pub fn record_access_decision(outcome: &'static str) {
    ::metrics::counter!("dashguard_access_decisions_total", "outcome" => outcome).increment(1);
}

pub fn record_rate_limited() {
    ::metrics::counter!("dashguard_requests_rate_limited_total").increment(1);
}

pub fn record_retry_attempt(resource: &str) {
    ::metrics::counter!("dashguard_retry_attempts_total", "resource" => resource.to_string()).increment(1);
}

pub fn record_upload(strategy: &'static str) {
    ::metrics::counter!("dashguard_uploads_total", "strategy" => strategy).increment(1);
}

pub fn record_upload_failure() {
    ::metrics::counter!("dashguard_upload_failures_total").increment(1);
}

pub fn record_forced_logout() {
    ::metrics::counter!("dashguard_forced_logouts_total").increment(1);
}
