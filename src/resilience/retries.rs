//! Bounded retry for critical record loads.
//!
//! # Responsibilities
//! - Optionally probe connectivity before the real read
//! - Retry transient failures with linear backoff
//! - Surface the last error once attempts are exhausted

use std::sync::Arc;

use crate::backend::{Query, Row, TableApi};
use crate::config::RetryConfig;
use crate::error::{GuardError, GuardResult};
use crate::observability::metrics;
use crate::resilience::backoff::linear_backoff;

/// Progress of one retried call. Lives only for the duration of the call.
#[derive(Debug)]
pub struct RetryState {
    attempt: u32,
    max_attempts: u32,
    last_error: Option<GuardError>,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts: max_attempts.max(1),
            last_error: None,
        }
    }

    /// Start the next attempt, returning its 1-based number, or `None` once
    /// the budget is spent.
    pub fn begin(&mut self) -> Option<u32> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        self.attempt += 1;
        Some(self.attempt)
    }

    pub fn record_failure(&mut self, error: GuardError) {
        self.last_error = Some(error);
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn last_error(&self) -> Option<&GuardError> {
        self.last_error.as_ref()
    }

    /// Consume the state, yielding the error to surface.
    pub fn into_error(self) -> GuardError {
        self.last_error
            .unwrap_or_else(|| GuardError::TransientBackend("no attempt was made".to_string()))
    }
}

/// Loads a named resource despite transient backend failures.
pub struct RetryLoader {
    tables: Arc<dyn TableApi>,
    config: RetryConfig,
}

impl RetryLoader {
    pub fn new(tables: Arc<dyn TableApi>, config: RetryConfig) -> Self {
        Self { tables, config }
    }

    /// Load with the configured attempt budget.
    pub async fn load(&self, resource: &str, query: &Query) -> GuardResult<Vec<Row>> {
        self.load_with_retry(resource, query, self.config.max_attempts).await
    }

    pub async fn load_with_retry(&self, resource: &str, query: &Query, max_attempts: u32) -> GuardResult<Vec<Row>> {
        let mut state = RetryState::new(max_attempts);

        while let Some(attempt) = state.begin() {
            match self.attempt(resource, query).await {
                Ok(rows) => {
                    if attempt > 1 {
                        tracing::info!(resource, attempt, "Load succeeded after retry");
                    }
                    return Ok(rows);
                }
                Err(e) if !e.is_retryable() => {
                    tracing::error!(resource, attempt, error = %e, "Load failed with non-retryable error");
                    return Err(e);
                }
                Err(e) => {
                    metrics::record_retry_attempt(resource);
                    tracing::warn!(
                        resource,
                        attempt,
                        max_attempts = state.max_attempts(),
                        error = %e,
                        "Load attempt failed"
                    );
                    state.record_failure(e);

                    if attempt < state.max_attempts() {
                        tokio::time::sleep(linear_backoff(attempt, self.config.base_delay_ms)).await;
                    }
                }
            }
        }

        let error = state.into_error();
        tracing::error!(resource, error = %error, "Load failed after all attempts");
        Err(error)
    }

    async fn attempt(&self, resource: &str, query: &Query) -> GuardResult<Vec<Row>> {
        if self.config.probe {
            self.tables
                .select(resource, &Query::probe())
                .await
                .map_err(|e| match e {
                    GuardError::TransientBackend(msg) => {
                        GuardError::TransientBackend(format!("Database connection failed: {}", msg))
                    }
                    other => other,
                })?;
        }
        self.tables.select(resource, query).await
    }
}
