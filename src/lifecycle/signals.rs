//! OS signal handling.

use crate::lifecycle::Teardown;

/// Wait for Ctrl-C, then trigger teardown.
pub async fn teardown_on_interrupt(teardown: Teardown) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Interrupt received, tearing down");
            teardown.trigger();
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for interrupt signal");
        }
    }
}
