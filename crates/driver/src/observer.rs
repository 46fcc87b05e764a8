use std::time::Duration;

use pipeline::{EndpointAddress, NegotiationObserver};
use tracing::{debug, info};

/// Default [`NegotiationObserver`]: reports progress as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl NegotiationObserver for TracingObserver {
    fn on_probe_failed(
        &self,
        address: &EndpointAddress,
        attempt: u32,
        elapsed: Duration,
        reason: &str,
    ) {
        debug!(
            address = %address,
            attempt,
            elapsed_ms = elapsed.as_millis() as u64,
            reason,
            "Backend not ready yet"
        );
    }

    fn on_ready(&self, address: &EndpointAddress, attempts: u32, elapsed: Duration) {
        info!(
            address = %address,
            attempts,
            elapsed_ms = elapsed.as_millis() as u64,
            "Backend is online"
        );
    }

    fn on_skipped(&self, address: &EndpointAddress) {
        info!(address = %address, "Skipping verification, assuming default contract");
    }
}
