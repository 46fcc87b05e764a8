//! Port traits implemented by infrastructure crates.
//!
//! The pipeline runner only ever sees these traits; HTTP clients, container
//! runtimes, and native engines stay behind them.

use std::time::Duration;

use async_trait::async_trait;

use crate::{
    ComponentDescriptor, Document, DriverError, DriverKind, EndpointAddress, InstanceId,
    PerformanceRecord, Typesystem,
};

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// A backend driver: negotiates with, pools, and runs documents through the
/// components it instantiates.
///
/// Implementations must be safe to call concurrently from many tasks. Only
/// `run` is on the per-document hot path.
#[async_trait]
pub trait Driver: Send + Sync {
    /// The backend variant this driver serves.
    fn kind(&self) -> DriverKind;

    /// Returns `true` iff the descriptor carries the fields this driver needs.
    fn can_accept(&self, descriptor: &ComponentDescriptor) -> bool;

    /// Negotiates with the component's backend, builds its instance pool, and
    /// registers it under a fresh identifier.
    ///
    /// Nothing is registered if negotiation fails.
    async fn instantiate(
        &self,
        descriptor: &ComponentDescriptor,
        probe: &Document,
        skip_verification: bool,
    ) -> Result<InstanceId, DriverError>;

    /// Processes one document through the identified component, reporting
    /// timings to `sink`.
    async fn run(
        &self,
        id: InstanceId,
        document: &mut Document,
        sink: &dyn PerformanceSink,
    ) -> Result<(), DriverError>;

    /// Returns the typesystem captured when the component was negotiated.
    fn typesystem(&self, id: InstanceId) -> Result<Typesystem, DriverError>;

    /// Unregisters the component and releases its backend resources.
    ///
    /// In-flight `run` calls finish; later calls fail with
    /// [`DriverError::UnknownIdentifier`], as does a second `destroy`.
    async fn destroy(&self, id: InstanceId) -> Result<(), DriverError>;

    /// Destroys every live component and releases driver-wide resources.
    /// Idempotent.
    async fn shutdown(&self);

    /// Number of live instantiated components.
    fn instance_count(&self) -> usize;
}

// ---------------------------------------------------------------------------
// Performance sink
// ---------------------------------------------------------------------------

/// Receives one [`PerformanceRecord`] per document per component.
pub trait PerformanceSink: Send + Sync {
    fn record(&self, record: PerformanceRecord);
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPerformanceSink;

impl PerformanceSink for NullPerformanceSink {
    fn record(&self, _record: PerformanceRecord) {}
}

// ---------------------------------------------------------------------------
// Negotiation observer
// ---------------------------------------------------------------------------

/// Notified of negotiation progress. Informational only; observers cannot
/// influence the outcome.
pub trait NegotiationObserver: Send + Sync {
    /// A readiness probe failed and negotiation will try again.
    fn on_probe_failed(
        &self,
        address: &EndpointAddress,
        attempt: u32,
        elapsed: Duration,
        reason: &str,
    );

    /// The backend answered the readiness probe.
    fn on_ready(&self, address: &EndpointAddress, attempts: u32, elapsed: Duration);

    /// Verification was skipped and the assumed contract used.
    fn on_skipped(&self, address: &EndpointAddress) {
        let _ = address;
    }
}
