//! The one [`Driver`] implementation shared by every backend variant.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use pipeline::{
    ComponentDescriptor, ComponentState, Document, Driver, DriverError, DriverKind, InstanceId,
    NegotiationObserver, PerformanceRecord, PerformanceSink, Timestamp, Typesystem,
};
use tracing::{debug, info, instrument, warn};

use crate::{
    Backend, ComponentRegistry, InstancePool, InstantiatedComponent, ProvisionRequest,
    TracingObserver,
};

/// Generic driver: a [`Backend`] plus the registry, pools, and lifecycle
/// rules common to all variants.
pub struct ComponentDriver<B: Backend> {
    backend: B,
    registry: ComponentRegistry<B::Handle>,
    observer: Arc<dyn NegotiationObserver>,
    shut_down: AtomicBool,
}

impl<B: Backend> ComponentDriver<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            registry: ComponentRegistry::new(),
            observer: Arc::new(TracingObserver),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Replaces the negotiation observer (default: [`TracingObserver`]).
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn NegotiationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Lifecycle state of an identifier as seen by this driver.
    pub fn state(&self, id: InstanceId) -> ComponentState {
        if let Some(component) = self.registry.get(id) {
            component.state()
        } else if self.registry.is_retired(id) {
            ComponentState::Destroyed
        } else {
            ComponentState::Unregistered
        }
    }

    /// Idle handles in the component's pool.
    pub fn available_handles(&self, id: InstanceId) -> Result<usize, DriverError> {
        Ok(self.lookup(id)?.pool().available())
    }

    /// Logs the component's concurrency ceiling and current pool occupancy.
    pub fn log_concurrency(&self, id: InstanceId) -> Result<(), DriverError> {
        let component = self.lookup(id)?;
        info!(
            instance_id = %id,
            capacity = component.pool().capacity(),
            available = component.pool().available(),
            "Component concurrency"
        );
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), DriverError> {
        if self.shut_down.load(Ordering::SeqCst) {
            Err(DriverError::ShutDown)
        } else {
            Ok(())
        }
    }

    fn lookup(&self, id: InstanceId) -> Result<Arc<InstantiatedComponent<B::Handle>>, DriverError> {
        self.registry
            .get(id)
            .ok_or(DriverError::UnknownIdentifier { id })
    }

    async fn release_component(&self, component: Arc<InstantiatedComponent<B::Handle>>) {
        component.mark_destroyed();
        let handles = component.pool().drain().await;
        debug!(
            instance_id = %component.id(),
            handles = handles.len(),
            "Releasing component handles"
        );
        self.backend.teardown(handles).await;
    }
}

#[async_trait]
impl<B: Backend> Driver for ComponentDriver<B> {
    fn kind(&self) -> DriverKind {
        self.backend.kind()
    }

    fn can_accept(&self, descriptor: &ComponentDescriptor) -> bool {
        descriptor.driver == self.backend.kind() && self.backend.can_accept(descriptor)
    }

    #[instrument(skip_all, fields(driver = %self.backend.kind(), component = ?descriptor.name))]
    async fn instantiate(
        &self,
        descriptor: &ComponentDescriptor,
        probe: &Document,
        skip_verification: bool,
    ) -> Result<InstanceId, DriverError> {
        self.ensure_running()?;
        if !self.can_accept(descriptor) {
            return Err(DriverError::invalid_descriptor(format!(
                "the {} driver cannot serve this component (missing target?)",
                self.backend.kind()
            )));
        }

        let id = self.registry.mint_id();
        debug!(instance_id = %id, state = %ComponentState::Negotiating, "Negotiating");

        let provisioned = match self
            .backend
            .provision(ProvisionRequest {
                id,
                descriptor,
                probe,
                skip_verification,
                observer: self.observer.as_ref(),
            })
            .await
        {
            Ok(provisioned) => provisioned,
            Err(error) => {
                warn!(instance_id = %id, state = %ComponentState::Unregistered, error = %error, "Negotiation failed");
                return Err(error);
            }
        };

        if self.ensure_running().is_err() {
            warn!(instance_id = %id, "Driver shut down during negotiation");
            self.backend.teardown(provisioned.handles).await;
            return Err(DriverError::ShutDown);
        }

        let expected = descriptor.concurrency.get();
        if provisioned.handles.len() != expected {
            let got = provisioned.handles.len();
            self.backend.teardown(provisioned.handles).await;
            return Err(DriverError::Provisioning {
                message: format!("backend built {got} handles, expected {expected}"),
            });
        }
        let Some(pool) = InstancePool::new(provisioned.handles) else {
            return Err(DriverError::Provisioning {
                message: "backend built no handles".to_string(),
            });
        };

        let component = Arc::new(InstantiatedComponent::new(
            id,
            descriptor.clone(),
            provisioned.contract,
            pool,
        ));
        if let Err(rejected) = self.registry.insert(component) {
            // Only reachable if the id was retired while negotiating.
            self.release_component(rejected).await;
            return Err(DriverError::Provisioning {
                message: format!("instance id {id} was taken during negotiation"),
            });
        }
        // `shutdown` flips the flag before collecting the registry, so a
        // shutdown racing this insert either sees the component or is seen here.
        if self.ensure_running().is_err() {
            if let Some(component) = self.registry.remove(id) {
                self.release_component(component).await;
            }
            return Err(DriverError::ShutDown);
        }

        info!(
            instance_id = %id,
            state = %ComponentState::Ready,
            concurrency = expected,
            "Component is online"
        );
        Ok(id)
    }

    #[instrument(skip_all, fields(instance_id = %id, document = %document.id))]
    async fn run(
        &self,
        id: InstanceId,
        document: &mut Document,
        sink: &dyn PerformanceSink,
    ) -> Result<(), DriverError> {
        self.ensure_running()?;
        let component = self.lookup(id)?;
        let Some(mut lease) = component.pool().acquire().await else {
            // Destroyed while we were waiting for a handle.
            return Err(DriverError::UnknownIdentifier { id });
        };
        let waited = lease.waited();

        let started = Instant::now();
        let result = self
            .backend
            .process(
                &mut *lease,
                component.contract(),
                component.descriptor(),
                document,
            )
            .await;
        let process = started.elapsed();
        drop(lease);

        if let Err(error) = &result {
            warn!(error = %error, "Document processing failed");
        }
        sink.record(PerformanceRecord {
            instance: id,
            component: component.descriptor().name.clone(),
            document: document.id.clone(),
            wait: waited,
            process,
            success: result.is_ok(),
            finished_at: Timestamp::now(),
        });
        result
    }

    fn typesystem(&self, id: InstanceId) -> Result<Typesystem, DriverError> {
        self.ensure_running()?;
        Ok(self.lookup(id)?.contract().typesystem().clone())
    }

    #[instrument(skip_all, fields(instance_id = %id))]
    async fn destroy(&self, id: InstanceId) -> Result<(), DriverError> {
        self.ensure_running()?;
        let component = self
            .registry
            .remove(id)
            .ok_or(DriverError::UnknownIdentifier { id })?;
        self.release_component(component).await;
        info!(state = %ComponentState::Destroyed, "Component destroyed");
        Ok(())
    }

    async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        for component in self.registry.remove_all() {
            self.release_component(component).await;
        }
        self.backend.shutdown().await;
        info!(driver = %self.backend.kind(), "Driver shut down");
    }

    fn instance_count(&self) -> usize {
        self.registry.len()
    }
}
