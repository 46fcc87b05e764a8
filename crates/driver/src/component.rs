use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pipeline::{CommunicationContract, ComponentDescriptor, ComponentState, InstanceId};

use crate::InstancePool;

/// A negotiated component: its descriptor, bound contract, and handle pool.
///
/// Shared behind an `Arc` between the registry and in-flight `run` calls, so
/// a destroyed component stays alive until its last in-flight call finishes.
#[derive(Debug)]
pub struct InstantiatedComponent<H> {
    id: InstanceId,
    descriptor: Arc<ComponentDescriptor>,
    contract: CommunicationContract,
    pool: InstancePool<H>,
    destroyed: AtomicBool,
}

impl<H> InstantiatedComponent<H> {
    pub fn new(
        id: InstanceId,
        descriptor: ComponentDescriptor,
        contract: CommunicationContract,
        pool: InstancePool<H>,
    ) -> Self {
        Self {
            id,
            descriptor: Arc::new(descriptor),
            contract,
            pool,
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    pub fn contract(&self) -> &CommunicationContract {
        &self.contract
    }

    pub fn pool(&self) -> &InstancePool<H> {
        &self.pool
    }

    pub fn state(&self) -> ComponentState {
        if self.destroyed.load(Ordering::Acquire) {
            ComponentState::Destroyed
        } else {
            ComponentState::Ready
        }
    }

    pub(crate) fn mark_destroyed(&self) {
        self.destroyed.store(true, Ordering::Release);
    }
}
