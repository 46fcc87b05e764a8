//! The per-variant seam of the driver.
//!
//! A [`Backend`] supplies only what differs between remote, containerized,
//! and in-process components: how to negotiate and build handles, and how to
//! push one document through one handle. Pooling, registration, lifecycle,
//! and performance reporting live in [`crate::ComponentDriver`].

use async_trait::async_trait;
use pipeline::{
    CommunicationContract, ComponentDescriptor, Document, DriverError, DriverKind, InstanceId,
    NegotiationObserver,
};

/// Everything a backend needs to provision one component.
pub struct ProvisionRequest<'a> {
    /// Identifier the component will be registered under on success.
    pub id: InstanceId,
    pub descriptor: &'a ComponentDescriptor,
    /// Structural test payload for verification.
    pub probe: &'a Document,
    pub skip_verification: bool,
    pub observer: &'a dyn NegotiationObserver,
}

/// Output of a successful provisioning: the bound contract and exactly
/// `descriptor.concurrency` handles.
pub struct Provisioned<H> {
    pub contract: CommunicationContract,
    pub handles: Vec<H>,
}

#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// One addressable backend worker. Used by at most one caller at a time.
    type Handle: Send + 'static;

    fn kind(&self) -> DriverKind;

    /// Returns `true` iff `descriptor` carries the targets this backend needs.
    fn can_accept(&self, descriptor: &ComponentDescriptor) -> bool;

    /// Negotiates with the component's backend and builds its handles.
    ///
    /// On error, any resources acquired so far must already be released.
    async fn provision(
        &self,
        request: ProvisionRequest<'_>,
    ) -> Result<Provisioned<Self::Handle>, DriverError>;

    /// Sends one document through one handle using the bound contract.
    ///
    /// On error `document` must be left as it was.
    async fn process(
        &self,
        handle: &mut Self::Handle,
        contract: &CommunicationContract,
        descriptor: &ComponentDescriptor,
        document: &mut Document,
    ) -> Result<(), DriverError>;

    /// Releases per-handle resources after a component is destroyed.
    async fn teardown(&self, handles: Vec<Self::Handle>) {
        drop(handles);
    }

    /// Releases backend-wide resources. Called once.
    async fn shutdown(&self) {}
}
