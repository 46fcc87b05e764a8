use async_trait::async_trait;
use driver::{Backend, ComponentDriver, ProvisionRequest, Provisioned};
use pipeline::{
    CommunicationContract, ComponentDescriptor, Document, DriverError, DriverKind,
    EndpointAddress,
};
use reqwest::Client;
use tracing::info;

use crate::{build_client, transport, HttpNegotiator, HttpTransportConfig};

/// Driver for already running HTTP services.
pub type RemoteDriver = ComponentDriver<RemoteBackend>;

/// Builds a [`RemoteDriver`] with its own HTTP client.
pub fn remote_driver(config: HttpTransportConfig) -> Result<RemoteDriver, DriverError> {
    Ok(ComponentDriver::new(RemoteBackend::new(config)?))
}

/// One slot of a remote component's pool.
///
/// Several endpoints share an address when one service scales internally;
/// with multiple addresses the slots are spread round-robin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub address: EndpointAddress,
    pub slot: usize,
}

/// [`Backend`] for services reachable at fixed addresses.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: Client,
    negotiator: HttpNegotiator,
}

impl RemoteBackend {
    pub fn new(config: HttpTransportConfig) -> Result<Self, DriverError> {
        let client = build_client(&config)?;
        Ok(Self {
            negotiator: HttpNegotiator::new(client.clone(), config),
            client,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn distinct_addresses(descriptor: &ComponentDescriptor) -> Vec<EndpointAddress> {
    let mut seen = Vec::with_capacity(descriptor.addresses.len());
    for address in &descriptor.addresses {
        if !seen.contains(address) {
            seen.push(address.clone());
        }
    }
    seen
}

#[async_trait]
impl Backend for RemoteBackend {
    type Handle = RemoteEndpoint;

    fn kind(&self) -> DriverKind {
        DriverKind::Remote
    }

    fn can_accept(&self, descriptor: &ComponentDescriptor) -> bool {
        !descriptor.addresses.is_empty()
    }

    async fn provision(
        &self,
        request: ProvisionRequest<'_>,
    ) -> Result<Provisioned<RemoteEndpoint>, DriverError> {
        let addresses = distinct_addresses(request.descriptor);
        let Some((first, rest)) = addresses.split_first() else {
            return Err(DriverError::invalid_descriptor(
                "remote component has no address",
            ));
        };

        let contract = self
            .negotiator
            .negotiate(first, request.probe, request.skip_verification, request.observer)
            .await?;
        for address in rest {
            let other = self
                .negotiator
                .negotiate(address, request.probe, request.skip_verification, request.observer)
                .await?;
            if other.format() != contract.format() {
                return Err(DriverError::ProtocolMismatch {
                    address: address.clone(),
                    detail: format!(
                        "declares {} but {first} declares {}",
                        other.format(),
                        contract.format()
                    ),
                });
            }
        }

        let handles = (0..request.descriptor.concurrency.get())
            .map(|slot| RemoteEndpoint {
                address: addresses[slot % addresses.len()].clone(),
                slot,
            })
            .collect::<Vec<_>>();

        info!(
            instance_id = %request.id,
            addresses = addresses.len(),
            format = %contract.format(),
            version = %contract.version(),
            "Remote endpoints understand the v1 protocol"
        );
        Ok(Provisioned { contract, handles })
    }

    async fn process(
        &self,
        handle: &mut RemoteEndpoint,
        contract: &CommunicationContract,
        descriptor: &ComponentDescriptor,
        document: &mut Document,
    ) -> Result<(), DriverError> {
        transport::process_document(
            &self.client,
            &handle.address,
            contract,
            &descriptor.parameters,
            document,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_addresses_keeps_first_occurrence_order() {
        let d = ComponentDescriptor::remote("http://b:1")
            .unwrap()
            .with_address("http://a:1")
            .with_address("http://b:1/");
        let addresses = distinct_addresses(&d);
        assert_eq!(addresses.len(), 2);
        assert_eq!(addresses[0].as_str(), "http://b:1");
        assert_eq!(addresses[1].as_str(), "http://a:1");
    }
}
