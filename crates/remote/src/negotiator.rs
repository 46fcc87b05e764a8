//! One-time capability handshake with an HTTP backend.

use std::collections::BTreeMap;
use std::time::Instant;

use driver::Backoff;
use pipeline::{
    CommunicationContract, Document, DriverError, EndpointAddress, NegotiationObserver,
    Typesystem,
};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::protocol::{Declaration, COMMUNICATION_LAYER_PATH, TYPESYSTEM_PATH};
use crate::HttpTransportConfig;

/// Negotiates a [`CommunicationContract`] with a backend address.
#[derive(Debug, Clone)]
pub struct HttpNegotiator {
    client: Client,
    config: HttpTransportConfig,
}

impl HttpNegotiator {
    pub fn new(client: Client, config: HttpTransportConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    /// Waits for `address` to answer the readiness probe, then binds a
    /// contract from its declaration and typesystem.
    ///
    /// With `skip_verification` no request is made and
    /// [`CommunicationContract::assumed`] is returned.
    #[instrument(skip_all, fields(address = %address))]
    pub async fn negotiate(
        &self,
        address: &EndpointAddress,
        probe: &Document,
        skip_verification: bool,
        observer: &dyn NegotiationObserver,
    ) -> Result<CommunicationContract, DriverError> {
        if skip_verification {
            observer.on_skipped(address);
            return Ok(CommunicationContract::assumed());
        }

        let started = Instant::now();
        let deadline = started + self.config.negotiation_timeout;
        let (declaration, attempts) = self
            .wait_until_ready(address, observer, started, deadline)
            .await?;
        let (format, version) = declaration.resolve(address)?;
        let typesystem = self
            .fetch_typesystem(address, started, deadline, attempts)
            .await?;

        let contract = CommunicationContract::wire(format, version, typesystem).ok_or_else(|| {
            DriverError::ProtocolMismatch {
                address: address.clone(),
                detail: format!("no codec for wire format {format}"),
            }
        })?;
        verify_probe(address, &contract, probe)?;

        debug!(%format, %version, "Negotiated communication contract");
        Ok(contract)
    }

    async fn wait_until_ready(
        &self,
        address: &EndpointAddress,
        observer: &dyn NegotiationObserver,
        started: Instant,
        deadline: Instant,
    ) -> Result<(Declaration, u32), DriverError> {
        let url = address.join(COMMUNICATION_LAYER_PATH);
        let backoff = self.config.probe_backoff();
        let mut attempt: u32 = 0;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DriverError::NegotiationTimeout {
                    address: address.clone(),
                    waited: started.elapsed(),
                    attempts: attempt,
                });
            }
            attempt += 1;

            let reason = match self
                .client
                .get(&url)
                .timeout(remaining.min(self.config.request_timeout))
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => match response.bytes().await {
                    Ok(body) => {
                        observer.on_ready(address, attempt, started.elapsed());
                        return Declaration::parse(address, &body).map(|d| (d, attempt));
                    }
                    Err(e) => format!("failed to read probe response: {e}"),
                },
                Ok(response) => format!("probe answered with status {}", response.status()),
                Err(e) => e.to_string(),
            };
            observer.on_probe_failed(address, attempt, started.elapsed(), &reason);

            let pause = Backoff::delay(&backoff, attempt - 1)
                .min(deadline.saturating_duration_since(Instant::now()));
            tokio::time::sleep(pause).await;
        }
    }

    /// Fetches the typesystem within what is left of the negotiation budget.
    async fn fetch_typesystem(
        &self,
        address: &EndpointAddress,
        started: Instant,
        deadline: Instant,
        attempts: u32,
    ) -> Result<Typesystem, DriverError> {
        let timed_out = || DriverError::NegotiationTimeout {
            address: address.clone(),
            waited: started.elapsed(),
            attempts,
        };
        let failed = |context: &str, e: reqwest::Error| {
            if e.is_timeout() {
                timed_out()
            } else {
                DriverError::ProtocolMismatch {
                    address: address.clone(),
                    detail: format!("{context}: {e}"),
                }
            }
        };
        let mismatch = |detail: String| DriverError::ProtocolMismatch {
            address: address.clone(),
            detail,
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(timed_out());
        }
        let response = self
            .client
            .get(address.join(TYPESYSTEM_PATH))
            .timeout(remaining.min(self.config.request_timeout))
            .send()
            .await
            .map_err(|e| failed("typesystem request failed", e))?;
        if !response.status().is_success() {
            return Err(mismatch(format!(
                "typesystem request answered with status {}",
                response.status()
            )));
        }
        let media_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| failed("unreadable typesystem", e))?;
        Ok(Typesystem::new(media_type, body))
    }
}

/// Encodes the probe document once as a structural check of the codec.
fn verify_probe(
    address: &EndpointAddress,
    contract: &CommunicationContract,
    probe: &Document,
) -> Result<(), DriverError> {
    let Some(codec) = contract.codec() else {
        return Ok(());
    };
    codec
        .encode(probe, &BTreeMap::new())
        .map(|_| ())
        .map_err(|e| DriverError::ProtocolMismatch {
            address: address.clone(),
            detail: format!("probe document cannot be encoded: {e}"),
        })
}
