//! Sending documents to a negotiated HTTP backend.

use std::collections::BTreeMap;

use pipeline::{CommunicationContract, Document, DriverError, EndpointAddress};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::debug;

use crate::protocol::{DOCUMENTATION_PATH, PROCESS_PATH};

/// Encodes `document`, posts it to `address`, and applies the response.
///
/// `document` is only modified if the whole round-trip succeeds.
pub async fn process_document(
    client: &Client,
    address: &EndpointAddress,
    contract: &CommunicationContract,
    parameters: &BTreeMap<String, String>,
    document: &mut Document,
) -> Result<(), DriverError> {
    let codec = contract.codec().ok_or_else(|| DriverError::ProtocolMismatch {
        address: address.clone(),
        detail: format!("{} contract cannot be sent over HTTP", contract.format()),
    })?;
    let transport = |message: String| DriverError::TransportFailure {
        address: address.clone(),
        message,
    };

    let body = codec.encode(document, parameters)?;
    debug!(address = %address, bytes = body.len(), "Sending document");

    let response = client
        .post(address.join(PROCESS_PATH))
        .header(CONTENT_TYPE, codec.content_type())
        .body(body)
        .send()
        .await
        .map_err(|e| transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(transport(format!("backend answered with status {status}: {detail}")));
    }
    let payload = response
        .bytes()
        .await
        .map_err(|e| transport(format!("failed to read response: {e}")))?;

    codec.decode(&payload, document)?;
    Ok(())
}

/// Fetches a backend's free-text documentation, if it publishes any.
pub async fn fetch_documentation(
    client: &Client,
    address: &EndpointAddress,
) -> Result<Option<String>, DriverError> {
    let response = client
        .get(address.join(DOCUMENTATION_PATH))
        .send()
        .await
        .map_err(|e| DriverError::TransportFailure {
            address: address.clone(),
            message: e.to_string(),
        })?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !response.status().is_success() {
        return Err(DriverError::TransportFailure {
            address: address.clone(),
            message: format!("documentation answered with status {}", response.status()),
        });
    }
    response
        .text()
        .await
        .map(Some)
        .map_err(|e| DriverError::TransportFailure {
            address: address.clone(),
            message: e.to_string(),
        })
}
