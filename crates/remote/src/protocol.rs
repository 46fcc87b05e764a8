//! Endpoint layout and negotiation payloads of the v1 component protocol.
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `GET`  | `/v1/communication_layer` | Readiness probe; returns a [`Declaration`] |
//! | `GET`  | `/v1/typesystem` | The backend's annotation schema |
//! | `POST` | `/v1/process` | One document, encoded by the negotiated codec |
//! | `GET`  | `/v1/documentation` | Optional free-text documentation |

use pipeline::{DriverError, EndpointAddress, ProtocolVersion, WireFormat};
use serde::{Deserialize, Serialize};

pub const COMMUNICATION_LAYER_PATH: &str = "/v1/communication_layer";
pub const TYPESYSTEM_PATH: &str = "/v1/typesystem";
pub const PROCESS_PATH: &str = "/v1/process";
pub const DOCUMENTATION_PATH: &str = "/v1/documentation";

/// What a backend says about itself on the readiness probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub format: String,
    /// Absent means `1.0`.
    #[serde(default)]
    pub version: Option<String>,
}

impl Declaration {
    /// Parses a probe response body.
    pub fn parse(address: &EndpointAddress, body: &[u8]) -> Result<Self, DriverError> {
        serde_json::from_slice(body).map_err(|e| DriverError::ProtocolMismatch {
            address: address.clone(),
            detail: format!("unreadable communication layer declaration: {e}"),
        })
    }

    /// Maps the declaration onto a format and version this orchestrator
    /// supports.
    pub fn resolve(
        &self,
        address: &EndpointAddress,
    ) -> Result<(WireFormat, ProtocolVersion), DriverError> {
        let mismatch = |detail: String| DriverError::ProtocolMismatch {
            address: address.clone(),
            detail,
        };

        let format = WireFormat::from_declaration(&self.format)
            .ok_or_else(|| mismatch(format!("unsupported wire format '{}'", self.format)))?;
        let version = match &self.version {
            Some(raw) => raw.parse::<ProtocolVersion>().map_err(mismatch)?,
            None => ProtocolVersion::V1,
        };
        if !ProtocolVersion::V1.is_compatible_with(version) {
            return Err(mismatch(format!(
                "protocol version {version} is incompatible with {}",
                ProtocolVersion::V1
            )));
        }
        Ok((format, version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> EndpointAddress {
        EndpointAddress::new("http://backend:9714").unwrap()
    }

    #[test]
    fn test_resolves_supported_declarations() {
        let d = Declaration::parse(&address(), br#"{"format":"json","version":"1.2"}"#).unwrap();
        assert_eq!(
            d.resolve(&address()).unwrap(),
            (WireFormat::Json, ProtocolVersion::new(1, 2))
        );

        let d = Declaration::parse(&address(), br#"{"format":"text"}"#).unwrap();
        assert_eq!(
            d.resolve(&address()).unwrap(),
            (WireFormat::PlainText, ProtocolVersion::V1)
        );
    }

    #[test]
    fn test_rejects_unknown_formats_and_versions() {
        let bodies: [&[u8]; 3] = [
            br#"{"format":"xmi"}"#,
            br#"{"format":"json","version":"2.0"}"#,
            br#"{"format":"json","version":"latest"}"#,
        ];
        for body in bodies {
            let d = Declaration::parse(&address(), body).unwrap();
            assert!(matches!(
                d.resolve(&address()),
                Err(DriverError::ProtocolMismatch { .. })
            ));
        }
    }

    #[test]
    fn test_rejects_non_json_declarations() {
        let err = Declaration::parse(&address(), b"return { serialize = ... }").unwrap_err();
        assert!(matches!(err, DriverError::ProtocolMismatch { .. }));
    }
}
