//! Wire codecs and the communication contract bound at negotiation.
//!
//! A [`CommunicationContract`] is the immutable outcome of negotiating with a
//! backend: which [`WireFormat`] and [`ProtocolVersion`] to use, the backend's
//! declared [`Typesystem`], and the [`DocumentCodec`] that encodes requests and
//! decodes responses. It is created once per instantiated component and
//! shared by every document sent to that component.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Annotation, CodecError, Document, ProtocolVersion, Typesystem, WireFormat};

// ---------------------------------------------------------------------------
// Codec port
// ---------------------------------------------------------------------------

/// Encodes documents for, and decodes responses from, one wire format.
pub trait DocumentCodec: Send + Sync + std::fmt::Debug {
    /// The format this codec implements.
    fn format(&self) -> WireFormat;

    /// `Content-Type` of encoded request bodies.
    fn content_type(&self) -> &'static str;

    /// Serialises `document` (and the component parameters) into a request body.
    fn encode(
        &self,
        document: &Document,
        parameters: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>, CodecError>;

    /// Applies a response body to `document`.
    ///
    /// On error `document` is left unchanged.
    fn decode(&self, body: &[u8], document: &mut Document) -> Result<(), CodecError>;
}

/// Response envelope shared by the JSON and plain-text formats.
#[derive(Debug, Deserialize)]
struct AnnotationsEnvelope {
    #[serde(default)]
    annotations: Vec<Annotation>,
}

#[derive(Debug, Serialize)]
struct JsonRequest<'a> {
    document: &'a Document,
    parameters: &'a BTreeMap<String, String>,
}

fn apply_annotations(
    format: WireFormat,
    body: &[u8],
    document: &mut Document,
) -> Result<(), CodecError> {
    let envelope: AnnotationsEnvelope =
        serde_json::from_slice(body).map_err(|e| CodecError::Decode {
            format,
            message: e.to_string(),
        })?;

    let len = document.text.len();
    if let Some(bad) = envelope
        .annotations
        .iter()
        .find(|a| a.begin > a.end || a.end > len)
    {
        return Err(CodecError::Decode {
            format,
            message: format!(
                "annotation '{}' [{}, {}) is outside the document text (length {len})",
                bad.layer, bad.begin, bad.end
            ),
        });
    }

    document.annotations.extend(envelope.annotations);
    Ok(())
}

// ---------------------------------------------------------------------------
// Built-in codecs
// ---------------------------------------------------------------------------

/// Sends `{"document": …, "parameters": {…}}`, receives `{"annotations": […]}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl DocumentCodec for JsonCodec {
    fn format(&self) -> WireFormat {
        WireFormat::Json
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode(
        &self,
        document: &Document,
        parameters: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(&JsonRequest {
            document,
            parameters,
        })
        .map_err(|e| CodecError::Encode {
            format: WireFormat::Json,
            message: e.to_string(),
        })
    }

    fn decode(&self, body: &[u8], document: &mut Document) -> Result<(), CodecError> {
        apply_annotations(WireFormat::Json, body, document)
    }
}

/// Sends the raw document text, receives `{"annotations": […]}`.
///
/// Component parameters are not transmitted in this format.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextCodec;

impl DocumentCodec for PlainTextCodec {
    fn format(&self) -> WireFormat {
        WireFormat::PlainText
    }

    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn encode(
        &self,
        document: &Document,
        _parameters: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>, CodecError> {
        Ok(document.text.as_bytes().to_vec())
    }

    fn decode(&self, body: &[u8], document: &mut Document) -> Result<(), CodecError> {
        apply_annotations(WireFormat::PlainText, body, document)
    }
}

/// Resolves the codec for a wire format. `Native` has none.
pub fn codec_for(format: WireFormat) -> Option<Arc<dyn DocumentCodec>> {
    match format {
        WireFormat::Json => Some(Arc::new(JsonCodec)),
        WireFormat::PlainText => Some(Arc::new(PlainTextCodec)),
        WireFormat::Native => None,
    }
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// The bound result of negotiating with a backend.
///
/// Cheap to clone; all clones share the same codec and typesystem.
#[derive(Debug, Clone)]
pub struct CommunicationContract {
    format: WireFormat,
    version: ProtocolVersion,
    typesystem: Arc<Typesystem>,
    codec: Option<Arc<dyn DocumentCodec>>,
}

impl CommunicationContract {
    /// Binds a contract for a serialising wire format.
    ///
    /// Returns `None` if the format has no codec.
    pub fn wire(format: WireFormat, version: ProtocolVersion, typesystem: Typesystem) -> Option<Self> {
        let codec = codec_for(format)?;
        Some(Self {
            format,
            version,
            typesystem: Arc::new(typesystem),
            codec: Some(codec),
        })
    }

    /// Binds a contract for an in-process engine; documents are not serialised.
    pub fn native(typesystem: Typesystem) -> Self {
        Self {
            format: WireFormat::Native,
            version: ProtocolVersion::V1,
            typesystem: Arc::new(typesystem),
            codec: None,
        }
    }

    /// The contract assumed when verification is skipped: JSON, protocol 1.0,
    /// no declared typesystem.
    pub fn assumed() -> Self {
        Self {
            format: WireFormat::Json,
            version: ProtocolVersion::V1,
            typesystem: Arc::new(Typesystem::empty()),
            codec: Some(Arc::new(JsonCodec)),
        }
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn typesystem(&self) -> &Typesystem {
        &self.typesystem
    }

    /// The codec for serialising formats; `None` for [`WireFormat::Native`].
    pub fn codec(&self) -> Option<&dyn DocumentCodec> {
        self.codec.as_deref()
    }
}
