//! Shared value types for the annopipe domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (e.g. concurrency is at least one,
//! protocol versions compare by major/minor) and participate in driver
//! decisions.

use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ComponentName, DocumentId, InstanceId};

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

/// Number of endpoint handles kept for one instantiated component.
///
/// Fixed for the component's lifetime; it is the hard ceiling on documents
/// processed concurrently by that component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct Concurrency(NonZeroUsize);

impl Concurrency {
    /// Creates a [`Concurrency`], returning `None` for zero.
    #[must_use]
    pub fn new(value: usize) -> Option<Self> {
        NonZeroUsize::new(value).map(Self)
    }

    /// Returns the worker count.
    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Self(NonZeroUsize::MIN)
    }
}

impl TryFrom<usize> for Concurrency {
    type Error = String;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| "concurrency must be at least 1".to_string())
    }
}

impl From<Concurrency> for usize {
    fn from(value: Concurrency) -> Self {
        value.get()
    }
}

impl std::fmt::Display for Concurrency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Versioning
// ---------------------------------------------------------------------------

/// Version of the document exchange protocol a backend speaks.
///
/// Additive changes bump `minor`; breaking changes bump `major`. Declared by
/// the backend as `"1"` or `"1.0"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProtocolVersion {
    /// Major version — bumped on breaking changes.
    pub major: u32,
    /// Minor version — bumped on additive changes.
    pub minor: u32,
}

impl ProtocolVersion {
    /// The protocol revision this orchestrator implements.
    pub const V1: ProtocolVersion = ProtocolVersion { major: 1, minor: 0 };

    /// Creates a new [`ProtocolVersion`].
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Returns `true` if a backend declaring `other` can serve a caller that
    /// requires `self`.
    ///
    /// Compatibility requires the same major version and `other.minor >= self.minor`.
    pub fn is_compatible_with(self, other: ProtocolVersion) -> bool {
        self.major == other.major && other.minor >= self.minor
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ProtocolVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches(['v', 'V']);
        let mut parts = s.splitn(2, '.');
        let major = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(|| format!("invalid protocol version '{s}'"))?;
        let minor = match parts.next() {
            Some(p) => p
                .parse::<u32>()
                .map_err(|_| format!("invalid protocol version '{s}'"))?,
            None => 0,
        };
        Ok(Self { major, minor })
    }
}

impl TryFrom<String> for ProtocolVersion {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProtocolVersion> for String {
    fn from(value: ProtocolVersion) -> Self {
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// Serialisation format negotiated with a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// Whole document as JSON, annotations returned as JSON.
    Json,
    /// Raw document text, annotations returned as JSON.
    PlainText,
    /// No serialisation; the document is handed to an in-process engine.
    Native,
}

impl WireFormat {
    /// Parses the format name a backend declares during negotiation.
    ///
    /// Returns `None` for names this orchestrator does not recognise.
    /// `Native` is never accepted from a remote declaration.
    pub fn from_declaration(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" | "application/json" => Some(Self::Json),
            "text" | "plain-text" | "plain_text" | "text/plain" => Some(Self::PlainText),
            _ => None,
        }
    }
}

impl std::fmt::Display for WireFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Json => "json",
            Self::PlainText => "plain-text",
            Self::Native => "native",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Typesystem
// ---------------------------------------------------------------------------

/// Type/schema information a backend declares about the annotations it
/// produces. Captured once during negotiation and served verbatim afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Typesystem {
    /// Media type reported by the backend (e.g. `"application/xml"`).
    pub media_type: String,
    /// Schema body as returned by the backend.
    pub body: String,
}

impl Typesystem {
    /// Creates a [`Typesystem`] from a media type and body.
    pub fn new(media_type: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            body: body.into(),
        }
    }

    /// The assumed schema for backends whose negotiation was skipped.
    pub fn empty() -> Self {
        Self::new("text/plain", "")
    }

    /// Returns `true` if no schema body was captured.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Driver variants and lifecycle
// ---------------------------------------------------------------------------

/// The backend variant a driver serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    /// An already running HTTP service.
    Remote,
    /// An HTTP service started from a container image per handle.
    Container,
    /// A native engine running inside this process.
    InProcess,
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Remote => "remote",
            Self::Container => "container",
            Self::InProcess => "in_process",
        };
        write!(f, "{name}")
    }
}

/// Lifecycle of one instantiated component.
///
/// `Unregistered → Negotiating → Ready → Destroyed`. A failed negotiation
/// returns to `Unregistered` without ever being registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    Unregistered,
    Negotiating,
    Ready,
    Destroyed,
}

impl std::fmt::Display for ComponentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unregistered => "unregistered",
            Self::Negotiating => "negotiating",
            Self::Ready => "ready",
            Self::Destroyed => "destroyed",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Performance
// ---------------------------------------------------------------------------

/// One document's pass through one component, as reported to a
/// [`crate::PerformanceSink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    /// Instance that processed the document.
    pub instance: InstanceId,
    /// Name of the component, if the descriptor carried one.
    pub component: Option<ComponentName>,
    /// Document that was processed.
    pub document: DocumentId,
    /// Time spent waiting for a free endpoint handle.
    pub wait: Duration,
    /// Time spent encoding, sending, receiving, and decoding.
    pub process: Duration,
    /// Whether processing succeeded.
    pub success: bool,
    /// When processing finished.
    pub finished_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concurrency_defaults_to_one_and_rejects_zero() {
        assert_eq!(Concurrency::default().get(), 1);
        assert!(Concurrency::new(0).is_none());
        assert!(serde_json::from_str::<Concurrency>("0").is_err());
        assert_eq!(serde_json::from_str::<Concurrency>("4").unwrap().get(), 4);
    }

    #[test]
    fn test_protocol_version_parsing() {
        assert_eq!("1".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::new(1, 0));
        assert_eq!("v2.3".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::new(2, 3));
        assert!("one".parse::<ProtocolVersion>().is_err());
        assert!("1.x".parse::<ProtocolVersion>().is_err());
    }

    #[test]
    fn test_protocol_version_compatibility() {
        let required = ProtocolVersion::V1;
        assert!(required.is_compatible_with(ProtocolVersion::new(1, 0)));
        assert!(required.is_compatible_with(ProtocolVersion::new(1, 4)));
        assert!(!required.is_compatible_with(ProtocolVersion::new(2, 0)));
        assert!(!ProtocolVersion::new(1, 2).is_compatible_with(ProtocolVersion::new(1, 1)));
    }

    #[test]
    fn test_wire_format_declarations() {
        assert_eq!(WireFormat::from_declaration("JSON"), Some(WireFormat::Json));
        assert_eq!(WireFormat::from_declaration("text/plain"), Some(WireFormat::PlainText));
        assert_eq!(WireFormat::from_declaration("native"), None);
        assert_eq!(WireFormat::from_declaration("xmi"), None);
    }
}
