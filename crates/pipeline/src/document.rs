//! Minimal document model passed between components.
//!
//! Annotation semantics belong to the backends; the orchestrator only carries
//! annotations along and appends what each component returns.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::DocumentId;

/// A document in flight through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl Document {
    /// Creates an un-annotated document.
    pub fn new(id: DocumentId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            language: None,
            annotations: Vec::new(),
        }
    }

    /// Sets the document language.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Returns the annotations of one layer.
    pub fn layer<'a>(&'a self, layer: &'a str) -> impl Iterator<Item = &'a Annotation> + 'a {
        self.annotations.iter().filter(move |a| a.layer == layer)
    }
}

/// A span annotation over the document text.
///
/// `begin`/`end` are byte offsets into [`Document::text`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub layer: String,
    pub begin: usize,
    pub end: usize,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub features: Map<String, Value>,
}

impl Annotation {
    /// Creates an annotation with no features.
    pub fn new(layer: impl Into<String>, begin: usize, end: usize) -> Self {
        Self {
            layer: layer.into(),
            begin,
            end,
            features: Map::new(),
        }
    }

    /// Adds a feature value.
    #[must_use]
    pub fn with_feature(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.features.insert(key.into(), value.into());
        self
    }
}
