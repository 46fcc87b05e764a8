//! Caller-supplied description of one pipeline component.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ComponentName, Concurrency, DriverKind, EndpointAddress, EngineName, ImageName};

/// Immutable specification of a pipeline component.
///
/// Built once by the caller (directly or from pipeline configuration) and
/// handed to a driver's `instantiate`. Which target fields must be present
/// depends on the driver: remote components need at least one address,
/// container components an image, in-process components an engine name.
///
/// ```
/// use pipeline::ComponentDescriptor;
///
/// let ner = ComponentDescriptor::remote("http://ner.internal:9714")
///     .unwrap()
///     .with_concurrency(4)
///     .with_parameter("model", "de_core")
///     .with_description("German named entities");
/// assert_eq!(ner.concurrency.get(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentDescriptor {
    /// Which driver variant serves this component.
    pub driver: DriverKind,

    /// Optional display name for logs and performance summaries.
    #[serde(default)]
    pub name: Option<ComponentName>,

    /// Backend addresses. Handles are spread round-robin across them.
    #[serde(default)]
    pub addresses: Vec<EndpointAddress>,

    /// Container image for the container driver.
    #[serde(default)]
    pub image: Option<ImageName>,

    /// Registered engine name for the in-process driver.
    #[serde(default)]
    pub engine: Option<EngineName>,

    /// Number of endpoint handles; the component's concurrency ceiling.
    #[serde(default, alias = "scale")]
    pub concurrency: Concurrency,

    /// Parameters forwarded to the backend with every document.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,

    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
}

impl ComponentDescriptor {
    fn empty(driver: DriverKind) -> Self {
        Self {
            driver,
            name: None,
            addresses: Vec::new(),
            image: None,
            engine: None,
            concurrency: Concurrency::default(),
            parameters: BTreeMap::new(),
            description: None,
        }
    }

    /// Starts a descriptor for an already running HTTP service.
    ///
    /// Returns `None` if `address` is empty.
    pub fn remote(address: impl Into<String>) -> Option<Self> {
        let address = EndpointAddress::new(address)?;
        let mut descriptor = Self::empty(DriverKind::Remote);
        descriptor.addresses.push(address);
        Some(descriptor)
    }

    /// Starts a descriptor for a service started from a container image.
    ///
    /// Returns `None` if `image` is empty.
    pub fn container(image: impl Into<String>) -> Option<Self> {
        let image = ImageName::new(image)?;
        let mut descriptor = Self::empty(DriverKind::Container);
        descriptor.image = Some(image);
        Some(descriptor)
    }

    /// Starts a descriptor for a registered in-process engine.
    ///
    /// Returns `None` if `engine` is empty.
    pub fn in_process(engine: impl Into<String>) -> Option<Self> {
        let engine = EngineName::new(engine)?;
        let mut descriptor = Self::empty(DriverKind::InProcess);
        descriptor.engine = Some(engine);
        Some(descriptor)
    }

    /// Starts a descriptor with no targets at all. Every driver rejects it
    /// until a target is added.
    pub fn bare(driver: DriverKind) -> Self {
        Self::empty(driver)
    }

    /// Adds another backend address. Empty addresses are ignored.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        if let Some(address) = EndpointAddress::new(address) {
            self.addresses.push(address);
        }
        self
    }

    /// Sets the concurrency. Zero is clamped to one.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Concurrency::new(concurrency).unwrap_or_default();
        self
    }

    /// Sets a parameter, replacing any previous value for `key`.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Sets the free-text description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the display name. Empty names are ignored.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        if let Some(name) = ComponentName::new(name) {
            self.name = Some(name);
        }
        self
    }
}
