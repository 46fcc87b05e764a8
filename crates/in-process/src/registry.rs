use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use pipeline::EngineName;

use crate::builtins::{SentenceSplitter, WhitespaceTokenizer};
use crate::AnalysisEngine;

/// Builds a fresh engine instance.
pub type EngineFactory = Arc<dyn Fn() -> Box<dyn AnalysisEngine> + Send + Sync>;

/// Engine name → factory.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    factories: HashMap<EngineName, EngineFactory>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `whitespace-tokenizer` and `sentence-splitter`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        if let Some(name) = EngineName::new(WhitespaceTokenizer::NAME) {
            registry.register(name, || Box::new(WhitespaceTokenizer));
        }
        if let Some(name) = EngineName::new(SentenceSplitter::NAME) {
            registry.register(name, || Box::new(SentenceSplitter));
        }
        registry
    }

    /// Registers `factory` under `name`, replacing any earlier registration.
    pub fn register<F>(&mut self, name: EngineName, factory: F)
    where
        F: Fn() -> Box<dyn AnalysisEngine> + Send + Sync + 'static,
    {
        self.factories.insert(name, Arc::new(factory));
    }

    pub fn contains(&self, name: &EngineName) -> bool {
        self.factories.contains_key(name)
    }

    /// Builds a new instance of the named engine.
    pub fn create(&self, name: &EngineName) -> Option<Box<dyn AnalysisEngine>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&EngineName> {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("engines", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_registered() {
        let registry = EngineRegistry::with_builtins();
        let names: Vec<_> = registry.names().into_iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["sentence-splitter", "whitespace-tokenizer"]);
        assert!(registry.create(&EngineName::new("missing").unwrap()).is_none());
    }

    #[test]
    fn test_register_replaces_existing_factory() {
        let mut registry = EngineRegistry::with_builtins();
        let name = EngineName::new("whitespace-tokenizer").unwrap();
        registry.register(name.clone(), || Box::new(SentenceSplitter));
        let engine = registry.create(&name).unwrap();
        assert!(engine.typesystem().body.contains("sentence"));
    }
}
