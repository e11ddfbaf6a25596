use std::collections::HashMap;

use crate::error::HardwareError;
use crate::translate::{GridTranslator, SignalTranslator, StripTranslator};

/// Builds a translator for one interface family.
pub type TranslatorCtor = fn() -> Box<dyn SignalTranslator>;

/// Static map from interface key to translator constructor, populated once
/// at start-up.
#[derive(Debug, Clone)]
pub struct InterfaceRegistry {
    ctors: HashMap<&'static str, TranslatorCtor>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self {
            ctors: HashMap::new(),
        }
    }

    /// Registry with the built-in interface families.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry
            .ctors
            .insert(GridTranslator::KEY, || Box::new(GridTranslator::default()));
        registry
            .ctors
            .insert(StripTranslator::KEY, || Box::new(StripTranslator::default()));
        registry
    }

    /// Register a constructor. Returns error if the key is already taken.
    pub fn register(&mut self, key: &'static str, ctor: TranslatorCtor) -> Result<(), HardwareError> {
        if self.ctors.contains_key(key) {
            return Err(HardwareError::DuplicateInterface(key.to_string()));
        }
        self.ctors.insert(key, ctor);
        Ok(())
    }

    /// Construct the translator registered under `key`.
    pub fn create(&self, key: &str) -> Result<Box<dyn SignalTranslator>, HardwareError> {
        self.ctors
            .get(key)
            .map(|ctor| ctor())
            .ok_or_else(|| HardwareError::UnknownInterface(key.to_string()))
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.ctors.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.ctors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ctors.is_empty()
    }
}

impl Default for InterfaceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_has_grid_and_strip() {
        let registry = InterfaceRegistry::builtin();
        assert_eq!(registry.keys(), ["grid", "strip"]);
        assert_eq!(registry.create("grid").unwrap().kind(), "grid");
        assert_eq!(registry.create("strip").unwrap().kind(), "strip");
    }

    #[test]
    fn unknown_key_is_an_error() {
        let registry = InterfaceRegistry::builtin();
        assert!(matches!(
            registry.create("theremin"),
            Err(HardwareError::UnknownInterface(k)) if k == "theremin"
        ));
    }

    #[test]
    fn duplicate_registration() {
        let mut registry = InterfaceRegistry::new();
        registry
            .register("wide-grid", || Box::new(GridTranslator::new(16, 8)))
            .unwrap();
        assert!(registry
            .register("wide-grid", || Box::new(GridTranslator::new(16, 8)))
            .is_err());
        assert_eq!(registry.len(), 1);
    }
}
