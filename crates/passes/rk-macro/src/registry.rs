//! Process-wide macro registry
//!
//! The registry maps annotation names to implementations. The global one
//! holds the built-in macros and is created on first use; hosts that need
//! other macros build their own with [`MacroRegistry::builder`]. Either way a
//! registry is immutable once built.

use crate::{ConfigurationError, MacroImplementation, builtins};
use rustc_hash::FxHashMap;
use std::sync::OnceLock;

static GLOBAL: OnceLock<MacroRegistry> = OnceLock::new();

/// Immutable map from macro id to implementation
pub struct MacroRegistry {
    macros: FxHashMap<&'static str, &'static dyn MacroImplementation>,
}

impl MacroRegistry {
    /// The registry of built-in macros
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(|| {
            tracing::debug!("initializing the macro registry");
            Self {
                macros: builtins::ALL
                    .iter()
                    .map(|implementation| (implementation.id(), *implementation))
                    .collect(),
            }
        })
    }

    /// Starts an empty registry
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Implementation registered for `id`
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::UnregisteredMacro`] when nothing is registered.
    pub fn lookup(&self, id: &str) -> Result<&'static dyn MacroImplementation, ConfigurationError> {
        let found = self.macros.get(id).copied();
        tracing::trace!(id, found = found.is_some(), "macro lookup");
        found.ok_or_else(|| ConfigurationError::UnregisteredMacro { id: id.to_string() })
    }

    /// Whether `id` is registered
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.macros.contains_key(id)
    }

    /// Registered ids, sorted
    #[must_use]
    pub fn ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<_> = self.macros.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// Collects implementations for a [`MacroRegistry`]
#[derive(Default)]
pub struct RegistryBuilder {
    macros: Vec<&'static dyn MacroImplementation>,
}

impl RegistryBuilder {
    /// Adds an implementation under its id
    #[must_use]
    pub fn register(mut self, implementation: &'static dyn MacroImplementation) -> Self {
        self.macros.push(implementation);
        self
    }

    /// Adds every built-in macro
    #[must_use]
    pub fn with_builtins(mut self) -> Self {
        self.macros.extend(builtins::ALL.iter().copied());
        self
    }

    /// Freezes the registry
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::DuplicateMacro`] when two implementations share
    /// an id.
    pub fn build(self) -> Result<MacroRegistry, ConfigurationError> {
        let mut macros = FxHashMap::default();
        for implementation in self.macros {
            let id = implementation.id();
            if macros.insert(id, implementation).is_some() {
                return Err(ConfigurationError::DuplicateMacro { id: id.to_string() });
            }
        }
        Ok(MacroRegistry { macros })
    }
}
