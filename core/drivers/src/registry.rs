//! Named driver factories.
//!
//! Store configuration files list candidate drivers by name, highest
//! priority first. The registry turns each name into a fresh driver instance;
//! selection among the candidates happens later, in the storage orchestrator.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use tabstore_common::{Error, Result};

use crate::area::AreaContext;
use crate::area_driver::AreaDriver;
use crate::driver::Driver;
use crate::memory::MemoryDriver;

/// Builds a driver from the store's `driverConfig` value.
pub type DriverFactory = Box<dyn Fn(Value) -> Result<Arc<dyn Driver>> + Send + Sync>;

/// Driver names mapped to their factories.
///
/// Resolving a name twice yields two independent drivers.
pub struct DriverRegistry {
    factories: BTreeMap<String, DriverFactory>,
}

impl DriverRegistry {
    /// Registry with no drivers; see [`create_default_registry`].
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Make `name` resolvable.
    ///
    /// # Errors
    /// - `AlreadyExists` if `name` is taken; the first factory is kept
    pub fn register(&mut self, name: impl Into<String>, factory: DriverFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::AlreadyExists(format!(
                "Driver '{}' is already registered",
                name
            )));
        }
        debug!("Registered driver '{}'", name);
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Instantiate the driver registered as `name`.
    ///
    /// The returned driver is not yet initialised; its support probe may
    /// still reject it during selection.
    ///
    /// # Errors
    /// - `NotFound` for an unknown name
    /// - Whatever the factory returns for an unusable `config`
    pub fn resolve(&self, name: &str, config: Value) -> Result<Arc<dyn Driver>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("Driver '{}' is not registered", name)))?;
        factory(config)
    }

    /// Names accepted by [`resolve`](Self::resolve), in lexical order.
    pub fn drivers(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn has_driver(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a registry with the built-in drivers for one execution context.
///
/// `"area"` drivers write through `context`; `"memory"` drivers are private
/// to each resolved instance.
pub fn create_default_registry(context: AreaContext) -> DriverRegistry {
    let mut registry = DriverRegistry::new();

    registry.factories.insert(
        "memory".to_string(),
        Box::new(|_config| Ok(Arc::new(MemoryDriver::new()) as Arc<dyn Driver>)),
    );
    registry.factories.insert(
        "area".to_string(),
        Box::new(move |_config| Ok(Arc::new(AreaDriver::new(context.clone())) as Arc<dyn Driver>)),
    );

    registry
}
