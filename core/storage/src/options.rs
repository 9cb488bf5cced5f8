//! In-process storage configuration.

use std::fmt;
use std::sync::Arc;

use tabstore_common::{Error, Result, StorageIdentity};
use tabstore_drivers::{AreaContext, Driver};

/// Everything needed to construct a [`Storage`](crate::Storage).
#[derive(Clone)]
pub struct StorageOptions {
    pub identity: StorageIdentity,
    /// Candidate drivers, highest priority first.
    pub drivers: Vec<Arc<dyn Driver>>,
    /// Context used for cross-tab notification; `None` disables it.
    pub cross_tab: Option<AreaContext>,
}

impl StorageOptions {
    pub fn new(identity: StorageIdentity, drivers: Vec<Arc<dyn Driver>>) -> Self {
        Self {
            identity,
            drivers,
            cross_tab: None,
        }
    }

    /// Options with a single candidate driver.
    pub fn with_single_driver(identity: StorageIdentity, driver: Arc<dyn Driver>) -> Self {
        Self::new(identity, vec![driver])
    }

    /// Append a lower-priority candidate.
    pub fn with_driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.drivers.push(driver);
        self
    }

    /// Enable cross-tab notification through `context`.
    pub fn with_cross_tab(mut self, context: AreaContext) -> Self {
        self.cross_tab = Some(context);
        self
    }

    pub fn cross_tab_notification(&self) -> bool {
        self.cross_tab.is_some()
    }

    /// Check the configuration invariants.
    ///
    /// # Errors
    /// - Empty `name` or `store_name`
    /// - No candidate drivers
    pub fn validate(&self) -> Result<()> {
        self.identity.validate()?;
        if self.drivers.is_empty() {
            return Err(Error::InvalidInput(
                "At least one candidate driver is required".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for StorageOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let drivers: Vec<&str> = self.drivers.iter().map(|d| d.name()).collect();
        f.debug_struct("StorageOptions")
            .field("identity", &self.identity)
            .field("drivers", &drivers)
            .field("cross_tab", &self.cross_tab.as_ref().map(|c| c.id()))
            .finish()
    }
}
