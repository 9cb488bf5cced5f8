//! Serializable store configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use tabstore_common::{Error, Result, StorageIdentity};
use tabstore_drivers::{AreaContext, DriverRegistry};

use crate::options::StorageOptions;

/// File form of a store configuration.
///
/// Drivers are named, and resolved through a [`DriverRegistry`] when the
/// configuration is turned into [`StorageOptions`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    pub name: String,
    pub store_name: String,
    #[serde(default = "default_version")]
    pub version: u32,
    /// Driver names, highest priority first.
    pub drivers: Vec<String>,
    #[serde(default)]
    pub cross_tab_notification: bool,
    /// Passed to every driver factory.
    #[serde(default)]
    pub driver_config: serde_json::Value,
}

fn default_version() -> u32 {
    1
}

impl StoreConfig {
    pub fn new(name: impl Into<String>, store_name: impl Into<String>, drivers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            store_name: store_name.into(),
            version: default_version(),
            drivers,
            cross_tab_notification: false,
            driver_config: serde_json::Value::Null,
        }
    }

    pub fn identity(&self) -> Result<StorageIdentity> {
        StorageIdentity::new(self.name.clone(), self.store_name.clone(), self.version)
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Read a configuration file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading store config from {}", path.display());
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }

    /// Resolve the configuration into constructor options.
    ///
    /// # Errors
    /// - Invalid identity
    /// - Unknown driver name
    /// - Cross-tab notification requested without a context
    pub fn to_options(
        &self,
        registry: &DriverRegistry,
        context: Option<AreaContext>,
    ) -> Result<StorageOptions> {
        let identity = self.identity()?;

        let drivers = self
            .drivers
            .iter()
            .map(|name| registry.resolve(name, self.driver_config.clone()))
            .collect::<Result<Vec<_>>>()?;

        let options = StorageOptions::new(identity, drivers);
        let options = match (self.cross_tab_notification, context) {
            (true, Some(context)) => options.with_cross_tab(context),
            (true, None) => {
                return Err(Error::InvalidInput(
                    "crossTabNotification requires a storage area context".to_string(),
                ))
            }
            (false, _) => options,
        };

        options.validate()?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tabstore_drivers::{create_default_registry, StorageArea};

    #[test]
    fn test_wire_names_and_defaults() {
        let config = StoreConfig::from_json(
            r#"{"name":"app","storeName":"s","drivers":["area","memory"]}"#,
        )
        .unwrap();

        assert_eq!(config.version, 1);
        assert!(!config.cross_tab_notification);
        assert_eq!(config.drivers, vec!["area", "memory"]);

        let json = config.to_json().unwrap();
        assert!(json.contains("\"storeName\""));
        assert!(json.contains("\"crossTabNotification\""));
    }

    #[test]
    fn test_to_options_resolves_in_order() {
        let area = StorageArea::new();
        let registry = create_default_registry(area.context());
        let mut config = StoreConfig::new("app", "s", vec!["memory".into(), "area".into()]);
        config.cross_tab_notification = true;

        let options = config.to_options(&registry, Some(area.context())).unwrap();
        let names: Vec<&str> = options.drivers.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["memory", "area"]);
        assert!(options.cross_tab_notification());
    }

    #[test]
    fn test_to_options_errors() {
        let area = StorageArea::new();
        let registry = create_default_registry(area.context());

        let unknown = StoreConfig::new("app", "s", vec!["indexeddb".into()]);
        assert!(matches!(
            unknown.to_options(&registry, None),
            Err(Error::NotFound(_))
        ));

        let empty = StoreConfig::new("app", "s", Vec::new());
        assert!(empty.to_options(&registry, None).is_err());

        let mut no_context = StoreConfig::new("app", "s", vec!["memory".into()]);
        no_context.cross_tab_notification = true;
        assert!(matches!(
            no_context.to_options(&registry, None),
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"name":"app","storeName":"s","version":3,"drivers":["memory"]}}"#
        )
        .unwrap();

        let config = StoreConfig::load(file.path()).await.unwrap();
        assert_eq!(config.identity().unwrap().version, 3);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = StoreConfig::load(dir.path().join("missing.json")).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
