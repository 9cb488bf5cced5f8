//! Driver backed by a shared [`StorageArea`](crate::area::StorageArea).

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use tabstore_common::{Error, Result, StorageIdentity};

use crate::area::AreaContext;
use crate::driver::{Driver, IterateFn};
use crate::serializer::{JsonSerializer, Serializer};

/// Driver storing serialized values in an origin-wide storage area.
///
/// Every key is stored under the `"{name}/{storeName}/"` prefix of the store
/// identity given to `init`, with both names percent-encoded, so several logical stores can share one area
/// without seeing each other's entries. The prefix is fixed by the first
/// `init` call; operations before that fail.
pub struct AreaDriver {
    context: AreaContext,
    serializer: Arc<dyn Serializer>,
    prefix: OnceLock<String>,
}

impl AreaDriver {
    /// Create a driver using JSON serialization.
    pub fn new(context: AreaContext) -> Self {
        Self::with_serializer(context, Arc::new(JsonSerializer))
    }

    pub fn with_serializer(context: AreaContext, serializer: Arc<dyn Serializer>) -> Self {
        Self {
            context,
            serializer,
            prefix: OnceLock::new(),
        }
    }

    /// The context this driver writes through.
    pub fn context(&self) -> &AreaContext {
        &self.context
    }

    fn prefix(&self) -> Result<&str> {
        self.prefix
            .get()
            .map(String::as_str)
            .ok_or_else(|| Error::Driver("area driver used before init".to_string()))
    }

    fn full_key(&self, key: &str) -> Result<String> {
        Ok(format!("{}{}", self.prefix()?, key))
    }

    /// Keys owned by this store, prefix stripped, in area order.
    fn own_keys(&self) -> Result<Vec<String>> {
        let prefix = self.prefix()?;
        Ok(self
            .context
            .keys()?
            .into_iter()
            .filter_map(|k| k.strip_prefix(prefix).map(str::to_string))
            .collect())
    }
}

#[async_trait]
impl Driver for AreaDriver {
    fn name(&self) -> &str {
        "area"
    }

    fn is_supported(&self) -> bool {
        self.context.area().is_available()
    }

    async fn ready(&self) -> Result<bool> {
        Ok(self.prefix.get().is_some())
    }

    async fn init(&self, identity: &StorageIdentity) -> Result<()> {
        let prefix = identity.key_prefix();
        let current = self.prefix.get_or_init(|| prefix.clone());
        if *current != prefix {
            return Err(Error::InvalidInput(format!(
                "area driver already bound to '{}'",
                current
            )));
        }
        debug!("Area driver bound to prefix '{}'", prefix);
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<Value>> {
        let full_key = self.full_key(key)?;
        match self.context.get_item(&full_key)? {
            Some(raw) => Ok(Some(self.serializer.deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    async fn has_item(&self, key: &str) -> Result<bool> {
        let full_key = self.full_key(key)?;
        Ok(self.context.get_item(&full_key)?.is_some())
    }

    async fn iterate(&self, f: &mut IterateFn<'_>) -> Result<()> {
        for (index, key) in self.own_keys()?.iter().enumerate() {
            // Entries removed mid-iteration are skipped.
            if let Some(value) = self.get_item(key).await? {
                f(key, &value, index);
            }
        }
        Ok(())
    }

    async fn key(&self, index: usize) -> Result<Option<String>> {
        Ok(self.own_keys()?.into_iter().nth(index))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.own_keys()
    }

    async fn length(&self) -> Result<usize> {
        Ok(self.own_keys()?.len())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let full_key = self.full_key(key)?;
        self.context.remove_item(&full_key)
    }

    async fn set_item(&self, key: &str, value: Value) -> Result<Value> {
        let full_key = self.full_key(key)?;
        let raw = self.serializer.serialize(&value)?;
        self.context.set_item(&full_key, raw)?;
        Ok(value)
    }

    async fn clear(&self) -> Result<()> {
        for key in self.own_keys()? {
            self.remove_item(&key).await?;
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        debug!("Area driver for context {} released", self.context.id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::StorageArea;
    use serde_json::json;

    fn identity(store: &str) -> StorageIdentity {
        StorageIdentity::new("app", store, 1).unwrap()
    }

    #[tokio::test]
    async fn test_requires_init() {
        let driver = AreaDriver::new(StorageArea::new().context());

        assert!(!driver.ready().await.unwrap());
        assert!(matches!(
            driver.get_item("a").await,
            Err(Error::Driver(_))
        ));

        driver.init(&identity("s")).await.unwrap();
        assert!(driver.ready().await.unwrap());
    }

    #[tokio::test]
    async fn test_values_are_prefixed_and_serialized() {
        let area = StorageArea::new();
        let driver = AreaDriver::new(area.context());
        driver.init(&identity("s")).await.unwrap();

        driver.set_item("a", json!({"n": 1})).await.unwrap();

        let raw = area.context().get_item("app/s/a").unwrap();
        assert_eq!(raw.as_deref(), Some(r#"{"n":1}"#));
        assert_eq!(driver.get_item("a").await.unwrap(), Some(json!({"n": 1})));
        assert!(driver.has_item("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_stores_are_isolated() {
        let area = StorageArea::new();
        let first = AreaDriver::new(area.context());
        let second = AreaDriver::new(area.context());
        first.init(&identity("s")).await.unwrap();
        second.init(&identity("t")).await.unwrap();

        first.set_item("a", json!(1)).await.unwrap();
        first.set_item("b", json!(2)).await.unwrap();
        second.set_item("a", json!(3)).await.unwrap();

        assert_eq!(first.keys().await.unwrap(), vec!["a", "b"]);
        assert_eq!(second.length().await.unwrap(), 1);

        first.clear().await.unwrap();
        assert_eq!(first.length().await.unwrap(), 0);
        assert_eq!(second.get_item("a").await.unwrap(), Some(json!(3)));
    }

    #[tokio::test]
    async fn test_nested_store_names_are_isolated() {
        let area = StorageArea::new();
        let parent = AreaDriver::new(area.context());
        let nested = AreaDriver::new(area.context());
        parent.init(&identity("s")).await.unwrap();
        nested.init(&identity("s/x")).await.unwrap();

        nested.set_item("k", json!(42)).await.unwrap();

        assert!(parent.keys().await.unwrap().is_empty());
        assert_eq!(parent.get_item("x/k").await.unwrap(), None);

        parent.clear().await.unwrap();
        assert_eq!(nested.get_item("k").await.unwrap(), Some(json!(42)));
    }

    #[tokio::test]
    async fn test_slash_in_either_name_is_isolated() {
        let area = StorageArea::new();
        let first = AreaDriver::new(area.context());
        let second = AreaDriver::new(area.context());
        first
            .init(&StorageIdentity::new("a/b", "c", 1).unwrap())
            .await
            .unwrap();
        second
            .init(&StorageIdentity::new("a", "b/c", 1).unwrap())
            .await
            .unwrap();

        first.set_item("k", json!("from first")).await.unwrap();

        assert_eq!(second.get_item("k").await.unwrap(), None);
        assert_eq!(second.length().await.unwrap(), 0);
        assert_eq!(first.keys().await.unwrap(), vec!["k"]);
    }

    #[tokio::test]
    async fn test_rebinding_fails() {
        let driver = AreaDriver::new(StorageArea::new().context());
        driver.init(&identity("s")).await.unwrap();
        driver.init(&identity("s")).await.unwrap();
        assert!(driver.init(&identity("t")).await.is_err());
    }

    #[tokio::test]
    async fn test_unavailable_area_is_unsupported() {
        let driver = AreaDriver::new(StorageArea::unavailable().context());
        assert!(!driver.is_supported());
    }

    #[tokio::test]
    async fn test_iterate_and_key() {
        let driver = AreaDriver::new(StorageArea::new().context());
        driver.init(&identity("s")).await.unwrap();
        driver.set_item("x", json!("one")).await.unwrap();
        driver.set_item("y", json!("two")).await.unwrap();

        let mut seen = Vec::new();
        driver
            .iterate(&mut |key, value, index| seen.push(format!("{index}:{key}={value}")))
            .await
            .unwrap();

        assert_eq!(seen, vec![r#"0:x="one""#, r#"1:y="two""#]);
        assert_eq!(driver.key(0).await.unwrap().as_deref(), Some("x"));
        assert_eq!(driver.key(5).await.unwrap(), None);
    }
}
