//! In-memory driver.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use tabstore_common::{Error, Result, StorageIdentity};

use crate::driver::{Driver, IterateFn};

/// In-memory driver.
///
/// Always supported and instantly ready. Entries are kept in key order so
/// `key(index)` is deterministic. All data is lost on drop.
#[derive(Default)]
pub struct MemoryDriver {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl MemoryDriver {
    /// Create a new empty memory driver.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Value>>> {
        self.entries
            .read()
            .map_err(|_| Error::Driver("memory driver lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Value>>> {
        self.entries
            .write()
            .map_err(|_| Error::Driver("memory driver lock poisoned".to_string()))
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    fn name(&self) -> &str {
        "memory"
    }

    fn is_supported(&self) -> bool {
        true
    }

    async fn ready(&self) -> Result<bool> {
        Ok(true)
    }

    async fn init(&self, identity: &StorageIdentity) -> Result<()> {
        debug!("Memory driver initialised for {}", identity);
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read()?.get(key).cloned())
    }

    async fn has_item(&self, key: &str) -> Result<bool> {
        Ok(self.read()?.contains_key(key))
    }

    async fn iterate(&self, f: &mut IterateFn<'_>) -> Result<()> {
        // Snapshot so the callback may call back into the driver.
        let snapshot: Vec<(String, Value)> = self
            .read()?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for (index, (key, value)) in snapshot.iter().enumerate() {
            f(key, value, index);
        }
        Ok(())
    }

    async fn key(&self, index: usize) -> Result<Option<String>> {
        Ok(self.read()?.keys().nth(index).cloned())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    async fn length(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        self.write()?.remove(key);
        Ok(())
    }

    async fn set_item(&self, key: &str, value: Value) -> Result<Value> {
        self.write()?.insert(key.to_string(), value.clone());
        Ok(value)
    }

    async fn clear(&self) -> Result<()> {
        self.write()?.clear();
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        self.write()?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get() {
        let driver = MemoryDriver::new();

        let stored = driver.set_item("a", json!(1)).await.unwrap();
        assert_eq!(stored, json!(1));
        assert_eq!(driver.get_item("a").await.unwrap(), Some(json!(1)));
        assert_eq!(driver.get_item("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_has_and_remove() {
        let driver = MemoryDriver::new();

        assert!(!driver.has_item("a").await.unwrap());
        driver.set_item("a", json!("x")).await.unwrap();
        assert!(driver.has_item("a").await.unwrap());

        driver.remove_item("a").await.unwrap();
        assert!(!driver.has_item("a").await.unwrap());

        // Removing an absent key is not an error.
        driver.remove_item("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_key_order_and_length() {
        let driver = MemoryDriver::new();
        driver.set_item("b", json!(2)).await.unwrap();
        driver.set_item("a", json!(1)).await.unwrap();

        assert_eq!(driver.length().await.unwrap(), 2);
        assert_eq!(driver.keys().await.unwrap(), vec!["a", "b"]);
        assert_eq!(driver.key(1).await.unwrap().as_deref(), Some("b"));
        assert_eq!(driver.key(2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_iterate() {
        let driver = MemoryDriver::new();
        driver.set_item("a", json!(1)).await.unwrap();
        driver.set_item("b", json!(2)).await.unwrap();

        let mut seen = Vec::new();
        driver
            .iterate(&mut |key, value, index| seen.push((key.to_string(), value.clone(), index)))
            .await
            .unwrap();

        assert_eq!(
            seen,
            vec![("a".to_string(), json!(1), 0), ("b".to_string(), json!(2), 1)]
        );
    }

    #[tokio::test]
    async fn test_clear() {
        let driver = MemoryDriver::new();
        driver.set_item("a", json!(1)).await.unwrap();
        driver.clear().await.unwrap();
        assert_eq!(driver.length().await.unwrap(), 0);
    }
}
