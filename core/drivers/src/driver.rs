//! Driver trait definition.

use async_trait::async_trait;
use serde_json::Value;

use tabstore_common::{Result, StorageIdentity};

/// Callback invoked by [`Driver::iterate`] with `(key, value, index)`.
pub type IterateFn<'a> = dyn FnMut(&str, &Value, usize) + Send + 'a;

/// Key-value backend contract.
///
/// Values cross the contract as `serde_json::Value`; typed access is layered
/// on top by the orchestrator. Implementations must handle their own setup in
/// [`Driver::init`] and report completion through [`Driver::ready`].
#[async_trait]
pub trait Driver: Send + Sync {
    /// Get the driver name (e.g., "memory", "area").
    fn name(&self) -> &str;

    /// Whether the backing medium is usable in this environment.
    ///
    /// Must be pure and synchronous: no panics, no dependency on async state.
    fn is_supported(&self) -> bool;

    /// Resolve once the driver has finished its asynchronous setup.
    ///
    /// # Returns
    /// - `Ok(true)` when the driver can serve requests
    /// - `Ok(false)` when it never will
    async fn ready(&self) -> Result<bool>;

    /// Prepare the driver for the given logical store.
    async fn init(&self, identity: &StorageIdentity) -> Result<()>;

    /// Read a value.
    ///
    /// Returns `Ok(None)` if the key does not exist, rather than an error.
    async fn get_item(&self, key: &str) -> Result<Option<Value>>;

    /// Check whether `key` exists without reading its value.
    async fn has_item(&self, key: &str) -> Result<bool>;

    /// Visit every entry in key order.
    async fn iterate(&self, f: &mut IterateFn<'_>) -> Result<()>;

    /// Key at position `index`, or `None` past the end.
    async fn key(&self, index: usize) -> Result<Option<String>>;

    /// All keys, in the same order as [`Driver::key`].
    async fn keys(&self) -> Result<Vec<String>>;

    /// Number of stored entries.
    async fn length(&self) -> Result<usize>;

    /// Remove a value. Removing an absent key succeeds.
    async fn remove_item(&self, key: &str) -> Result<()>;

    /// Write a value.
    ///
    /// # Returns
    /// The value as stored, which may differ from the input if the driver
    /// normalizes it.
    async fn set_item(&self, key: &str, value: Value) -> Result<Value>;

    /// Remove every entry owned by this driver.
    async fn clear(&self) -> Result<()>;

    /// Release any resources held by the driver.
    async fn destroy(&self) -> Result<()>;
}
