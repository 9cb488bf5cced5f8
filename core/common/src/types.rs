//! Common types used throughout tabstore.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix reserved for keys owned by tabstore itself.
pub const RESERVED_PREFIX: &str = "__tabstore_";

/// Shared slot used to relay serialized change events between contexts.
pub const EVENT_KEY: &str = "__tabstore_event__";

/// Reject application keys that fall inside the reserved namespace.
///
/// # Errors
/// - `ReservedKey` if `key` starts with [`RESERVED_PREFIX`]
pub fn ensure_application_key(key: &str) -> crate::Result<()> {
    if key.starts_with(RESERVED_PREFIX) {
        return Err(crate::Error::ReservedKey(format!(
            "'{}' is inside the reserved '{}' namespace",
            key, RESERVED_PREFIX
        )));
    }
    Ok(())
}

/// Bytes escaped inside one key prefix component. `/` separates components.
const PREFIX_COMPONENT: &AsciiSet = &CONTROLS.add(b'%').add(b'/');

/// Logical identity of a store instance.
///
/// Two instances are the same logical store when `name` and `store_name`
/// match. `version` is carried along but never compared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageIdentity {
    pub name: String,
    pub store_name: String,
    pub version: u32,
}

impl StorageIdentity {
    /// Create a new identity.
    ///
    /// # Preconditions
    /// - `name` and `store_name` must be non-empty
    ///
    /// # Errors
    /// - Returns error if either name is empty
    pub fn new(
        name: impl Into<String>,
        store_name: impl Into<String>,
        version: u32,
    ) -> crate::Result<Self> {
        let identity = Self {
            name: name.into(),
            store_name: store_name.into(),
            version,
        };
        identity.validate()?;
        Ok(identity)
    }

    /// Check the naming invariants.
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Storage name cannot be empty".to_string(),
            ));
        }
        if self.store_name.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Store name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether `other` refers to the same logical store.
    pub fn same_store(&self, other: &StorageIdentity) -> bool {
        self.name == other.name && self.store_name == other.store_name
    }

    /// Key prefix isolating this store inside a shared medium.
    ///
    /// Both components are percent-encoded, so no store's prefix is a
    /// prefix of another store's keys even when names contain `/`.
    pub fn key_prefix(&self) -> String {
        format!(
            "{}/{}/",
            utf8_percent_encode(&self.name, PREFIX_COMPONENT),
            utf8_percent_encode(&self.store_name, PREFIX_COMPONENT)
        )
    }
}

impl fmt::Display for StorageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@v{}", self.name, self.store_name, self.version)
    }
}
