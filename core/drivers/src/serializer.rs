//! Value serialization for string-based media.

use serde_json::Value;

use tabstore_common::{Error, Result};

/// Converts driver values to and from the strings a medium can hold.
pub trait Serializer: Send + Sync {
    fn serialize(&self, value: &Value) -> Result<String>;

    fn deserialize(&self, raw: &str) -> Result<Value>;
}

/// JSON text serializer.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, value: &Value) -> Result<String> {
        serde_json::to_string(value).map_err(|e| Error::Serialization(e.to_string()))
    }

    fn deserialize(&self, raw: &str) -> Result<Value> {
        serde_json::from_str(raw).map_err(|e| Error::Serialization(e.to_string()))
    }
}
