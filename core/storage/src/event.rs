//! Change events and their wire format.
//!
//! A [`ChangeEvent`] records one mutation of a logical store. On the wire it
//! is a flat JSON object:
//!
//! ```json
//! {"type":1,"name":"app","storeName":"s","version":1,
//!  "key":"a","oldValue":1,"newValue":2,"isCrossTab":true}
//! ```
//!
//! `oldValue` and `newValue` distinguish an *absent* value (field omitted,
//! `None` in Rust) from an explicit JSON `null` (`Some(Value::Null)`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use tabstore_common::{Error, Result, StorageIdentity};

/// Kind of mutation an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Generic,
    Set,
    Remove,
    Clear,
}

impl EventKind {
    /// Numeric discriminator used on the wire.
    pub fn code(self) -> u8 {
        match self {
            EventKind::Generic => 0,
            EventKind::Set => 1,
            EventKind::Remove => 2,
            EventKind::Clear => 3,
        }
    }

    /// Map a wire discriminator back to a kind. Unknown codes are `Generic`.
    pub fn from_code(code: u64) -> Self {
        match code {
            1 => EventKind::Set,
            2 => EventKind::Remove,
            3 => EventKind::Clear,
            _ => EventKind::Generic,
        }
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        u64::deserialize(deserializer).map(EventKind::from_code)
    }
}

/// Keeps an explicit `null` as `Some(Value::Null)`; a missing field stays `None`.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// One store mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    kind: EventKind,
    #[serde(flatten)]
    identity: StorageIdentity,
    key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    old_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
    new_value: Option<Value>,
    #[serde(default)]
    is_cross_tab: bool,
}

impl ChangeEvent {
    /// Build an event of any kind.
    pub fn new(
        kind: EventKind,
        identity: StorageIdentity,
        key: Option<String>,
        old_value: Option<Value>,
        new_value: Option<Value>,
    ) -> Self {
        Self {
            kind,
            identity,
            key,
            old_value,
            new_value,
            is_cross_tab: false,
        }
    }

    /// A write of `new_value` over `old_value` (`None` when the key was absent).
    pub fn set(
        identity: StorageIdentity,
        key: impl Into<String>,
        old_value: Option<Value>,
        new_value: Value,
    ) -> Self {
        Self::new(EventKind::Set, identity, Some(key.into()), old_value, Some(new_value))
    }

    /// A removal. The new value is always `null`.
    pub fn remove(identity: StorageIdentity, key: impl Into<String>, old_value: Option<Value>) -> Self {
        Self::new(
            EventKind::Remove,
            identity,
            Some(key.into()),
            old_value,
            Some(Value::Null),
        )
    }

    /// A wipe of the whole store. Carries no key and `null` values.
    pub fn clear(identity: StorageIdentity) -> Self {
        Self::new(
            EventKind::Clear,
            identity,
            None,
            Some(Value::Null),
            Some(Value::Null),
        )
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn identity(&self) -> &StorageIdentity {
        &self.identity
    }

    /// Changed key, `None` only for `Clear`.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Value before the mutation, `None` if the key was absent.
    pub fn old_value(&self) -> Option<&Value> {
        self.old_value.as_ref()
    }

    /// Value after the mutation.
    pub fn new_value(&self) -> Option<&Value> {
        self.new_value.as_ref()
    }

    /// Whether the event arrived from another execution context.
    pub fn is_cross_tab(&self) -> bool {
        self.is_cross_tab
    }

    /// Copy of this event with the origin flag replaced.
    pub fn with_cross_tab(&self, is_cross_tab: bool) -> Self {
        Self {
            is_cross_tab,
            ..self.clone()
        }
    }

    /// Copy of this event with both values replaced.
    pub fn with_values(&self, old_value: Option<Value>, new_value: Option<Value>) -> Self {
        Self {
            old_value,
            new_value,
            ..self.clone()
        }
    }

    /// Encode for transport through the shared slot.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode a transported event.
    ///
    /// # Errors
    /// - `MalformedEventPayload` if the text is not an event, or if the key
    ///   does not fit the kind (`Set`/`Remove` need a key, `Clear` has none)
    pub fn from_json(raw: &str) -> Result<Self> {
        let event: ChangeEvent =
            serde_json::from_str(raw).map_err(|e| Error::MalformedEventPayload(e.to_string()))?;

        match (event.kind, event.key.is_some()) {
            (EventKind::Set | EventKind::Remove, false) => Err(Error::MalformedEventPayload(
                format!("{:?} event without a key", event.kind),
            )),
            (EventKind::Clear, true) => Err(Error::MalformedEventPayload(
                "Clear event with a key".to_string(),
            )),
            _ => Ok(event),
        }
    }
}
