//! Shared storage area with cross-context change notification.
//!
//! A [`StorageArea`] is one origin-wide string map. Each execution context
//! (tab, window, worker) attaches through its own [`AreaContext`]. Every
//! mutation is announced to the subscribers of *other* contexts, never to the
//! writer itself, mirroring the native `storage` event.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use tabstore_common::{Error, Result};

/// Notification buffer per subscriber. Slow subscribers lose the oldest entries.
const CHANGE_CAPACITY: usize = 256;

/// Identifier of one execution context attached to an area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One mutation of the shared area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaChange {
    /// Changed key, `None` when the whole area was cleared.
    pub key: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    /// Context that performed the write.
    pub source: ContextId,
}

/// Origin-scoped string storage shared by every attached context.
pub struct StorageArea {
    entries: RwLock<BTreeMap<String, String>>,
    changes: broadcast::Sender<AreaChange>,
    available: bool,
}

impl StorageArea {
    /// Create a new empty, available area.
    pub fn new() -> Arc<Self> {
        Self::build(true)
    }

    /// Create an area whose every operation fails, like a disabled medium.
    pub fn unavailable() -> Arc<Self> {
        Self::build(false)
    }

    fn build(available: bool) -> Arc<Self> {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Arc::new(Self {
            entries: RwLock::new(BTreeMap::new()),
            changes,
            available,
        })
    }

    /// Whether the medium can be used at all.
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Attach a new execution context.
    pub fn context(self: &Arc<Self>) -> AreaContext {
        let id = ContextId::generate();
        debug!("Attached context {} to storage area", id);
        AreaContext {
            id,
            area: Arc::clone(self),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, String>>> {
        self.check_available()?;
        self.entries
            .read()
            .map_err(|_| Error::Driver("storage area lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, String>>> {
        self.check_available()?;
        self.entries
            .write()
            .map_err(|_| Error::Driver("storage area lock poisoned".to_string()))
    }

    fn check_available(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(Error::Driver("storage area is unavailable".to_string()))
        }
    }

    fn announce(&self, change: AreaChange) {
        // No subscribers is not an error.
        let _ = self.changes.send(change);
    }
}

/// One execution context's handle onto a [`StorageArea`].
#[derive(Clone)]
pub struct AreaContext {
    id: ContextId,
    area: Arc<StorageArea>,
}

impl AreaContext {
    /// Identifier of this context.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// The shared area this context is attached to.
    pub fn area(&self) -> &Arc<StorageArea> {
        &self.area
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.area.read()?.get(key).cloned())
    }

    /// Store `value` under `key`.
    ///
    /// Writing the value already stored changes nothing and announces nothing.
    pub fn set_item(&self, key: &str, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        let mut entries = self.area.write()?;
        let old_value = entries.insert(key.to_string(), value.clone());
        if old_value.as_deref() == Some(value.as_str()) {
            return Ok(());
        }
        self.area.announce(AreaChange {
            key: Some(key.to_string()),
            old_value,
            new_value: Some(value),
            source: self.id,
        });
        Ok(())
    }

    pub fn remove_item(&self, key: &str) -> Result<()> {
        let mut entries = self.area.write()?;
        if let Some(old_value) = entries.remove(key) {
            self.area.announce(AreaChange {
                key: Some(key.to_string()),
                old_value: Some(old_value),
                new_value: None,
                source: self.id,
            });
        }
        Ok(())
    }

    /// Remove every entry in the area, whichever store wrote it.
    pub fn clear(&self) -> Result<()> {
        let mut entries = self.area.write()?;
        if entries.is_empty() {
            return Ok(());
        }
        entries.clear();
        self.area.announce(AreaChange {
            key: None,
            old_value: None,
            new_value: None,
            source: self.id,
        });
        Ok(())
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.area.read()?.keys().cloned().collect())
    }

    pub fn length(&self) -> Result<usize> {
        Ok(self.area.read()?.len())
    }

    /// Listen for changes made by other contexts.
    pub fn subscribe(&self) -> AreaSubscription {
        AreaSubscription {
            own: self.id,
            rx: self.area.changes.subscribe(),
        }
    }
}

/// Receiver of changes made by other contexts. Dropping it unsubscribes.
pub struct AreaSubscription {
    own: ContextId,
    rx: broadcast::Receiver<AreaChange>,
}

impl AreaSubscription {
    /// Wait for the next foreign change.
    ///
    /// Returns `None` once the area is gone.
    pub async fn recv(&mut self) -> Option<AreaChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) if change.source == self.own => continue,
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Context {} missed {} storage notifications", self.own, missed);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
