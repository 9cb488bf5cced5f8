//! Storage orchestrator.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use tabstore_common::{ensure_application_key, Error, Result, StorageIdentity};
use tabstore_drivers::{Driver, IterateFn};

use crate::channel::CrossTabChannel;
use crate::event::ChangeEvent;
use crate::listeners::{Disposer, Listener, ListenerSet};
use crate::options::StorageOptions;
use crate::watch::KeyWatch;

/// Lifecycle state of a [`Storage`] instance.
///
/// `Constructed -> Initializing -> Ready`. A driver that fails `init` or
/// reports it is not ready drops the instance back to `Constructed`.
/// `destroy` is accepted in any state and moves to `Destroyed` for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageState {
    /// Driver selected, not (or no longer) ready.
    Constructed,
    /// Driver `init`/`ready` in progress.
    Initializing,
    /// Driver ready; operations are served.
    Ready,
    /// Torn down; every operation fails.
    Destroyed,
}

/// Pick the first supported driver, in list order.
pub fn select_driver(drivers: &[Arc<dyn Driver>]) -> Option<Arc<dyn Driver>> {
    drivers.iter().find(|d| d.is_supported()).cloned()
}

/// Key-value store over the first supported driver, with change events.
///
/// Every data operation waits for the driver to be ready. Mutations capture
/// the value they replace with a separate read just before writing, so
/// concurrent writers to the same key may observe stale old values.
pub struct Storage {
    identity: StorageIdentity,
    driver: Option<Arc<dyn Driver>>,
    listeners: Arc<ListenerSet>,
    channel: Mutex<Option<CrossTabChannel>>,
    init: OnceCell<()>,
    state: Mutex<StorageState>,
}

impl Storage {
    /// Create a storage instance.
    ///
    /// Selects the driver once; the choice is never revisited. Driver setup
    /// starts with the first operation. With cross-tab notification enabled
    /// the instance subscribes to its area immediately.
    ///
    /// # Errors
    /// - Invalid options
    /// - Cross-tab notification enabled outside a tokio runtime
    pub fn new(options: StorageOptions) -> Result<Self> {
        options.validate()?;
        let StorageOptions {
            identity,
            drivers,
            cross_tab,
        } = options;

        let driver = select_driver(&drivers);
        match &driver {
            Some(driver) => info!("Storage {} selected driver '{}'", identity, driver.name()),
            None => warn!(
                "Storage {} has no supported driver among {} candidates",
                identity,
                drivers.len()
            ),
        }

        let listeners = ListenerSet::new();
        let channel = cross_tab
            .map(|context| {
                CrossTabChannel::open(context, identity.clone(), Arc::downgrade(&listeners))
            })
            .transpose()?;

        Ok(Self {
            identity,
            driver,
            listeners,
            channel: Mutex::new(channel),
            init: OnceCell::new(),
            state: Mutex::new(StorageState::Constructed),
        })
    }

    pub fn identity(&self) -> &StorageIdentity {
        &self.identity
    }

    pub fn state(&self) -> StorageState {
        *self.lock_state()
    }

    /// Whether a supported driver was selected.
    pub fn is_supported(&self) -> bool {
        self.driver.is_some()
    }

    pub fn cross_tab_notification(&self) -> bool {
        self.lock_channel().is_some()
    }

    fn lock_state(&self) -> MutexGuard<'_, StorageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_channel(&self) -> MutexGuard<'_, Option<CrossTabChannel>> {
        self.channel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move forward to `next` unless the instance was destroyed meanwhile.
    fn advance(&self, next: StorageState) {
        let mut state = self.lock_state();
        if *state != StorageState::Destroyed {
            *state = next;
        }
    }

    /// Readiness gate run at the top of every data operation.
    ///
    /// Fails at once without a driver or after destroy; otherwise runs the
    /// driver's `init` once and waits for `ready`.
    async fn gate(&self) -> Result<&Arc<dyn Driver>> {
        let driver = self.driver.as_ref().ok_or_else(|| {
            Error::DriverUnavailable(format!("no supported driver for {}", self.identity))
        })?;
        if self.state() == StorageState::Destroyed {
            return Err(Error::Destroyed);
        }

        self.init
            .get_or_try_init(|| async {
                self.advance(StorageState::Initializing);
                debug!("Initialising driver '{}' for {}", driver.name(), self.identity);
                let result = driver.init(&self.identity).await;
                if result.is_err() {
                    self.advance(StorageState::Constructed);
                }
                result
            })
            .await?;

        let ready = driver.ready().await;
        if !matches!(ready, Ok(true)) {
            // Not serving; later calls retry.
            self.advance(StorageState::Constructed);
        }
        if !ready? {
            return Err(Error::DriverUnavailable(format!(
                "driver '{}' reported it is not ready",
                driver.name()
            )));
        }
        self.advance(StorageState::Ready);
        Ok(driver)
    }

    /// Wait for the driver.
    ///
    /// # Returns
    /// - `Ok(false)` when there is no supported driver or it refuses readiness
    pub async fn ready(&self) -> Result<bool> {
        match self.gate().await {
            Ok(_) => Ok(true),
            Err(Error::DriverUnavailable(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// The selected driver, once ready.
    pub async fn active_driver(&self) -> Result<Arc<dyn Driver>> {
        self.gate().await.cloned()
    }

    pub async fn get_item(&self, key: &str) -> Result<Option<Value>> {
        ensure_application_key(key)?;
        self.gate().await?.get_item(key).await
    }

    pub async fn has_item(&self, key: &str) -> Result<bool> {
        ensure_application_key(key)?;
        self.gate().await?.has_item(key).await
    }

    pub async fn iterate(&self, f: &mut IterateFn<'_>) -> Result<()> {
        self.gate().await?.iterate(f).await
    }

    pub async fn key(&self, index: usize) -> Result<Option<String>> {
        self.gate().await?.key(index).await
    }

    pub async fn keys(&self) -> Result<Vec<String>> {
        self.gate().await?.keys().await
    }

    pub async fn length(&self) -> Result<usize> {
        self.gate().await?.length().await
    }

    /// Value currently stored under `key`, `None` when absent.
    async fn capture(&self, driver: &Arc<dyn Driver>, key: &str) -> Result<Option<Value>> {
        if driver.has_item(key).await? {
            driver.get_item(key).await
        } else {
            Ok(None)
        }
    }

    /// Write `value` and emit a `Set` event.
    ///
    /// # Returns
    /// The value as the driver stored it.
    pub async fn set_item(&self, key: &str, value: Value) -> Result<Value> {
        ensure_application_key(key)?;
        let driver = self.gate().await?;

        let old_value = self.capture(driver, key).await?;
        let stored = driver.set_item(key, value.clone()).await?;

        self.emit(ChangeEvent::set(self.identity.clone(), key, old_value, value));
        Ok(stored)
    }

    /// Remove `key` and emit a `Remove` event, even if it was absent.
    pub async fn remove_item(&self, key: &str) -> Result<()> {
        ensure_application_key(key)?;
        let driver = self.gate().await?;

        let old_value = self.capture(driver, key).await?;
        driver.remove_item(key).await?;

        self.emit(ChangeEvent::remove(self.identity.clone(), key, old_value));
        Ok(())
    }

    /// Remove every entry and emit one `Clear` event.
    pub async fn clear(&self) -> Result<()> {
        self.gate().await?.clear().await?;
        self.emit(ChangeEvent::clear(self.identity.clone()));
        Ok(())
    }

    /// Typed read.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get_item(key)
            .await?
            .map(serde_json::from_value)
            .transpose()
            .map_err(Error::from)
    }

    /// Typed write, returning the stored value.
    pub async fn set<T: Serialize + DeserializeOwned>(&self, key: &str, value: &T) -> Result<T> {
        let stored = self.set_item(key, serde_json::to_value(value)?).await?;
        Ok(serde_json::from_value(stored)?)
    }

    /// Notify local listeners, then other contexts.
    fn emit(&self, event: ChangeEvent) {
        self.listeners.dispatch(&event);

        if let Some(channel) = self.lock_channel().as_ref() {
            if let Err(err) = channel.publish(&event) {
                warn!("Cross-tab publish for {} failed: {}", self.identity, err);
            }
        }
    }

    /// Register a change listener.
    pub fn add_listener(&self, listener: Listener) -> Disposer {
        self.listeners.add(listener)
    }

    /// Remove a change listener. Unknown listeners are ignored.
    pub fn remove_listener(&self, listener: &Listener) {
        self.listeners.remove(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Stream the events touching `key`.
    pub fn observe(&self, key: impl Into<String>) -> KeyWatch {
        KeyWatch::new(key, &self.listeners)
    }

    /// Tear the instance down.
    ///
    /// Unsubscribes from the cross-tab channel, drops every listener and
    /// releases the driver. The shared event slot is left untouched.
    /// Destroying twice is a no-op.
    pub async fn destroy(&self) -> Result<()> {
        {
            let mut state = self.lock_state();
            if *state == StorageState::Destroyed {
                return Ok(());
            }
            *state = StorageState::Destroyed;
        }

        if let Some(channel) = self.lock_channel().take() {
            channel.close();
        }
        self.listeners.clear();
        info!("Storage {} destroyed", self.identity);

        match &self.driver {
            Some(driver) => driver.destroy().await,
            None => Ok(()),
        }
    }
}
