//! tabstore-storage - async key-value storage with change events.
//!
//! A [`Storage`] picks the first supported driver from an ordered list,
//! gates every operation on driver readiness, and reports each mutation to
//! registered listeners. With cross-tab notification enabled, events are
//! also relayed to other execution contexts sharing a [`StorageArea`].
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use tabstore_storage::{listener, MemoryDriver, Storage, StorageIdentity, StorageOptions};
//!
//! # async fn demo() -> tabstore_storage::Result<()> {
//! let identity = StorageIdentity::new("app", "settings", 1)?;
//! let storage = Storage::new(StorageOptions::with_single_driver(
//!     identity,
//!     Arc::new(MemoryDriver::new()),
//! ))?;
//!
//! storage.add_listener(listener(|event| println!("{:?}", event)));
//! storage.set_item("theme", serde_json::json!("dark")).await?;
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod config;
pub mod event;
pub mod listeners;
pub mod options;
pub mod storage;
pub mod watch;

pub use channel::CrossTabChannel;
pub use config::StoreConfig;
pub use event::{ChangeEvent, EventKind};
pub use listeners::{listener, Disposer, Listener, ListenerSet};
pub use options::StorageOptions;
pub use storage::{select_driver, Storage, StorageState};
pub use watch::KeyWatch;

pub use tabstore_common::{Error, Result, StorageIdentity, EVENT_KEY, RESERVED_PREFIX};
pub use tabstore_drivers::{
    create_default_registry, AreaContext, AreaDriver, Driver, DriverRegistry, IterateFn,
    MemoryDriver, StorageArea,
};
