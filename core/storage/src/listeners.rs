//! Change listener registration and dispatch.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::warn;

use tabstore_common::Error;

use crate::event::ChangeEvent;

/// Callback invoked synchronously for every change event.
///
/// Identity is the `Arc` allocation: registering the same `Listener` twice
/// keeps a single registration.
pub type Listener = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Wrap a closure as a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&ChangeEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

fn same_listener(a: &Listener, b: &Listener) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Set of registered listeners.
#[derive(Default)]
pub struct ListenerSet {
    listeners: Mutex<Vec<Listener>>,
}

impl ListenerSet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Listener>> {
        // Listeners never run under the lock, so a poisoned set is still consistent.
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `listener`, returning a handle that removes it again.
    pub fn add(self: &Arc<Self>, listener: Listener) -> Disposer {
        {
            let mut listeners = self.lock();
            if !listeners.iter().any(|l| same_listener(l, &listener)) {
                listeners.push(Arc::clone(&listener));
            }
        }
        Disposer {
            set: Arc::downgrade(self),
            listener,
        }
    }

    /// Remove `listener`. Returns whether it was registered.
    pub fn remove(&self, listener: &Listener) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.len() != before
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Invoke every listener registered when dispatch starts.
    ///
    /// Listeners may add or remove registrations while running; changes
    /// take effect from the next dispatch. A panicking listener is logged
    /// and skipped. Returns the number of listeners that completed.
    pub fn dispatch(&self, event: &ChangeEvent) -> usize {
        let snapshot: Vec<Listener> = self.lock().clone();
        let mut completed = 0;

        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(()) => completed += 1,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "listener panicked".to_string());
                    warn!(
                        "{} (while handling {:?} on key {:?})",
                        Error::ListenerFailure(message),
                        event.kind(),
                        event.key()
                    );
                }
            }
        }

        completed
    }
}

/// Handle removing one listener registration.
///
/// Dropping the handle keeps the registration; call [`Disposer::dispose`].
pub struct Disposer {
    set: Weak<ListenerSet>,
    listener: Listener,
}

impl Disposer {
    /// The registered listener.
    pub fn listener(&self) -> &Listener {
        &self.listener
    }

    /// Remove the registration, if the set still exists.
    pub fn dispose(self) {
        if let Some(set) = self.set.upgrade() {
            set.remove(&self.listener);
        }
    }
}
