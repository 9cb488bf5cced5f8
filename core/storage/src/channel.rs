//! Cross-tab notification channel.
//!
//! Events are relayed between execution contexts by writing them into the
//! reserved [`EVENT_KEY`] slot of the shared storage area. Every other
//! context attached to the area sees the write through its change
//! subscription, filters it, and hands the decoded event to its own
//! listeners. Received events are never re-published.
//!
//! Delivery is best-effort: the slot holds only the latest event, and
//! malformed or foreign payloads are dropped.

use std::sync::Weak;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use tabstore_common::{Error, Result, StorageIdentity, EVENT_KEY};
use tabstore_drivers::{AreaChange, AreaContext, ContextId};

use crate::event::ChangeEvent;
use crate::listeners::ListenerSet;

/// One store instance's end of the cross-tab channel.
///
/// Dropping or closing the channel unsubscribes from the area.
pub struct CrossTabChannel {
    context: AreaContext,
    task: JoinHandle<()>,
}

impl CrossTabChannel {
    /// Subscribe to foreign changes and start relaying matching events to
    /// `listeners`.
    ///
    /// # Errors
    /// - `InvalidInput` when called outside a tokio runtime
    pub fn open(
        context: AreaContext,
        identity: StorageIdentity,
        listeners: Weak<ListenerSet>,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| {
            Error::InvalidInput("cross-tab notification requires a tokio runtime".to_string())
        })?;

        let mut subscription = context.subscribe();
        let own = context.id();
        info!("Cross-tab channel opened for {} in context {}", identity, own);

        let task = runtime.spawn(async move {
            while let Some(change) = subscription.recv().await {
                let Some(event) = accept(&change, own, &identity) else {
                    continue;
                };
                let Some(listeners) = listeners.upgrade() else {
                    break;
                };
                listeners.dispatch(&event);
            }
            debug!("Cross-tab channel for context {} stopped", own);
        });

        Ok(Self { context, task })
    }

    /// Write `event` into the shared slot for other contexts to pick up.
    pub fn publish(&self, event: &ChangeEvent) -> Result<()> {
        let payload = event.with_cross_tab(true).to_json()?;
        self.context.set_item(EVENT_KEY, payload)
    }

    /// Stop listening. The shared slot is left as is.
    pub fn close(&self) {
        if !self.task.is_finished() {
            self.task.abort();
            info!("Cross-tab channel closed in context {}", self.context.id());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for CrossTabChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Decide whether a foreign area change carries an event for `identity`.
pub(crate) fn accept(
    change: &AreaChange,
    own: ContextId,
    identity: &StorageIdentity,
) -> Option<ChangeEvent> {
    if change.source == own || change.key.as_deref() != Some(EVENT_KEY) {
        return None;
    }
    // The slot was removed or the area cleared.
    let payload = change.new_value.as_deref()?;

    let event = match ChangeEvent::from_json(payload) {
        Ok(event) => event,
        Err(err) => {
            debug!("Dropping cross-tab payload: {}", err);
            return None;
        }
    };

    if !event.identity().same_store(identity) {
        trace!(
            "Ignoring cross-tab event for {} in store {}",
            event.identity(),
            identity
        );
        return None;
    }

    Some(event.with_cross_tab(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tabstore_drivers::StorageArea;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use crate::listeners::listener;

    fn identity(name: &str, store: &str) -> StorageIdentity {
        StorageIdentity::new(name, store, 1).unwrap()
    }

    fn slot_change(payload: Option<String>, source: ContextId) -> AreaChange {
        AreaChange {
            key: Some(EVENT_KEY.to_string()),
            old_value: None,
            new_value: payload,
            source,
        }
    }

    #[test]
    fn test_accept_filters() {
        let area = StorageArea::new();
        let own = area.context().id();
        let other = area.context().id();
        let me = identity("A", "X");

        let event = ChangeEvent::set(me.clone(), "k", None, json!(1));
        let payload = event.to_json().unwrap();

        let accepted = accept(&slot_change(Some(payload.clone()), other), own, &me).unwrap();
        assert!(accepted.is_cross_tab());
        assert_eq!(accepted.key(), Some("k"));

        // Own writes, other keys, removals and garbage are all ignored.
        assert!(accept(&slot_change(Some(payload.clone()), own), own, &me).is_none());
        let mut other_key = slot_change(Some(payload), other);
        other_key.key = Some("app/X/k".to_string());
        assert!(accept(&other_key, own, &me).is_none());
        assert!(accept(&slot_change(None, other), own, &me).is_none());
        assert!(accept(&slot_change(Some("{oops".to_string()), other), own, &me).is_none());
    }

    #[test]
    fn test_accept_requires_same_store() {
        let area = StorageArea::new();
        let own = area.context().id();
        let other = area.context().id();
        let me = identity("A", "X");

        for foreign in [identity("B", "X"), identity("A", "Y")] {
            let payload = ChangeEvent::clear(foreign).to_json().unwrap();
            assert!(accept(&slot_change(Some(payload), other), own, &me).is_none());
        }

        let newer = StorageIdentity::new("A", "X", 9).unwrap();
        let payload = ChangeEvent::clear(newer).to_json().unwrap();
        assert!(accept(&slot_change(Some(payload), other), own, &me).is_some());
    }

    #[tokio::test]
    async fn test_publish_reaches_other_context() {
        let area = StorageArea::new();
        let sender_ctx = area.context();
        let receiver_ctx = area.context();
        let me = identity("A", "X");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let listeners = ListenerSet::new();
        listeners.add(listener(move |event| {
            let _ = tx.send(event.clone());
        }));

        let sender = CrossTabChannel::open(sender_ctx, me.clone(), Weak::new()).unwrap();
        let _receiver =
            CrossTabChannel::open(receiver_ctx, me.clone(), Arc::downgrade(&listeners)).unwrap();

        sender
            .publish(&ChangeEvent::set(me, "k", None, json!("v")))
            .unwrap();

        let event = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.new_value(), Some(&json!("v")));
        assert!(event.is_cross_tab());

        let raw = area.context().get_item(EVENT_KEY).unwrap().unwrap();
        assert!(ChangeEvent::from_json(&raw).unwrap().is_cross_tab());
    }

    #[tokio::test]
    async fn test_close_stops_delivery() {
        let area = StorageArea::new();
        let me = identity("A", "X");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listeners = ListenerSet::new();
        listeners.add(listener(move |event| {
            let _ = tx.send(event.clone());
        }));

        let receiver =
            CrossTabChannel::open(area.context(), me.clone(), Arc::downgrade(&listeners)).unwrap();
        receiver.close();

        let sender = CrossTabChannel::open(area.context(), me.clone(), Weak::new()).unwrap();
        sender.publish(&ChangeEvent::clear(me)).unwrap();

        assert!(timeout(Duration::from_millis(50), rx.recv()).await.is_err());
        assert!(receiver.is_closed());
    }

    #[test]
    fn test_open_requires_runtime() {
        let area = StorageArea::new();
        let result = CrossTabChannel::open(area.context(), identity("A", "X"), Weak::new());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
