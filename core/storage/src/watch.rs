//! Per-key change streams.

use futures::Stream;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use crate::event::ChangeEvent;
use crate::listeners::{listener, ListenerSet};

/// Stream of the change events touching one key.
///
/// Local and cross-tab events are both delivered; `Clear` events carry no
/// key and are not. The stream ends when the store is destroyed. Dropping
/// the watch removes its listener.
pub struct KeyWatch {
    key: String,
    rx: mpsc::UnboundedReceiver<ChangeEvent>,
    set: Weak<ListenerSet>,
    // Weak so that clearing the set drops the sender and ends the stream.
    listener: Weak<dyn Fn(&ChangeEvent) + Send + Sync>,
}

impl KeyWatch {
    pub(crate) fn new(key: impl Into<String>, listeners: &Arc<ListenerSet>) -> Self {
        let key = key.into();
        let (tx, rx) = mpsc::unbounded_channel();

        let watched = key.clone();
        let registered = listener(move |event: &ChangeEvent| {
            if event.key() == Some(watched.as_str()) {
                // The watch may already be gone.
                let _ = tx.send(event.clone());
            }
        });
        let weak = Arc::downgrade(&registered);
        listeners.add(registered);

        Self {
            key,
            rx,
            set: Arc::downgrade(listeners),
            listener: weak,
        }
    }

    /// The watched key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Wait for the next event, `None` once the store is destroyed.
    pub async fn next_event(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }
}

impl Stream for KeyWatch {
    type Item = ChangeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for KeyWatch {
    fn drop(&mut self) {
        if let (Some(set), Some(listener)) = (self.set.upgrade(), self.listener.upgrade()) {
            set.remove(&listener);
        }
    }
}
