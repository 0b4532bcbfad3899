// SPDX-FileCopyrightText: 2026 Threadbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event fan-out for query handles and result models.
//!
//! Events go to two kinds of consumers: broadcast receivers obtained with
//! `subscribe`, and listener callbacks registered with `connect`. Callbacks
//! run synchronously on the thread that emits the event, with no internal
//! lock held, so they may call back into the emitter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use threadbound_core::QueryError;
use tokio::sync::broadcast;

/// Broadcast buffer per subscriber before the slowest one starts lagging.
const EVENT_CAPACITY: usize = 64;

/// Notifications emitted by a query handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
    /// A non-cancelled asynchronous execution published its result.
    ///
    /// `sequence` identifies the submission; a newer submission may have
    /// replaced the result by the time the event is handled, see
    /// `QueryHandle::result_for`.
    ResultsReady { sequence: u64, success: bool },
    /// The handle went from idle to busy or back.
    BusyChanged { busy: bool },
}

/// Notifications emitted by a result model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    /// The rows are about to be replaced.
    AboutToReset,
    /// The rows were replaced.
    Reset { rows: usize },
    /// The query behind the model failed; the model is now empty.
    QueryFailed { error: QueryError },
}

/// Identifies a connected listener for later `disconnect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

pub(crate) struct EventHub<E> {
    sender: broadcast::Sender<E>,
    listeners: Mutex<Vec<(ListenerId, Listener<E>)>>,
    next_id: AtomicU64,
}

impl<E: Clone + Send + 'static> EventHub<E> {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            sender,
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    pub(crate) fn connect<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    pub(crate) fn disconnect(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub(crate) fn emit(&self, event: E) {
        let listeners: Vec<Listener<E>> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&event);
        }
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn listeners_and_subscribers_both_receive() {
        let hub = EventHub::<QueryEvent>::new();
        let mut rx = hub.subscribe();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        hub.connect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        hub.emit(QueryEvent::ResultsReady { sequence: 1, success: true });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(
            rx.try_recv().unwrap(),
            QueryEvent::ResultsReady { sequence: 1, success: true }
        );
    }

    #[test]
    fn disconnected_listener_is_not_called() {
        let hub = EventHub::<ModelEvent>::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let id = hub.connect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(hub.disconnect(id));
        assert!(!hub.disconnect(id));
        hub.emit(ModelEvent::AboutToReset);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listener_may_reenter_the_hub() {
        let hub = Arc::new(EventHub::<QueryEvent>::new());
        let inner = Arc::clone(&hub);
        let id = Arc::new(Mutex::new(None));
        let own_id = Arc::clone(&id);
        let registered = hub.connect(move |_| {
            if let Some(me) = own_id.lock().unwrap().take() {
                inner.disconnect(me);
            }
        });
        *id.lock().unwrap() = Some(registered);

        hub.emit(QueryEvent::BusyChanged { busy: true });
        assert!(!hub.disconnect(registered));
    }
}
