//! Commit notifications.
//!
//! [`ChangeEvent`] describes one committed mutation. [`EventEmitter`] is the
//! typed pub/sub registry the [`Store`](crate::Store) broadcasts them through.
//!
//! Listeners are stored as `Arc<dyn Fn(&T)>` and emission works on a snapshot:
//!   - A listener removed *during* emission is still called in that round.
//!   - A listener added *during* emission is NOT called until the next emit.
//!
//! The registry lock is never held while a callback runs, so callbacks may
//! register or remove listeners.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A committed mutation, broadcast after the write transaction completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChangeEvent {
    CategoryAdded { category_id: String },
    /// A category and every item it owned were removed.
    CategoryDeleted { category_id: String, item_ids: Vec<String> },
    ItemAdded { category_id: String, item_id: String },
    ItemUpdated { category_id: String, item_id: String },
    ItemDeleted { category_id: String, item_id: String },
}

impl ChangeEvent {
    /// The category the change happened in.
    pub fn category_id(&self) -> &str {
        match self {
            Self::CategoryAdded { category_id }
            | Self::CategoryDeleted { category_id, .. }
            | Self::ItemAdded { category_id, .. }
            | Self::ItemUpdated { category_id, .. }
            | Self::ItemDeleted { category_id, .. } => category_id,
        }
    }

    /// IDs of the items whose state changed.
    pub fn item_ids(&self) -> Vec<&str> {
        match self {
            Self::CategoryAdded { .. } => vec![],
            Self::CategoryDeleted { item_ids, .. } => item_ids.iter().map(String::as_str).collect(),
            Self::ItemAdded { item_id, .. }
            | Self::ItemUpdated { item_id, .. }
            | Self::ItemDeleted { item_id, .. } => vec![item_id.as_str()],
        }
    }

    /// Whether any item could have appeared, changed or disappeared.
    pub fn touches_items(&self) -> bool {
        !self.item_ids().is_empty()
    }
}

/// A listener ID returned by [`EventEmitter::on`].
pub type ListenerId = u64;

/// Closure type for event listeners.
pub type ListenerFn<T> = dyn Fn(&T) + Send + Sync;

/// Typed synchronous event emitter.
pub struct EventEmitter<T> {
    listeners: Mutex<Vec<(ListenerId, Arc<ListenerFn<T>>)>>,
    next_id: AtomicU64,
}

impl<T> EventEmitter<T> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers `callback` and returns its [`ListenerId`].
    pub fn on(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(callback)));
        id
    }

    /// Removes the listener identified by `id`. Unknown ids are ignored.
    pub fn off(&self, id: ListenerId) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    /// Calls every currently registered listener with `event`.
    pub fn emit(&self, event: &T) {
        let snapshot: Vec<Arc<ListenerFn<T>>> = {
            let guard = self.listeners.lock();
            guard.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        for cb in snapshot {
            cb(event);
        }
    }

    /// Number of currently registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a listener registered until dropped.
///
/// Holds only a weak reference to the emitter, so an outstanding subscription
/// never keeps a closed store alive.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    emitter: Weak<EventEmitter<ChangeEvent>>,
    id: ListenerId,
}

impl Subscription {
    pub(crate) fn new(emitter: &Arc<EventEmitter<ChangeEvent>>, id: ListenerId) -> Self {
        Self {
            emitter: Arc::downgrade(emitter),
            id,
        }
    }

    /// Unregisters the listener now rather than at drop.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(emitter) = self.emitter.upgrade() {
            emitter.off(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_emit_reaches_all_listeners() {
        let emitter = EventEmitter::<u32>::new();
        let total = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let total = Arc::clone(&total);
            emitter.on(move |n| {
                total.fetch_add(*n as usize, Ordering::SeqCst);
            });
        }
        emitter.emit(&2);
        assert_eq!(total.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_off_removes_listener() {
        let emitter = EventEmitter::<()>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let id = emitter.on(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        emitter.off(id);
        emitter.off(id);
        emitter.emit(&());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(emitter.is_empty());
    }

    #[test]
    fn test_listener_added_during_emit_waits_for_next_round() {
        let emitter = Arc::new(EventEmitter::<()>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let inner_emitter = Arc::clone(&emitter);
        let inner_calls = Arc::clone(&calls);
        emitter.on(move |_| {
            let c = Arc::clone(&inner_calls);
            inner_emitter.on(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            });
        });

        emitter.emit(&());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        emitter.emit(&());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_drop_unregisters() {
        let emitter = Arc::new(EventEmitter::<ChangeEvent>::new());
        let id = emitter.on(|_| {});
        let sub = Subscription::new(&emitter, id);
        assert_eq!(emitter.len(), 1);
        drop(sub);
        assert_eq!(emitter.len(), 0);
    }

    #[test]
    fn test_event_accessors() {
        let event = ChangeEvent::CategoryDeleted {
            category_id: "c".to_string(),
            item_ids: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(event.category_id(), "c");
        assert_eq!(event.item_ids(), vec!["a", "b"]);
        assert!(event.touches_items());
        assert!(!ChangeEvent::CategoryAdded { category_id: "c".to_string() }.touches_items());
    }

    #[test]
    fn test_deleting_empty_category_touches_no_items() {
        let event = ChangeEvent::CategoryDeleted {
            category_id: "c".to_string(),
            item_ids: vec![],
        };
        assert!(event.item_ids().is_empty());
        assert!(!event.touches_items());

        let toggled = ChangeEvent::ItemUpdated {
            category_id: "c".to_string(),
            item_id: "i".to_string(),
        };
        assert!(toggled.touches_items());
    }
}
