//! Live, lazily refreshed query results.
//!
//! A [`ResultView`] is not a snapshot. It registers a hook with the store that
//! marks the view stale when a commit touches its scope. The hook runs before
//! the writer lock is released, so by the time a write returns or any
//! observer hears about it, the view is already stale. The next read then
//! reloads the items through a reader connection.
//! Reading never consumes the view, so it can be indexed or iterated any
//! number of times.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    ChangeEvent, Item, Predicate, Query, Result, SortField, Store, Subscription, TodoeyError,
};

/// An ordered, filtered, auto-updating list of items.
pub struct ResultView {
    store: Store,
    query: Query,
    state: Arc<ViewState>,
    _watch: Subscription,
}

struct ViewState {
    stale: AtomicBool,
    cache: Mutex<Option<Arc<Vec<Item>>>>,
}

impl ResultView {
    pub(crate) fn new(store: Store, query: Query) -> Self {
        let state = Arc::new(ViewState {
            stale: AtomicBool::new(true),
            cache: Mutex::new(None),
        });

        let watched = query.clone();
        let watch_state = Arc::clone(&state);
        let watch = store.watch(move |event| {
            if watched.is_affected_by(event) {
                watch_state.stale.store(true, Ordering::Release);
            }
        });

        Self {
            store,
            query,
            state,
            _watch: watch,
        }
    }

    /// The query this view evaluates.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Returns the current items, reloading first if a relevant commit landed.
    fn snapshot(&self) -> Result<Arc<Vec<Item>>> {
        let mut cache = self.state.cache.lock();
        let stale = self.state.stale.swap(false, Ordering::AcqRel);

        if let (false, Some(items)) = (stale, cache.as_ref()) {
            return Ok(Arc::clone(items));
        }

        let fresh = self
            .store
            .read(|conn| self.query.load(conn))
            .map_err(|e| {
                self.state.stale.store(true, Ordering::Release);
                e
            })?;
        log::debug!("Recomputed result view {:?}: {} item(s)", self.query.scope, fresh.len());

        let fresh = Arc::new(fresh);
        *cache = Some(Arc::clone(&fresh));
        Ok(fresh)
    }

    /// Number of items currently in the view.
    ///
    /// # Errors
    ///
    /// Returns [`TodoeyError::Database`] if the view had to reload and the read failed.
    pub fn len(&self) -> Result<usize> {
        Ok(self.snapshot()?.len())
    }

    /// An empty view is a valid state; it says nothing about whether the category exists.
    ///
    /// # Errors
    ///
    /// See [`ResultView::len`].
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns the item at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`TodoeyError::IndexOutOfRange`] if `index` is at or past the
    /// current end of the view.
    pub fn get(&self, index: usize) -> Result<Item> {
        let items = self.snapshot()?;
        items
            .get(index)
            .cloned()
            .ok_or(TodoeyError::IndexOutOfRange {
                index,
                len: items.len(),
            })
    }

    /// A copy of the current items.
    ///
    /// # Errors
    ///
    /// See [`ResultView::len`].
    pub fn items(&self) -> Result<Vec<Item>> {
        Ok(self.snapshot()?.as_ref().clone())
    }

    /// Iterates over the items as of this call; later commits do not affect
    /// an iterator already handed out.
    ///
    /// # Errors
    ///
    /// See [`ResultView::len`].
    pub fn iter(&self) -> Result<impl Iterator<Item = Item>> {
        let items = self.snapshot()?;
        Ok((0..items.len()).map(move |i| items[i].clone()))
    }

    /// Position of the item with `item_id`, if it is in the view.
    ///
    /// # Errors
    ///
    /// See [`ResultView::len`].
    pub fn index_of(&self, item_id: &str) -> Result<Option<usize>> {
        Ok(self.snapshot()?.iter().position(|item| item.id == item_id))
    }

    /// A new view that also requires `predicate`. This view is unchanged.
    pub fn filter(&self, predicate: Predicate) -> ResultView {
        self.store.query(self.query.clone().filter(predicate))
    }

    /// Narrows to titles containing `text`, ignoring case and diacritics.
    ///
    /// An empty `text` matches every item but keeps the current ordering; use
    /// [`ResultView::reset_search`] to return to the unfiltered view.
    pub fn search(&self, text: &str) -> ResultView {
        self.filter(Predicate::title_contains(text))
    }

    /// A new view with the same filters in a different order.
    pub fn sorted_by(&self, field: SortField, ascending: bool) -> ResultView {
        self.store.query(self.query.clone().sort_by(field, ascending))
    }

    /// The unfiltered view over the same scope, title ascending.
    pub fn reset_search(&self) -> ResultView {
        self.store.query(self.query.reset())
    }

    /// Calls `callback` after every commit that can change this view.
    pub fn observe(&self, callback: impl Fn(&ChangeEvent) + Send + Sync + 'static) -> Subscription {
        let watched = self.query.clone();
        self.store.subscribe(move |event| {
            if watched.is_affected_by(event) {
                callback(event);
            }
        })
    }
}

impl std::fmt::Debug for ResultView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultView")
            .field("query", &self.query)
            .field("stale", &self.state.stale.load(Ordering::Acquire))
            .finish()
    }
}
