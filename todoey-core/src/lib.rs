//! Core library for Todoey, a categorised to-do list backed by a local store.
//!
//! Open a [`Store`] on a database file and wrap it in a [`Repository`], the
//! only component that mutates categories and items. Reads go through live
//! [`ResultView`]s, which follow every committed change to their scope until
//! dropped.
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

// Re-export commonly used types.
#[doc(inline)]
pub use core::{
    category::Category,
    config::{JournalConfig, StoreConfig},
    delete::DeleteResult,
    error::{Result, TodoeyError},
    event::{ChangeEvent, EventEmitter, ListenerId, Subscription},
    item::Item,
    operation::Operation,
    operation_log::{OperationLog, OperationSummary, PurgeStrategy},
    predicate::{fold, Comparison, ItemField, Predicate, PredicateValue, Query, Scope, Sort, SortField},
    repository::Repository,
    results::ResultView,
    storage::{Store, WriteTxn, SCHEMA_VERSION},
};
