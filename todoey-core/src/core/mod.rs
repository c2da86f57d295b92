//! Internal domain modules for the Todoey core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod category;
pub mod config;
pub mod delete;
pub mod error;
pub mod event;
pub mod item;
pub mod operation;
pub mod operation_log;
pub mod predicate;
pub mod repository;
pub mod results;
pub mod storage;

#[doc(inline)]
pub use category::Category;
#[doc(inline)]
pub use config::{JournalConfig, StoreConfig};
#[doc(inline)]
pub use delete::DeleteResult;
#[doc(inline)]
pub use error::{Result, TodoeyError};
#[doc(inline)]
pub use event::{ChangeEvent, EventEmitter, ListenerId, Subscription};
#[doc(inline)]
pub use item::Item;
#[doc(inline)]
pub use operation::Operation;
#[doc(inline)]
pub use operation_log::{OperationLog, OperationSummary, PurgeStrategy};
#[doc(inline)]
pub use predicate::{fold, Comparison, ItemField, Predicate, PredicateValue, Query, Scope, Sort, SortField};
#[doc(inline)]
pub use repository::Repository;
#[doc(inline)]
pub use results::ResultView;
#[doc(inline)]
pub use storage::{Store, WriteTxn, SCHEMA_VERSION};
