//! Result type for removal operations.
//!
//! Deleting a category cascades to every item it owns, inside the same
//! transaction; deleting an item removes only that item. Both report what was
//! removed through [`DeleteResult`].
//!
//! ## Serialization
//!
//! `DeleteResult` fields serialize in camelCase (`deletedCount`,
//! `affectedIds`), consistent with the other types in this crate.
//!
//! ## Examples
//!
//! ```rust
//! use todoey_core::DeleteResult;
//!
//! let result = DeleteResult {
//!     deleted_count: 3,
//!     affected_ids: vec!["cat".to_string(), "a".to_string(), "b".to_string()],
//! };
//! let json = serde_json::to_string(&result).unwrap();
//! assert!(json.contains("deletedCount"));
//! assert!(json.contains("affectedIds"));
//! ```

use serde::{Deserialize, Serialize};

/// The outcome of a delete performed through a [`Repository`](crate::Repository).
///
/// # Examples
///
/// ```rust
/// use todoey_core::DeleteResult;
///
/// let result = DeleteResult {
///     deleted_count: 1,
///     affected_ids: vec!["item-id-abc".to_string()],
/// };
/// assert_eq!(result.deleted_count, 1);
/// assert_eq!(result.affected_ids.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    /// The total number of records (category and items) that were removed.
    pub deleted_count: usize,

    /// IDs of every removed record; for a category, its own ID comes first.
    pub affected_ids: Vec<String>,
}
