//! Mutation records written to the commit journal.

use serde::{Deserialize, Serialize};

use crate::ChangeEvent;

/// A single committed mutation recorded in the store's commit journal.
///
/// Every variant carries a stable `operation_id` and a wall-clock `timestamp`.
/// Operations are journaled in the same transaction as the mutation they
/// describe and become [`ChangeEvent`]s once that transaction commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Operation {
    /// A new category was created.
    CreateCategory {
        /// Stable UUID for this operation.
        operation_id: String,
        /// Unix timestamp (seconds) when the operation was created.
        timestamp: i64,
        category_id: String,
        name: String,
        color_hex: String,
    },
    /// A category and all of its items were deleted.
    DeleteCategory {
        /// Stable UUID for this operation.
        operation_id: String,
        /// Unix timestamp (seconds) when the operation was created.
        timestamp: i64,
        category_id: String,
        /// Items removed by the cascade, in their former order.
        item_ids: Vec<String>,
    },
    /// An item was appended to a category.
    CreateItem {
        /// Stable UUID for this operation.
        operation_id: String,
        /// Unix timestamp (seconds) when the operation was created.
        timestamp: i64,
        item_id: String,
        category_id: String,
        title: String,
    },
    /// An item was removed from its category.
    DeleteItem {
        /// Stable UUID for this operation.
        operation_id: String,
        /// Unix timestamp (seconds) when the operation was created.
        timestamp: i64,
        item_id: String,
        category_id: String,
    },
    /// An item's `done` flag changed.
    SetItemDone {
        /// Stable UUID for this operation.
        operation_id: String,
        /// Unix timestamp (seconds) when the operation was created.
        timestamp: i64,
        item_id: String,
        category_id: String,
        done: bool,
    },
}

impl Operation {
    /// Returns the stable identifier for this operation.
    #[must_use]
    pub fn operation_id(&self) -> &str {
        match self {
            Self::CreateCategory { operation_id, .. }
            | Self::DeleteCategory { operation_id, .. }
            | Self::CreateItem { operation_id, .. }
            | Self::DeleteItem { operation_id, .. }
            | Self::SetItemDone { operation_id, .. } => operation_id,
        }
    }

    /// Returns the wall-clock Unix timestamp (seconds) when this operation was created.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::CreateCategory { timestamp, .. }
            | Self::DeleteCategory { timestamp, .. }
            | Self::CreateItem { timestamp, .. }
            | Self::DeleteItem { timestamp, .. }
            | Self::SetItemDone { timestamp, .. } => *timestamp,
        }
    }

    /// The variant name, stored in the journal's `operation_type` column.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::CreateCategory { .. } => "CreateCategory",
            Self::DeleteCategory { .. } => "DeleteCategory",
            Self::CreateItem { .. } => "CreateItem",
            Self::DeleteItem { .. } => "DeleteItem",
            Self::SetItemDone { .. } => "SetItemDone",
        }
    }

    /// Converts this operation into the event broadcast after commit.
    #[must_use]
    pub fn change_event(&self) -> ChangeEvent {
        match self {
            Self::CreateCategory { category_id, .. } => ChangeEvent::CategoryAdded {
                category_id: category_id.clone(),
            },
            Self::DeleteCategory { category_id, item_ids, .. } => ChangeEvent::CategoryDeleted {
                category_id: category_id.clone(),
                item_ids: item_ids.clone(),
            },
            Self::CreateItem { item_id, category_id, .. } => ChangeEvent::ItemAdded {
                category_id: category_id.clone(),
                item_id: item_id.clone(),
            },
            Self::DeleteItem { item_id, category_id, .. } => ChangeEvent::ItemDeleted {
                category_id: category_id.clone(),
                item_id: item_id.clone(),
            },
            Self::SetItemDone { item_id, category_id, .. } => ChangeEvent::ItemUpdated {
                category_id: category_id.clone(),
                item_id: item_id.clone(),
            },
        }
    }
}
