use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Item;

/// A named list of to-do items.
///
/// `items` is the owning edge: an item belongs to exactly one category and is
/// deleted together with it. Two categories are equal when their ids are.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    /// Display colour, stored verbatim and never interpreted.
    pub color_hex: String,
    pub created_at: DateTime<Utc>,
    /// Owned items in insertion order.
    pub items: Vec<Item>,
}

impl PartialEq for Category {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Category {}
