use chrono::{DateTime, Timelike, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::{Result, TodoeyError};

/// Column list shared by every item query; the parent comes from the ownership edge.
pub(crate) const ITEM_SELECT: &str =
    "SELECT i.id, i.title, i.done, i.date_created, ci.category_id, ci.position
     FROM items i
     JOIN category_items ci ON ci.item_id = i.id";

/// A single to-do entry owned by a [`Category`](crate::Category).
///
/// `parent_category` is resolved from the category's item list on every read;
/// it is a lookup, not a stored foreign key. Two items are equal when their
/// ids are.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub title: String,
    pub done: bool,
    /// Set once at creation.
    pub date_created: DateTime<Utc>,
    pub parent_category: String,
    /// Ordering key within the parent category; grows with every insertion.
    pub position: i64,
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Item {}

/// Maps one [`ITEM_SELECT`] row into an [`Item`].
pub(crate) fn map_item_row(row: &rusqlite::Row) -> rusqlite::Result<Item> {
    let millis: i64 = row.get(3)?;
    let date_created = DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(3, millis))?;
    Ok(Item {
        id: row.get(0)?,
        title: row.get(1)?,
        done: row.get::<_, i64>(2)? != 0,
        date_created,
        parent_category: row.get(4)?,
        position: row.get(5)?,
    })
}

/// Fetches one item by id.
///
/// # Errors
///
/// Returns [`TodoeyError::ItemNotFound`] if no item has `item_id`.
pub(crate) fn load_item(conn: &Connection, item_id: &str) -> Result<Item> {
    conn.query_row(&format!("{ITEM_SELECT} WHERE i.id = ?1"), [item_id], map_item_row)
        .optional()?
        .ok_or_else(|| TodoeyError::ItemNotFound(item_id.to_string()))
}

/// The current time truncated to the millisecond precision the store keeps.
pub(crate) fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(now.nanosecond() / 1_000_000 * 1_000_000)
        .unwrap_or(now)
}
