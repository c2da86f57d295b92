//! Category and item operations over an opened [`Store`].

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::core::item::{load_item, map_item_row, now_millis, ITEM_SELECT};
use crate::{
    Category, DeleteResult, Item, Operation, OperationSummary, Query, Result, ResultView, Store,
    TodoeyError,
};

/// The only component that mutates categories and items.
///
/// Every mutation runs in exactly one write transaction on the shared
/// [`Store`], so a failure leaves the store as it was and a success is visible
/// to every open [`ResultView`] on its next read. Clones share the store.
#[derive(Debug, Clone)]
pub struct Repository {
    store: Store,
}

impl Repository {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Creates an empty category.
    ///
    /// # Errors
    ///
    /// Returns [`TodoeyError::Validation`] if `name` is empty or blank, or
    /// [`TodoeyError::TransactionFailed`] if the write cannot be committed.
    pub fn add_category(&self, name: &str, color_hex: &str) -> Result<Category> {
        if name.trim().is_empty() {
            return Err(TodoeyError::Validation("Category name must not be empty".to_string()));
        }

        let category = Category {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            color_hex: color_hex.to_string(),
            created_at: now_millis(),
            items: Vec::new(),
        };

        self.store.with_write_transaction(|txn| {
            txn.execute(
                "INSERT INTO categories (id, name, color_hex, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    category.id,
                    category.name,
                    category.color_hex,
                    category.created_at.timestamp_millis(),
                ],
            )?;
            txn.record(Operation::CreateCategory {
                operation_id: Uuid::new_v4().to_string(),
                timestamp: category.created_at.timestamp(),
                category_id: category.id.clone(),
                name: category.name.clone(),
                color_hex: category.color_hex.clone(),
            });
            Ok(())
        })?;

        log::info!("Created category {} '{}'", category.id, category.name);
        Ok(category)
    }

    /// Deletes `category_id` and every item it owns in one transaction.
    ///
    /// Items are removed leaves-first: ownership links, then the items, then
    /// the category row, so a failure at any step rolls the whole cascade back.
    ///
    /// # Errors
    ///
    /// Returns [`TodoeyError::CategoryNotFound`] if no category has that id,
    /// or [`TodoeyError::TransactionFailed`] if the write cannot be committed.
    pub fn delete_category(&self, category_id: &str) -> Result<DeleteResult> {
        let result = self.store.with_write_transaction(|txn| {
            if !category_exists(txn, category_id)? {
                return Err(TodoeyError::CategoryNotFound(category_id.to_string()));
            }

            let item_ids: Vec<String> = {
                let mut stmt = txn.prepare(
                    "SELECT item_id FROM category_items WHERE category_id = ?1 ORDER BY position",
                )?;
                let ids = stmt
                    .query_map([category_id], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                ids
            };

            txn.execute("DELETE FROM category_items WHERE category_id = ?1", [category_id])?;
            for item_id in &item_ids {
                txn.execute("DELETE FROM items WHERE id = ?1", [item_id])?;
            }
            txn.execute("DELETE FROM categories WHERE id = ?1", [category_id])?;

            txn.record(Operation::DeleteCategory {
                operation_id: Uuid::new_v4().to_string(),
                timestamp: chrono::Utc::now().timestamp(),
                category_id: category_id.to_string(),
                item_ids: item_ids.clone(),
            });

            let mut affected_ids = Vec::with_capacity(item_ids.len() + 1);
            affected_ids.push(category_id.to_string());
            affected_ids.extend(item_ids);
            Ok(DeleteResult {
                deleted_count: affected_ids.len(),
                affected_ids,
            })
        })?;

        log::info!(
            "Deleted category {category_id} with {} item(s)",
            result.deleted_count - 1
        );
        Ok(result)
    }

    /// Appends a new, not-done item to `parent_category_id`.
    ///
    /// # Errors
    ///
    /// Returns [`TodoeyError::Validation`] if `title` is empty or blank or the
    /// parent category does not exist, or [`TodoeyError::TransactionFailed`]
    /// if the write cannot be committed.
    pub fn add_item(&self, title: &str, parent_category_id: &str) -> Result<Item> {
        if title.trim().is_empty() {
            return Err(TodoeyError::Validation("Item title must not be empty".to_string()));
        }

        let item = self.store.with_write_transaction(|txn| {
            let position: i64 = txn
                .query_row(
                    "SELECT next_position FROM categories WHERE id = ?1",
                    [parent_category_id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| {
                    TodoeyError::Validation(format!(
                        "Parent category {parent_category_id} does not exist"
                    ))
                })?;
            txn.execute(
                "UPDATE categories SET next_position = next_position + 1 WHERE id = ?1",
                [parent_category_id],
            )?;

            let item = Item {
                id: Uuid::new_v4().to_string(),
                title: title.to_string(),
                done: false,
                date_created: now_millis(),
                parent_category: parent_category_id.to_string(),
                position,
            };

            txn.execute(
                "INSERT INTO items (id, title, done, date_created) VALUES (?1, ?2, 0, ?3)",
                rusqlite::params![item.id, item.title, item.date_created.timestamp_millis()],
            )?;
            // The ownership edge is the append itself.
            txn.execute(
                "INSERT INTO category_items (item_id, category_id, position) VALUES (?1, ?2, ?3)",
                rusqlite::params![item.id, item.parent_category, item.position],
            )?;

            txn.record(Operation::CreateItem {
                operation_id: Uuid::new_v4().to_string(),
                timestamp: item.date_created.timestamp(),
                item_id: item.id.clone(),
                category_id: item.parent_category.clone(),
                title: item.title.clone(),
            });
            Ok(item)
        })?;

        log::info!("Added item {} to category {}", item.id, item.parent_category);
        Ok(item)
    }

    /// Removes `item_id` from its category.
    ///
    /// # Errors
    ///
    /// Returns [`TodoeyError::ItemNotFound`] if no item has that id, or
    /// [`TodoeyError::TransactionFailed`] if the write cannot be committed.
    pub fn delete_item(&self, item_id: &str) -> Result<DeleteResult> {
        let result = self.store.with_write_transaction(|txn| {
            let category_id: String = txn
                .query_row(
                    "SELECT category_id FROM category_items WHERE item_id = ?1",
                    [item_id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| TodoeyError::ItemNotFound(item_id.to_string()))?;

            txn.execute("DELETE FROM category_items WHERE item_id = ?1", [item_id])?;
            txn.execute("DELETE FROM items WHERE id = ?1", [item_id])?;

            txn.record(Operation::DeleteItem {
                operation_id: Uuid::new_v4().to_string(),
                timestamp: chrono::Utc::now().timestamp(),
                item_id: item_id.to_string(),
                category_id,
            });
            Ok(DeleteResult {
                deleted_count: 1,
                affected_ids: vec![item_id.to_string()],
            })
        })?;

        log::info!("Deleted item {item_id}");
        Ok(result)
    }

    /// Flips the `done` flag of `item_id` and returns the updated item.
    ///
    /// # Errors
    ///
    /// Returns [`TodoeyError::ItemNotFound`] if no item has that id, or
    /// [`TodoeyError::TransactionFailed`] if the write cannot be committed.
    pub fn toggle_done(&self, item_id: &str) -> Result<Item> {
        self.store.with_write_transaction(|txn| {
            let mut item = load_item(txn, item_id)?;
            item.done = !item.done;

            txn.execute(
                "UPDATE items SET done = ?1 WHERE id = ?2",
                rusqlite::params![item.done, item.id],
            )?;
            txn.record(Operation::SetItemDone {
                operation_id: Uuid::new_v4().to_string(),
                timestamp: chrono::Utc::now().timestamp(),
                item_id: item.id.clone(),
                category_id: item.parent_category.clone(),
                done: item.done,
            });
            Ok(item)
        })
    }

    /// Fetches one item by id.
    ///
    /// # Errors
    ///
    /// Returns [`TodoeyError::ItemNotFound`] if no item has that id.
    pub fn get_item(&self, item_id: &str) -> Result<Item> {
        self.store.read(|conn| load_item(conn, item_id))
    }

    /// Fetches one category with its items in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`TodoeyError::CategoryNotFound`] if no category has that id.
    pub fn get_category(&self, category_id: &str) -> Result<Category> {
        self.store.read(|conn| {
            let mut category = conn
                .query_row(
                    "SELECT id, name, color_hex, created_at FROM categories WHERE id = ?1",
                    [category_id],
                    map_category_row,
                )
                .optional()?
                .ok_or_else(|| TodoeyError::CategoryNotFound(category_id.to_string()))?;

            let mut stmt = conn.prepare(&format!(
                "{ITEM_SELECT} WHERE ci.category_id = ?1 ORDER BY ci.position"
            ))?;
            category.items = stmt
                .query_map([category_id], map_item_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(category)
        })
    }

    /// Every category in creation order, each with its items.
    ///
    /// # Errors
    ///
    /// Returns [`TodoeyError::Database`] if the read fails.
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        self.store.read(|conn| {
            let mut categories = {
                let mut stmt = conn.prepare(
                    "SELECT id, name, color_hex, created_at FROM categories
                     ORDER BY created_at, rowid",
                )?;
                let rows = stmt
                    .query_map([], map_category_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            };

            let mut by_category: HashMap<String, Vec<Item>> = HashMap::new();
            let mut stmt = conn.prepare(&format!("{ITEM_SELECT} ORDER BY ci.position"))?;
            for item in stmt.query_map([], map_item_row)? {
                let item = item?;
                by_category
                    .entry(item.parent_category.clone())
                    .or_default()
                    .push(item);
            }

            for category in &mut categories {
                category.items = by_category.remove(&category.id).unwrap_or_default();
            }
            Ok(categories)
        })
    }

    /// Number of items owned by `category_id`; zero for an unknown category.
    ///
    /// # Errors
    ///
    /// Returns [`TodoeyError::Database`] if the read fails.
    pub fn count_items(&self, category_id: &str) -> Result<usize> {
        self.store.read(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM category_items WHERE category_id = ?1",
                [category_id],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }

    /// Live view of the items in `category_id`, title ascending.
    ///
    /// An unknown category gives an empty view rather than an error.
    pub fn filter_by_category(&self, category_id: &str) -> ResultView {
        self.store.query(Query::in_category(category_id))
    }

    /// Live view of every item, title ascending.
    pub fn all_items(&self) -> ResultView {
        self.store.query(Query::all_items())
    }

    /// Returns journal entries matching the given filters, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`TodoeyError::Database`] if the read fails.
    pub fn list_operations(
        &self,
        type_filter: Option<&str>,
        since: Option<i64>,
        until: Option<i64>,
    ) -> Result<Vec<OperationSummary>> {
        self.store
            .read(|conn| self.store.operation_log().list(conn, type_filter, since, until))
    }

    /// Deletes every journal entry. Returns the number deleted.
    ///
    /// # Errors
    ///
    /// Returns [`TodoeyError::TransactionFailed`] if the write cannot be committed.
    pub fn purge_all_operations(&self) -> Result<usize> {
        let store = &self.store;
        let purged = store
            .with_write_transaction(|txn| store.operation_log().purge_all(txn.transaction()))?;
        log::info!("Purged {purged} journal entries");
        Ok(purged)
    }
}

fn category_exists(conn: &Connection, category_id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM categories WHERE id = ?1",
        [category_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn map_category_row(row: &rusqlite::Row) -> rusqlite::Result<Category> {
    let millis: i64 = row.get(3)?;
    let created_at = chrono::DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(3, millis))?;
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        color_hex: row.get(2)?,
        created_at,
        items: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn setup() -> (Repository, NamedTempFile) {
        let temp = NamedTempFile::new().unwrap();
        let repo = Repository::new(Store::open(temp.path()).unwrap());
        (repo, temp)
    }

    #[test]
    fn test_add_category() {
        let (repo, _temp) = setup();
        let category = repo.add_category("Home", "#1D9BF6").unwrap();

        let stored = repo.get_category(&category.id).unwrap();
        assert_eq!(stored.name, "Home");
        assert_eq!(stored.color_hex, "#1D9BF6");
        assert_eq!(stored.created_at, category.created_at);
        assert!(stored.items.is_empty());
    }

    #[test]
    fn test_add_category_rejects_empty_name() {
        let (repo, _temp) = setup();
        assert!(matches!(repo.add_category("", "#000000"), Err(TodoeyError::Validation(_))));
        assert!(matches!(repo.add_category("   ", "#000000"), Err(TodoeyError::Validation(_))));
        assert!(repo.list_categories().unwrap().is_empty());
    }

    #[test]
    fn test_color_is_stored_verbatim() {
        let (repo, _temp) = setup();
        let category = repo.add_category("Odd", "not-a-color").unwrap();
        assert_eq!(repo.get_category(&category.id).unwrap().color_hex, "not-a-color");
    }

    #[test]
    fn test_add_item_defaults() {
        let (repo, _temp) = setup();
        let home = repo.add_category("Home", "#1D9BF6").unwrap();
        let before = now_millis();
        let item = repo.add_item("Buy milk", &home.id).unwrap();

        assert!(!item.done);
        assert_eq!(item.parent_category, home.id);
        assert!(item.date_created >= before);
        assert_eq!(repo.get_item(&item.id).unwrap().date_created, item.date_created);
    }

    #[test]
    fn test_add_item_appends_in_insertion_order() {
        let (repo, _temp) = setup();
        let home = repo.add_category("Home", "#1D9BF6").unwrap();
        for title in ["Zebra food", "Apples", "Milk"] {
            repo.add_item(title, &home.id).unwrap();
        }

        let titles: Vec<String> = repo
            .get_category(&home.id)
            .unwrap()
            .items
            .into_iter()
            .map(|i| i.title)
            .collect();
        assert_eq!(titles, vec!["Zebra food", "Apples", "Milk"]);
    }

    #[test]
    fn test_add_item_rejects_empty_title() {
        let (repo, _temp) = setup();
        let home = repo.add_category("Home", "#1D9BF6").unwrap();
        assert!(matches!(repo.add_item("", &home.id), Err(TodoeyError::Validation(_))));
        assert_eq!(repo.count_items(&home.id).unwrap(), 0);
    }

    #[test]
    fn test_add_item_without_parent_is_validation_error() {
        let (repo, _temp) = setup();
        let result = repo.add_item("Orphan", "no-such-category");
        assert!(matches!(result, Err(TodoeyError::Validation(_))));
        assert!(repo.all_items().is_empty().unwrap());
    }

    #[test]
    fn test_delete_category_cascades() {
        let (repo, _temp) = setup();
        let home = repo.add_category("Home", "#1D9BF6").unwrap();
        let work = repo.add_category("Work", "#FF9500").unwrap();
        let milk = repo.add_item("Buy milk", &home.id).unwrap();
        let sink = repo.add_item("Fix sink", &home.id).unwrap();
        let report = repo.add_item("Write report", &work.id).unwrap();

        let result = repo.delete_category(&home.id).unwrap();
        assert_eq!(result.deleted_count, 3);
        assert_eq!(result.affected_ids[0], home.id);
        assert!(result.affected_ids.contains(&milk.id));
        assert!(result.affected_ids.contains(&sink.id));

        assert!(matches!(repo.get_item(&milk.id), Err(TodoeyError::ItemNotFound(_))));
        assert!(matches!(repo.get_item(&sink.id), Err(TodoeyError::ItemNotFound(_))));
        assert!(matches!(repo.get_category(&home.id), Err(TodoeyError::CategoryNotFound(_))));
        assert_eq!(repo.get_item(&report.id).unwrap().title, "Write report");

        let orphans: i64 = repo
            .store()
            .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(orphans, 1);
    }

    #[test]
    fn test_delete_category_not_found() {
        let (repo, _temp) = setup();
        let result = repo.delete_category("nonexistent-id");
        assert!(matches!(result, Err(TodoeyError::CategoryNotFound(_))));
    }

    #[test]
    fn test_delete_category_twice() {
        let (repo, _temp) = setup();
        let home = repo.add_category("Home", "#1D9BF6").unwrap();
        repo.delete_category(&home.id).unwrap();
        assert!(repo.delete_category(&home.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_item() {
        let (repo, _temp) = setup();
        let home = repo.add_category("Home", "#1D9BF6").unwrap();
        let milk = repo.add_item("Buy milk", &home.id).unwrap();
        let sink = repo.add_item("Fix sink", &home.id).unwrap();

        let result = repo.delete_item(&milk.id).unwrap();
        assert_eq!(result.affected_ids, vec![milk.id.clone()]);

        let remaining = repo.get_category(&home.id).unwrap().items;
        assert_eq!(remaining, vec![sink]);
        assert!(matches!(repo.delete_item(&milk.id), Err(TodoeyError::ItemNotFound(_))));
    }

    #[test]
    fn test_append_after_delete_keeps_order() {
        let (repo, _temp) = setup();
        let home = repo.add_category("Home", "#1D9BF6").unwrap();
        repo.add_item("first", &home.id).unwrap();
        let second = repo.add_item("second", &home.id).unwrap();
        repo.delete_item(&second.id).unwrap();
        let third = repo.add_item("third", &home.id).unwrap();

        assert!(third.position > second.position);
        let titles: Vec<String> = repo
            .get_category(&home.id)
            .unwrap()
            .items
            .into_iter()
            .map(|i| i.title)
            .collect();
        assert_eq!(titles, vec!["first", "third"]);
    }

    #[test]
    fn test_ids_are_not_reused() {
        let (repo, _temp) = setup();
        let home = repo.add_category("Home", "#1D9BF6").unwrap();
        let first = repo.add_item("Buy milk", &home.id).unwrap();
        repo.delete_item(&first.id).unwrap();
        let second = repo.add_item("Buy milk", &home.id).unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_toggle_done_is_its_own_inverse() {
        let (repo, _temp) = setup();
        let home = repo.add_category("Home", "#1D9BF6").unwrap();
        let item = repo.add_item("Buy milk", &home.id).unwrap();

        assert!(repo.toggle_done(&item.id).unwrap().done);
        assert!(repo.get_item(&item.id).unwrap().done);
        assert!(!repo.toggle_done(&item.id).unwrap().done);
        assert!(!repo.get_item(&item.id).unwrap().done);
    }

    #[test]
    fn test_toggle_done_not_found() {
        let (repo, _temp) = setup();
        assert!(matches!(repo.toggle_done("missing"), Err(TodoeyError::ItemNotFound(_))));
    }

    #[test]
    fn test_list_categories_in_creation_order_with_items() {
        let (repo, _temp) = setup();
        let home = repo.add_category("Home", "#1D9BF6").unwrap();
        let work = repo.add_category("Work", "#FF9500").unwrap();
        let empty = repo.add_category("Someday", "#8E8E93").unwrap();
        repo.add_item("Write report", &work.id).unwrap();
        repo.add_item("Buy milk", &home.id).unwrap();
        repo.add_item("Fix sink", &home.id).unwrap();

        let categories = repo.list_categories().unwrap();
        assert_eq!(categories, vec![home, work, empty]);
        assert_eq!(categories[0].items.len(), 2);
        assert_eq!(categories[1].items.len(), 1);
        assert!(categories[2].items.is_empty());
    }

    #[test]
    fn test_count_items_unknown_category_is_zero() {
        let (repo, _temp) = setup();
        assert_eq!(repo.count_items("missing").unwrap(), 0);
    }

    #[test]
    fn test_mutations_are_journaled() {
        let (repo, _temp) = setup();
        let home = repo.add_category("Home", "#1D9BF6").unwrap();
        let item = repo.add_item("Buy milk", &home.id).unwrap();
        repo.toggle_done(&item.id).unwrap();
        repo.delete_category(&home.id).unwrap();
        let _ = repo.add_item("", &home.id);

        let types: Vec<String> = repo
            .list_operations(None, None, None)
            .unwrap()
            .into_iter()
            .map(|op| op.operation_type)
            .collect();
        assert_eq!(types, vec!["DeleteCategory", "SetItemDone", "CreateItem", "CreateCategory"]);

        assert_eq!(repo.list_operations(Some("CreateItem"), None, None).unwrap().len(), 1);
        assert_eq!(repo.purge_all_operations().unwrap(), 4);
        assert!(repo.list_operations(None, None, None).unwrap().is_empty());
    }

    #[test]
    fn test_failed_add_item_leaves_no_journal_entry() {
        let (repo, _temp) = setup();
        let home = repo.add_category("Home", "#1D9BF6").unwrap();
        let _ = repo.add_item("Orphan", "missing");
        let _ = repo.add_item("Buy milk", &home.id);

        let types: Vec<String> = repo
            .list_operations(None, None, None)
            .unwrap()
            .into_iter()
            .map(|op| op.operation_type)
            .collect();
        assert_eq!(types, vec!["CreateItem", "CreateCategory"]);
    }
}
