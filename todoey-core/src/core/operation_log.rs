//! Durable commit journal and purge strategies for a Todoey store.

use rusqlite::{Connection, Transaction};
use serde::{Deserialize, Serialize};

use crate::{Operation, Result};

/// Seconds in one day; used to convert `RetainDays` to a Unix timestamp cutoff.
const SECONDS_PER_DAY: i64 = 86_400;

/// Controls which old operations are removed from the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeStrategy {
    /// Retain only the most recent `n` operations.
    KeepLast(usize),
    /// Retain operations younger than the given number of days.
    RetainDays(u32),
}

/// One journal row, without the full operation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSummary {
    pub operation_id: String,
    pub timestamp: i64,
    pub operation_type: String,
}

/// Records mutations to the `operations` table and purges stale entries.
#[derive(Debug, Clone)]
pub struct OperationLog {
    strategy: Option<PurgeStrategy>,
}

impl OperationLog {
    /// Creates a journal with the given purge strategy; `None` keeps every entry.
    pub fn new(strategy: Option<PurgeStrategy>) -> Self {
        Self { strategy }
    }

    /// Serialises `op` and appends it to the `operations` table within `tx`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TodoeyError::Database`] if the INSERT fails, or
    /// [`crate::TodoeyError::Json`] if `op` cannot be serialised.
    pub fn log(&self, tx: &Transaction, op: &Operation) -> Result<()> {
        let op_json = serde_json::to_string(op)?;

        tx.execute(
            "INSERT INTO operations (operation_id, timestamp, operation_type, operation_data)
             VALUES (?, ?, ?, ?)",
            rusqlite::params![op.operation_id(), op.timestamp(), op.type_name(), op_json],
        )?;

        Ok(())
    }

    /// Deletes old operations from the journal according to the purge strategy.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TodoeyError::Database`] if the DELETE fails.
    pub fn purge_if_needed(&self, tx: &Transaction) -> Result<()> {
        match self.strategy {
            Some(PurgeStrategy::KeepLast(keep_last)) => {
                tx.execute(
                    "DELETE FROM operations WHERE id NOT IN (
                        SELECT id FROM operations ORDER BY id DESC LIMIT ?
                    )",
                    [keep_last as i64],
                )?;
            }
            Some(PurgeStrategy::RetainDays(days)) => {
                let cutoff = chrono::Utc::now().timestamp() - (i64::from(days) * SECONDS_PER_DAY);
                tx.execute("DELETE FROM operations WHERE timestamp < ?", [cutoff])?;
            }
            None => {}
        }
        Ok(())
    }

    /// Returns journal entries matching the filters, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TodoeyError::Database`] if the query fails.
    pub fn list(
        &self,
        conn: &Connection,
        type_filter: Option<&str>,
        since: Option<i64>,
        until: Option<i64>,
    ) -> Result<Vec<OperationSummary>> {
        let mut stmt = conn.prepare(
            "SELECT operation_id, timestamp, operation_type FROM operations
             WHERE (?1 IS NULL OR operation_type = ?1)
               AND (?2 IS NULL OR timestamp >= ?2)
               AND (?3 IS NULL OR timestamp <= ?3)
             ORDER BY id DESC",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![type_filter, since, until], |row| {
                Ok(OperationSummary {
                    operation_id: row.get(0)?,
                    timestamp: row.get(1)?,
                    operation_type: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Deletes every journal entry. Returns the number deleted.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TodoeyError::Database`] if the DELETE fails.
    pub fn purge_all(&self, tx: &Transaction) -> Result<usize> {
        Ok(tx.execute("DELETE FROM operations", [])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn journal_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(include_str!("schema.sql")).unwrap();
        conn
    }

    fn create_op(i: i64) -> Operation {
        Operation::CreateCategory {
            operation_id: format!("op-{i}"),
            timestamp: 1000 + i,
            category_id: format!("cat-{i}"),
            name: format!("Category {i}"),
            color_hex: "#FFFFFF".to_string(),
        }
    }

    #[test]
    fn test_log_and_purge() {
        let mut conn = journal_db();
        let log = OperationLog::new(Some(PurgeStrategy::KeepLast(5)));

        let tx = conn.transaction().unwrap();
        for i in 0..10 {
            log.log(&tx, &create_op(i)).unwrap();
        }
        log.purge_if_needed(&tx).unwrap();
        tx.commit().unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM operations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 5);

        let newest = log.list(&conn, None, None, None).unwrap();
        assert_eq!(newest[0].operation_id, "op-9");
    }

    #[test]
    fn test_retain_days_drops_old_entries() {
        let mut conn = journal_db();
        let log = OperationLog::new(Some(PurgeStrategy::RetainDays(1)));

        let tx = conn.transaction().unwrap();
        log.log(&tx, &create_op(0)).unwrap();
        let fresh = Operation::DeleteItem {
            operation_id: "op-fresh".to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            item_id: "i".to_string(),
            category_id: "c".to_string(),
        };
        log.log(&tx, &fresh).unwrap();
        log.purge_if_needed(&tx).unwrap();
        tx.commit().unwrap();

        let remaining = log.list(&conn, None, None, None).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].operation_id, "op-fresh");
    }

    #[test]
    fn test_list_filters_by_type_and_time() {
        let mut conn = journal_db();
        let log = OperationLog::new(None);

        let tx = conn.transaction().unwrap();
        for i in 0..3 {
            log.log(&tx, &create_op(i)).unwrap();
        }
        log.log(
            &tx,
            &Operation::SetItemDone {
                operation_id: "op-done".to_string(),
                timestamp: 2000,
                item_id: "i".to_string(),
                category_id: "c".to_string(),
                done: true,
            },
        )
        .unwrap();
        tx.commit().unwrap();

        let done_ops = log.list(&conn, Some("SetItemDone"), None, None).unwrap();
        assert_eq!(done_ops.len(), 1);

        let window = log.list(&conn, None, Some(1001), Some(1002)).unwrap();
        let ids: Vec<_> = window.iter().map(|s| s.operation_id.as_str()).collect();
        assert_eq!(ids, vec!["op-2", "op-1"]);

        let tx = conn.transaction().unwrap();
        assert_eq!(log.purge_all(&tx).unwrap(), 4);
        tx.commit().unwrap();
    }
}
