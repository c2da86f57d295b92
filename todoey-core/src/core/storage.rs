//! The store handle: one opened Todoey database file.
//!
//! A [`Store`] owns every SQLite connection to the file. Writes go through a
//! single writer connection guarded by a mutex, so at most one
//! [`Store::with_write_transaction`] runs at a time. Reads borrow a connection
//! from a small pool; the database runs in WAL mode, so readers never wait on
//! each other or on an in-flight write, and only ever see committed state.

use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::{
    ChangeEvent, EventEmitter, Operation, OperationLog, Query, Result, ResultView, StoreConfig,
    Subscription, TodoeyError,
};

/// Version written to `PRAGMA user_version` for stores created by this library.
pub const SCHEMA_VERSION: i64 = 1;

/// Columns that must exist for a file to be accepted as a Todoey store.
const REQUIRED_COLUMNS: [(&str, &str); 6] = [
    ("categories", "color_hex"),
    ("categories", "next_position"),
    ("items", "done"),
    ("items", "date_created"),
    ("category_items", "position"),
    ("operations", "operation_data"),
];

/// A handle to an opened store. Cheap to clone; clones share the same connections.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    path: PathBuf,
    config: StoreConfig,
    writer: Mutex<Connection>,
    readers: Mutex<Vec<Connection>>,
    operation_log: OperationLog,
    changes: Arc<EventEmitter<ChangeEvent>>,
    /// Result view invalidation. Fired under the writer lock, before `changes`.
    invalidations: Arc<EventEmitter<ChangeEvent>>,
}

/// Exclusive write access handed to the closure of [`Store::with_write_transaction`].
///
/// Dereferences to the underlying [`Connection`] for issuing statements.
/// Mutations describe themselves with [`WriteTxn::record`]; recorded operations
/// are journaled and broadcast only if the transaction commits.
pub struct WriteTxn<'conn> {
    tx: Transaction<'conn>,
    operations: Vec<Operation>,
}

impl<'conn> WriteTxn<'conn> {
    /// Queues `op` for the commit journal and the post-commit broadcast.
    pub fn record(&mut self, op: Operation) {
        self.operations.push(op);
    }

    pub(crate) fn transaction(&self) -> &Transaction<'conn> {
        &self.tx
    }
}

impl Deref for WriteTxn<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &*self.tx
    }
}

impl Store {
    /// Opens the store at `location`, creating the file and schema if needed.
    ///
    /// # Errors
    ///
    /// Returns [`TodoeyError::StoreUnavailable`] if the location cannot be
    /// created or opened, is not a SQLite database, or holds a schema this
    /// library does not understand.
    pub fn open<P: AsRef<Path>>(location: P) -> Result<Self> {
        Self::open_with_config(location, StoreConfig::default())
    }

    /// Like [`Store::open`], with explicit tunables.
    ///
    /// # Errors
    ///
    /// See [`Store::open`].
    pub fn open_with_config<P: AsRef<Path>>(location: P, config: StoreConfig) -> Result<Self> {
        let path = location.as_ref().to_path_buf();
        let writer = open_writer(&path, &config).map_err(|e| unavailable(&path, e))?;
        log::debug!("Opened store at {}", path.display());

        let operation_log = OperationLog::new(config.journal.purge_strategy());
        Ok(Self {
            inner: Arc::new(StoreInner {
                path,
                config,
                writer: Mutex::new(writer),
                readers: Mutex::new(Vec::new()),
                operation_log,
                changes: Arc::new(EventEmitter::new()),
                invalidations: Arc::new(EventEmitter::new()),
            }),
        })
    }

    /// The file this store was opened from.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Runs `f` inside one write transaction and commits it.
    ///
    /// The transaction is either fully committed or fully rolled back on every
    /// exit path: an `Err` from `f`, a failed commit, or a panic unwinding
    /// through `f` all leave the store as it was. A second caller blocks until
    /// the running transaction finishes. Transactions do not nest; calling this
    /// again from inside `f` deadlocks.
    ///
    /// After a successful commit, and while the writer lock is still held,
    /// every open [`ResultView`] the commit affects is marked stale. Then each
    /// operation `f` recorded is broadcast to subscribers as a [`ChangeEvent`],
    /// outside the writer lock.
    ///
    /// # Errors
    ///
    /// Returns whatever caller-level error `f` produced (validation, not
    /// found), or [`TodoeyError::TransactionFailed`] for any SQLite fault
    /// during the transaction, including the commit.
    pub fn with_write_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut WriteTxn<'_>) -> Result<T>,
    {
        let (value, events) = {
            let mut conn = self.inner.writer.lock();
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| TodoeyError::TransactionFailed(e.to_string()))?;
            let mut txn = WriteTxn {
                tx,
                operations: Vec::new(),
            };

            let value = f(&mut txn).map_err(rolled_back)?;

            let WriteTxn { tx, operations } = txn;
            for op in &operations {
                self.inner.operation_log.log(&tx, op).map_err(rolled_back)?;
            }
            if !operations.is_empty() {
                self.inner.operation_log.purge_if_needed(&tx).map_err(rolled_back)?;
            }
            tx.commit()
                .map_err(|e| rolled_back(TodoeyError::TransactionFailed(e.to_string())))?;

            log::debug!("Committed write transaction with {} operation(s)", operations.len());
            let events: Vec<ChangeEvent> = operations.iter().map(Operation::change_event).collect();
            // Views must be stale before any other thread or observer can act on the commit.
            for event in &events {
                self.inner.invalidations.emit(event);
            }
            (value, events)
        };

        for event in &events {
            self.inner.changes.emit(event);
        }
        Ok(value)
    }

    /// Runs `f` against a pooled reader connection inside one read snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`TodoeyError::Database`] if a reader cannot be opened, or
    /// whatever `f` returns.
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let pooled = self.inner.readers.lock().pop();
        let conn = match pooled {
            Some(conn) => conn,
            None => self.inner.open_reader()?,
        };

        let result = {
            let snapshot = conn.unchecked_transaction()?;
            f(&*snapshot)
        };

        let mut pool = self.inner.readers.lock();
        if pool.len() < self.inner.config.reader_pool_size {
            pool.push(conn);
        }
        result
    }

    /// Returns a live view over `query`.
    pub fn query(&self, query: Query) -> ResultView {
        ResultView::new(self.clone(), query)
    }

    /// Calls `callback` after every committed change until the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe(&self, callback: impl Fn(&ChangeEvent) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.changes.on(callback);
        Subscription::new(&self.inner.changes, id)
    }

    /// Registers a result view's staleness hook.
    ///
    /// `callback` runs while the writer lock is held, so it must only flip
    /// state and never touch the store.
    pub(crate) fn watch(&self, callback: impl Fn(&ChangeEvent) + Send + Sync + 'static) -> Subscription {
        let id = self.inner.invalidations.on(callback);
        Subscription::new(&self.inner.invalidations, id)
    }

    pub(crate) fn operation_log(&self) -> &OperationLog {
        &self.inner.operation_log
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.inner.path)
            .field("subscribers", &self.inner.changes.len())
            .field("views", &self.inner.invalidations.len())
            .finish()
    }
}

impl StoreInner {
    fn open_reader(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_millis(self.config.busy_timeout_ms))?;
        conn.execute_batch("PRAGMA query_only=ON;")?;
        Ok(conn)
    }
}

fn open_writer(path: &Path, config: &StoreConfig) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         PRAGMA foreign_keys=ON;",
    )?;

    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        return Err(TodoeyError::StoreUnavailable(format!(
            "schema version {version} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    conn.execute_batch(include_str!("schema.sql"))?;

    for (table, column) in REQUIRED_COLUMNS {
        let present: bool = conn.query_row(
            "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
            [table, column],
            |row| row.get::<_, i64>(0).map(|count| count > 0),
        )?;
        if !present {
            return Err(TodoeyError::StoreUnavailable(format!(
                "Not a valid Todoey store: table '{table}' has no '{column}' column"
            )));
        }
    }

    if version < SCHEMA_VERSION {
        conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
    }
    Ok(conn)
}

fn unavailable(path: &Path, err: TodoeyError) -> TodoeyError {
    match err {
        TodoeyError::StoreUnavailable(_) => err,
        other => TodoeyError::StoreUnavailable(format!("{}: {other}", path.display())),
    }
}

fn rolled_back(err: TodoeyError) -> TodoeyError {
    log::warn!("Rolled back write transaction: {err}");
    err.into_write_failure()
}
