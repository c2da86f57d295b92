//! Error types for the Todoey core library.

use thiserror::Error;

/// All errors that can occur within the Todoey core library.
#[derive(Debug, Error)]
pub enum TodoeyError {
    /// The backing store could not be created or opened.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Caller-supplied data violates a precondition (empty name, missing parent).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A category ID was requested that does not exist in the store.
    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    /// An item ID was requested that does not exist in the store.
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// A write transaction could not be committed and was rolled back.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// A result view was indexed past its current end.
    #[error("Index {index} out of range for result view of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A SQLite read failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// An I/O operation on the filesystem failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration or journal data could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias that pins the error type to [`TodoeyError`].
pub type Result<T> = std::result::Result<T, TodoeyError>;

impl TodoeyError {
    /// Returns `true` for both [`Self::CategoryNotFound`] and [`Self::ItemNotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::CategoryNotFound(_) | Self::ItemNotFound(_))
    }

    /// Returns a short, human-readable message suitable for display to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::StoreUnavailable(_) => "Could not open your lists".to_string(),
            Self::Validation(msg) => msg.clone(),
            Self::CategoryNotFound(_) => "Category no longer exists".to_string(),
            Self::ItemNotFound(_) => "Item no longer exists".to_string(),
            Self::TransactionFailed(e) => format!("Failed to save: {e}"),
            Self::IndexOutOfRange { .. } => "Item is no longer in this list".to_string(),
            Self::Database(e) => format!("Failed to load: {e}"),
            Self::Io(e) => format!("File error: {e}"),
            Self::Json(e) => format!("Data format error: {e}"),
        }
    }

    /// Folds a raw SQLite fault raised inside a write into [`Self::TransactionFailed`].
    ///
    /// Caller-level errors pass through untouched.
    pub(crate) fn into_write_failure(self) -> Self {
        match self {
            Self::Database(e) => Self::TransactionFailed(e.to_string()),
            Self::Io(e) => Self::TransactionFailed(e.to_string()),
            other => other,
        }
    }
}
