use thiserror::Error;

use crate::BookId;

/// Errors that can occur when interacting with the bookstore store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The data a commit was planned against changed before it was applied.
    /// Nothing from the commit was written.
    #[error("Concurrency conflict: {reason}")]
    ConcurrencyConflict { reason: String },

    /// A referenced book does not exist.
    #[error("Book not found: {0}")]
    BookNotFound(BookId),

    /// A catalog write carried a value the books table does not accept.
    #[error("Invalid book: {0}")]
    InvalidBook(String),

    /// A commit was rejected before touching storage.
    #[error("Invalid commit: {0}")]
    InvalidCommit(String),

    /// A stored row could not be decoded into a domain value.
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub(crate) fn conflict(reason: impl Into<String>) -> Self {
        StoreError::ConcurrencyConflict {
            reason: reason.into(),
        }
    }

    /// Returns true if retrying the whole operation may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::ConcurrencyConflict { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
