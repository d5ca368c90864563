//! Store error type.

/// Failures of the usage store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite rejected a statement or could not be opened.
    #[error("database error: {0}")]
    Database(String),

    /// The database directory could not be prepared.
    #[error("IO error: {0}")]
    Io(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}
