//! Error types for the SQLite storage backend.

use skylark_auth::StoreError;

/// Errors specific to the SQLite storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::error::Error),

    /// Failed to encode a payload for storage.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored payload could not be decoded.
    #[error("Corrupt record at {key}: {message}")]
    CorruptData {
        /// Row key of the undecodable record.
        key: String,
        /// Description of the decode failure.
        message: String,
    },

    /// Failed to encode a timestamp for storage.
    #[error("Datetime encoding error: {0}")]
    DatetimeEncoding(#[from] time::error::Format),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(String),
}

impl StorageError {
    /// Creates a new `CorruptData` error.
    #[must_use]
    pub fn corrupt_data(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptData {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Database(e) => StoreError::storage(e.to_string()),
            StorageError::Serialization(e) => {
                StoreError::storage(format!("Serialization error: {e}"))
            }
            StorageError::CorruptData { key, message } => StoreError::corrupt_data(key, message),
            StorageError::DatetimeEncoding(e) => {
                StoreError::storage(format!("Datetime encoding error: {e}"))
            }
            StorageError::Migration(e) => StoreError::storage(format!("Migration error: {e}")),
        }
    }
}

/// Result type alias for SQLite backend operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::corrupt_data("token:t1", "invalid JSON");
        assert_eq!(err.to_string(), "Corrupt record at token:t1: invalid JSON");

        let err = StorageError::Migration("checksum mismatch".to_string());
        assert!(err.to_string().contains("Migration error"));
    }

    #[test]
    fn test_conversion_to_store_error() {
        let err: StoreError = StorageError::corrupt_data("device:d1", "truncated").into();
        assert!(err.is_corrupt_data());

        let err: StoreError = StorageError::Migration("failed".to_string()).into();
        assert!(matches!(err, StoreError::Storage { .. }));
    }
}
