//! Error taxonomy for the auth persistence layer.
//!
//! Absent records are not errors: read operations return `Ok(None)` on a
//! miss. Errors are reserved for constraint violations, undecodable
//! persisted data, unsupported operations and backend failures.

/// Errors that can occur during auth storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend does not implement this operation.
    #[error("Operation not implemented by this storage backend: {operation}")]
    NotImplemented {
        /// Name of the unimplemented operation.
        operation: String,
    },

    /// A uniqueness or existence constraint was violated.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflicting state.
        message: String,
    },

    /// The caller-supplied input was rejected.
    #[error("Validation failed: {message}")]
    Validation {
        /// Description of why the input is invalid.
        message: String,
    },

    /// A persisted record could not be decoded.
    #[error("Corrupt record at {key}: {message}")]
    CorruptData {
        /// Row key of the undecodable record.
        key: String,
        /// Description of the decode failure.
        message: String,
    },

    /// The storage backend failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the backend failure.
        message: String,
    },
}

impl StoreError {
    /// Creates a new `NotImplemented` error.
    #[must_use]
    pub fn not_implemented(operation: impl Into<String>) -> Self {
        Self::NotImplemented {
            operation: operation.into(),
        }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new `CorruptData` error.
    #[must_use]
    pub fn corrupt_data(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptData {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not implemented error.
    #[must_use]
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented { .. })
    }

    /// Returns `true` if this is a conflict error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns `true` if this is a validation error.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns `true` if this is a corrupt data error.
    #[must_use]
    pub fn is_corrupt_data(&self) -> bool {
        matches!(self, Self::CorruptData { .. })
    }
}

/// Convenience result alias for auth storage operations.
pub type StoreResult<T> = Result<T, StoreError>;
