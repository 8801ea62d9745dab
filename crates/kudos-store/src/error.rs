//! Error types for kudos storage.

use kudos_core::RewardsError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of record.
        entity: &'static str,
        /// The record id.
        id: String,
    },

    /// A write-once record already exists.
    #[error("duplicate {entity}: {id}")]
    Duplicate {
        /// The kind of record.
        entity: &'static str,
        /// The record id.
        id: String,
    },

    /// A lock on the resource could not be acquired in time.
    #[error("lock conflict on {resource}")]
    Conflict {
        /// The contended resource.
        resource: String,
    },
}

impl From<StoreError> for RewardsError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(msg) => Self::Storage(msg),
            StoreError::Serialization(msg) => Self::Serialization(msg),
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::Duplicate { entity, id } => Self::AlreadyExists { entity, id },
            StoreError::Conflict { resource } => Self::Conflict { resource },
        }
    }
}
