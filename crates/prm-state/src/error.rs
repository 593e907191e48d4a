//! Error types for prm-state

use thiserror::Error;

/// Errors raised while connecting to or preparing the backing database
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),

    /// Local persistence directory could not be prepared
    #[error("Storage path unavailable: {0}")]
    StoragePath(String),
}

/// Errors returned by [`crate::ReviewStore`] operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// A mutation referenced a record that does not exist
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// A unique key collided with an existing record
    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: &'static str, key: String },

    /// A compare-and-set precondition no longer held
    #[error("concurrent modification of {entity} {key}")]
    Conflict { entity: &'static str, key: String },

    /// Backend failure (query, transport, decoding)
    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}
