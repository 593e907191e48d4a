//! Error taxonomy of the review engine.

use prm_state::StorageError;

use crate::obs;

/// Why an operation is illegal in the current lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateViolation {
    /// Reassignment was requested on a merged pull request.
    PullRequestMerged,
    /// The reviewer set kept changing underneath a reassignment.
    ConcurrentModification,
}

impl std::fmt::Display for StateViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateViolation::PullRequestMerged => f.write_str("pull request is merged"),
            StateViolation::ConcurrentModification => {
                f.write_str("pull request was modified concurrently")
            }
        }
    }
}

/// Errors produced by the review engine.
///
/// `StoreFailure` carries no backend detail. The backend message is logged
/// where the failure is translated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReviewError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: &'static str, key: String },

    #[error("invalid state: {0}")]
    InvalidState(StateViolation),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal storage failure")]
    StoreFailure,

    #[error("operation cancelled")]
    Cancelled,
}

impl ReviewError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        ReviewError::NotFound {
            entity,
            key: key.into(),
        }
    }

    pub fn already_exists(entity: &'static str, key: impl Into<String>) -> Self {
        ReviewError::AlreadyExists {
            entity,
            key: key.into(),
        }
    }
}

/// Translate a store error at the engine boundary.
///
/// `Conflict` only reaches here when a caller has no retry path for it, so it
/// is reported as a concurrent modification.
impl From<StorageError> for ReviewError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, key } => ReviewError::NotFound { entity, key },
            StorageError::AlreadyExists { entity, key } => {
                ReviewError::AlreadyExists { entity, key }
            }
            StorageError::Conflict { .. } => {
                ReviewError::InvalidState(StateViolation::ConcurrentModification)
            }
            StorageError::Backend(message) => {
                obs::emit_store_failure(&message);
                ReviewError::StoreFailure
            }
        }
    }
}

/// Result type for engine operations.
pub type ReviewResult<T> = std::result::Result<T, ReviewError>;
