//! prm-state: persistence layer for PR Manager
//!
//! Holds teams, users and pull requests behind the [`ReviewStore`] trait.
//! The review engine only ever talks to this trait, so it is unaware of
//! whether records live in memory or in SurrealDB.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: atomic per-operation writes and compare-and-set transitions.
//!
//! ## Key Components
//!
//! - `ReviewStore`: the store contract consumed by the engine
//! - `MemoryReviewStore`: mutex-guarded in-memory implementation
//! - `SurrealReviewStore`: SurrealDB implementation (memory, file or remote)
//! - `StoreConfig`: connection selection from the environment

mod error;
pub mod fakes;
mod handle;
pub mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use error::{StateError, StorageError};
pub use fakes::MemoryReviewStore;
pub use handle::{
    RemoteConfig, StoreConfig, DEFAULT_DATABASE, DEFAULT_LOCAL_PATH, DEFAULT_NAMESPACE,
};
pub use storage_traits::{
    swap_reviewer, NewPullRequest, NewTeam, NewUser, PullRequest, PullRequestId,
    PullRequestStatus, ReviewStore, StorageResult, Team, TeamId, User, UserId,
};
pub use surreal_store::SurrealReviewStore;
