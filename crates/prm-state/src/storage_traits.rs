//! Storage trait definitions for PR Manager
//!
//! `ReviewStore` is the single persistence seam used by the review engine.
//! It holds three kinds of record:
//! - `Team`: a uniquely named group owning its `User`s
//! - `User`: a team member with an externally visible `system_id`
//! - `PullRequest`: an authored unit of review holding weak (by id)
//!   references to its author and reviewers
//!
//! Every trait method is atomic with respect to the others: a caller never
//! observes half of a team creation or half of a reviewer swap. In-memory
//! and SurrealDB implementations live in `fakes` and `surreal_store`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier
            pub fn new() -> Self {
                $name(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Internal identity of a team
    TeamId
);
uuid_id!(
    /// Internal identity of a user (distinct from its external `system_id`)
    UserId
);
uuid_id!(
    /// Internal identity of a pull request
    PullRequestId
);

// ---------------------------------------------------------------------------
// Teams & users
// ---------------------------------------------------------------------------

/// A team member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    /// Stable external key, unique across all users
    pub system_id: String,
    pub user_name: String,
    pub team_id: TeamId,
    /// Only active users are eligible as reviewers
    pub is_active: bool,
}

/// A named group of users. `members` keeps creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub team_id: TeamId,
    pub team_name: String,
    pub members: Vec<User>,
}

/// A member to be created together with its team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub system_id: String,
    pub user_name: String,
    pub is_active: bool,
}

/// A team to be created atomically with all of its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTeam {
    pub team_name: String,
    pub members: Vec<NewUser>,
}

// ---------------------------------------------------------------------------
// Pull requests
// ---------------------------------------------------------------------------

/// Lifecycle status. `Open --merge--> Merged`; `Merged` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PullRequestStatus {
    Open,
    Merged,
}

impl PullRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PullRequestStatus::Open => "OPEN",
            PullRequestStatus::Merged => "MERGED",
        }
    }

    /// Parse the persisted form. Returns `None` for unknown values.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(PullRequestStatus::Open),
            "MERGED" => Some(PullRequestStatus::Merged),
            _ => None,
        }
    }
}

impl std::fmt::Display for PullRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full pull request record.
///
/// Invariants upheld by every store:
/// - `merged_at.is_some()` iff `status == Merged`
/// - `reviewers` holds 0..=2 distinct ids, never `author_id`
/// - once merged, `reviewers` and `name` never change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub pull_request_id: PullRequestId,
    /// Stable external key, unique across all pull requests
    pub system_id: String,
    pub name: String,
    pub author_id: UserId,
    pub status: PullRequestStatus,
    pub reviewers: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    pub fn is_merged(&self) -> bool {
        self.status == PullRequestStatus::Merged
    }

    pub fn has_reviewer(&self, user_id: UserId) -> bool {
        self.reviewers.contains(&user_id)
    }
}

/// A pull request to be created together with its reviewers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub system_id: String,
    pub name: String,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ReviewStore
// ---------------------------------------------------------------------------

/// Transactional store consumed by the review engine.
///
/// Conventions:
/// - Lookups return `Ok(None)` when the record is absent.
/// - Mutations on absent records return `StorageError::NotFound`.
/// - Unique key collisions return `StorageError::AlreadyExists`.
/// - Compare-and-set mutations whose precondition fails return
///   `StorageError::Conflict` and write nothing.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Whether a team with this name exists.
    async fn team_exists(&self, team_name: &str) -> StorageResult<bool>;

    /// Create a team and all of its members as one unit.
    async fn create_team(&self, team: NewTeam) -> StorageResult<Team>;

    /// Look up a team (with members) by its unique name.
    async fn get_team_by_name(&self, team_name: &str) -> StorageResult<Option<Team>>;

    /// Look up a team (with members) by id.
    async fn get_team_by_id(&self, team_id: TeamId) -> StorageResult<Option<Team>>;

    /// All members of a team, in creation order.
    async fn get_team_members(&self, team_id: TeamId) -> StorageResult<Vec<User>>;

    /// Toggle a user's activity flag, returning the updated user.
    async fn set_user_active(&self, system_id: &str, is_active: bool)
        -> StorageResult<Option<User>>;

    /// Look up a user by external id.
    async fn get_user_by_system_id(&self, system_id: &str) -> StorageResult<Option<User>>;

    /// Resolve a batch of internal ids. Unknown ids are skipped; order follows `ids`.
    async fn get_users_by_ids(&self, ids: &[UserId]) -> StorageResult<Vec<User>>;

    /// Whether a pull request with this external id exists.
    async fn pull_request_exists(&self, system_id: &str) -> StorageResult<bool>;

    /// Create an OPEN pull request with its reviewers in one unit.
    async fn create_pull_request_with_reviewers(
        &self,
        pr: NewPullRequest,
        reviewers: &[UserId],
    ) -> StorageResult<PullRequest>;

    /// Look up a pull request by external id.
    async fn get_pull_request_by_system_id(
        &self,
        system_id: &str,
    ) -> StorageResult<Option<PullRequest>>;

    /// Transition OPEN -> MERGED stamping `merged_at = now`.
    ///
    /// Only the first caller writes; every caller gets back the persisted
    /// `merged_at`, so concurrent merges converge on one value. A backend
    /// that rejects the write for a concurrent non-merge update returns
    /// `StorageError::Conflict` and leaves the row open.
    async fn set_merged(
        &self,
        pr_id: PullRequestId,
        now: DateTime<Utc>,
    ) -> StorageResult<DateTime<Utc>>;

    /// Swap `old` for `new` (or drop `old` when `new` is `None`).
    ///
    /// Applies only if the pull request is still OPEN and its reviewer list
    /// still equals `expected`; otherwise returns `StorageError::Conflict`.
    async fn replace_reviewer(
        &self,
        pr_id: PullRequestId,
        expected: &[UserId],
        old: UserId,
        new: Option<UserId>,
    ) -> StorageResult<PullRequest>;

    /// Pull requests on which `user_id` is a current reviewer, oldest first.
    async fn get_reviews_for_user(&self, user_id: UserId) -> StorageResult<Vec<PullRequest>>;
}

/// Reviewer list after swapping `old` for `new` in place.
///
/// Keeps the position of the replaced reviewer so the visible order of the
/// remaining reviewer is stable.
pub fn swap_reviewer(reviewers: &[UserId], old: UserId, new: Option<UserId>) -> Vec<UserId> {
    reviewers
        .iter()
        .filter_map(|r| if *r == old { new } else { Some(*r) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_persisted_form() {
        for status in [PullRequestStatus::Open, PullRequestStatus::Merged] {
            assert_eq!(PullRequestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PullRequestStatus::parse("CLOSED"), None);
    }

    #[test]
    fn status_serializes_screaming_case() {
        let json = serde_json::to_string(&PullRequestStatus::Merged).unwrap();
        assert_eq!(json, "\"MERGED\"");
    }

    #[test]
    fn swap_reviewer_keeps_position() {
        let (a, b, c) = (UserId::new(), UserId::new(), UserId::new());
        assert_eq!(swap_reviewer(&[a, b], a, Some(c)), vec![c, b]);
        assert_eq!(swap_reviewer(&[a, b], b, None), vec![a]);
        assert_eq!(swap_reviewer(&[a], b, Some(c)), vec![a]);
    }
}
