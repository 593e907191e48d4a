//! Result shapes returned by the engine. External ids only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use prm_state::PullRequestStatus;

/// A pull request with its reviewers resolved to external ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestResult {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PullRequestStatus,
    pub assigned_reviewers: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
}

/// Compact row used in review listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestSummary {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: PullRequestStatus,
}

/// What a reassignment did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReassignOutcome {
    Replaced {
        old_reviewer_id: String,
        new_reviewer_id: String,
    },
    /// No eligible teammate was left; the reviewer was removed.
    Dropped { old_reviewer_id: String },
    /// The named user was not a reviewer; nothing changed.
    NotAssigned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassignResult {
    pub pr: PullRequestResult,
    pub outcome: ReassignOutcome,
}

impl ReassignResult {
    pub fn replaced_by(&self) -> Option<&str> {
        match &self.outcome {
            ReassignOutcome::Replaced {
                new_reviewer_id, ..
            } => Some(new_reviewer_id),
            _ => None,
        }
    }
}

/// Member entry of a team, as accepted by `add_team` and returned by `get_team`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamView {
    pub team_name: String,
    pub members: Vec<TeamMember>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub user_id: String,
    pub username: String,
    pub team_name: String,
    pub is_active: bool,
}

/// Open and merged pull requests a user currently reviews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReviews {
    pub user_id: String,
    pub pull_requests: Vec<PullRequestSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_result_omits_merged_at() {
        let result = PullRequestResult {
            pull_request_id: "PR1".into(),
            pull_request_name: "Add login".into(),
            author_id: "u1".into(),
            status: PullRequestStatus::Open,
            assigned_reviewers: vec!["u2".into()],
            created_at: Utc::now(),
            merged_at: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "OPEN");
        assert!(json.get("merged_at").is_none());
    }

    #[test]
    fn outcome_is_tagged() {
        let json = serde_json::to_value(ReassignOutcome::Dropped {
            old_reviewer_id: "u2".into(),
        })
        .unwrap();
        assert_eq!(json["kind"], "dropped");
        assert_eq!(json["old_reviewer_id"], "u2");

        let json = serde_json::to_value(ReassignOutcome::NotAssigned).unwrap();
        assert_eq!(json["kind"], "not_assigned");
    }
}
