//! In-memory implementation of [`ReviewStore`]
//!
//! `MemoryReviewStore` keeps every table behind one `Mutex`. Each trait
//! method runs as a single critical section without suspending, which gives
//! per-operation atomicity: a dropped (cancelled) call either happened in
//! full or not at all.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::storage_traits::*;

#[derive(Debug, Clone)]
struct TeamRow {
    team_id: TeamId,
    team_name: String,
}

#[derive(Debug, Default)]
struct Tables {
    teams: Vec<TeamRow>,
    users: Vec<User>,
    pull_requests: Vec<PullRequest>,
}

impl Tables {
    fn members_of(&self, team_id: TeamId) -> Vec<User> {
        self.users
            .iter()
            .filter(|u| u.team_id == team_id)
            .cloned()
            .collect()
    }

    fn team(&self, row: &TeamRow) -> Team {
        Team {
            team_id: row.team_id,
            team_name: row.team_name.clone(),
            members: self.members_of(row.team_id),
        }
    }

    fn pull_request_mut(&mut self, pr_id: PullRequestId) -> StorageResult<&mut PullRequest> {
        self.pull_requests
            .iter_mut()
            .find(|p| p.pull_request_id == pr_id)
            .ok_or_else(|| StorageError::NotFound {
                entity: "pull request",
                key: pr_id.to_string(),
            })
    }
}

/// In-memory review store backed by insertion-ordered vectors.
#[derive(Debug, Default)]
pub struct MemoryReviewStore {
    tables: Mutex<Tables>,
}

impl MemoryReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> StorageResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl ReviewStore for MemoryReviewStore {
    async fn team_exists(&self, team_name: &str) -> StorageResult<bool> {
        let tables = self.tables()?;
        Ok(tables.teams.iter().any(|t| t.team_name == team_name))
    }

    async fn create_team(&self, team: NewTeam) -> StorageResult<Team> {
        let mut tables = self.tables()?;

        if tables.teams.iter().any(|t| t.team_name == team.team_name) {
            return Err(StorageError::AlreadyExists {
                entity: "team",
                key: team.team_name,
            });
        }
        // Validate every member before touching the tables.
        for (i, member) in team.members.iter().enumerate() {
            let taken = tables.users.iter().any(|u| u.system_id == member.system_id)
                || team.members[..i]
                    .iter()
                    .any(|m| m.system_id == member.system_id);
            if taken {
                return Err(StorageError::AlreadyExists {
                    entity: "user",
                    key: member.system_id.clone(),
                });
            }
        }

        let row = TeamRow {
            team_id: TeamId::new(),
            team_name: team.team_name,
        };
        tables.users.extend(team.members.into_iter().map(|m| User {
            user_id: UserId::new(),
            system_id: m.system_id,
            user_name: m.user_name,
            team_id: row.team_id,
            is_active: m.is_active,
        }));
        let created = tables.team(&row);
        tables.teams.push(row);
        Ok(created)
    }

    async fn get_team_by_name(&self, team_name: &str) -> StorageResult<Option<Team>> {
        let tables = self.tables()?;
        Ok(tables
            .teams
            .iter()
            .find(|t| t.team_name == team_name)
            .map(|row| tables.team(row)))
    }

    async fn get_team_by_id(&self, team_id: TeamId) -> StorageResult<Option<Team>> {
        let tables = self.tables()?;
        Ok(tables
            .teams
            .iter()
            .find(|t| t.team_id == team_id)
            .map(|row| tables.team(row)))
    }

    async fn get_team_members(&self, team_id: TeamId) -> StorageResult<Vec<User>> {
        let tables = self.tables()?;
        Ok(tables.members_of(team_id))
    }

    async fn set_user_active(
        &self,
        system_id: &str,
        is_active: bool,
    ) -> StorageResult<Option<User>> {
        let mut tables = self.tables()?;
        Ok(tables
            .users
            .iter_mut()
            .find(|u| u.system_id == system_id)
            .map(|u| {
                u.is_active = is_active;
                u.clone()
            }))
    }

    async fn get_user_by_system_id(&self, system_id: &str) -> StorageResult<Option<User>> {
        let tables = self.tables()?;
        Ok(tables
            .users
            .iter()
            .find(|u| u.system_id == system_id)
            .cloned())
    }

    async fn get_users_by_ids(&self, ids: &[UserId]) -> StorageResult<Vec<User>> {
        let tables = self.tables()?;
        Ok(ids
            .iter()
            .filter_map(|id| tables.users.iter().find(|u| u.user_id == *id).cloned())
            .collect())
    }

    async fn pull_request_exists(&self, system_id: &str) -> StorageResult<bool> {
        let tables = self.tables()?;
        Ok(tables.pull_requests.iter().any(|p| p.system_id == system_id))
    }

    async fn create_pull_request_with_reviewers(
        &self,
        pr: NewPullRequest,
        reviewers: &[UserId],
    ) -> StorageResult<PullRequest> {
        let mut tables = self.tables()?;

        if tables.pull_requests.iter().any(|p| p.system_id == pr.system_id) {
            return Err(StorageError::AlreadyExists {
                entity: "pull request",
                key: pr.system_id,
            });
        }
        if !tables.users.iter().any(|u| u.user_id == pr.author_id) {
            return Err(StorageError::NotFound {
                entity: "user",
                key: pr.author_id.to_string(),
            });
        }

        let record = PullRequest {
            pull_request_id: PullRequestId::new(),
            system_id: pr.system_id,
            name: pr.name,
            author_id: pr.author_id,
            status: PullRequestStatus::Open,
            reviewers: reviewers.to_vec(),
            created_at: pr.created_at,
            merged_at: None,
        };
        tables.pull_requests.push(record.clone());
        Ok(record)
    }

    async fn get_pull_request_by_system_id(
        &self,
        system_id: &str,
    ) -> StorageResult<Option<PullRequest>> {
        let tables = self.tables()?;
        Ok(tables
            .pull_requests
            .iter()
            .find(|p| p.system_id == system_id)
            .cloned())
    }

    async fn set_merged(
        &self,
        pr_id: PullRequestId,
        now: DateTime<Utc>,
    ) -> StorageResult<DateTime<Utc>> {
        let mut tables = self.tables()?;
        let pr = tables.pull_request_mut(pr_id)?;
        match pr.merged_at {
            Some(merged_at) => Ok(merged_at),
            None => {
                pr.status = PullRequestStatus::Merged;
                pr.merged_at = Some(now);
                Ok(now)
            }
        }
    }

    async fn replace_reviewer(
        &self,
        pr_id: PullRequestId,
        expected: &[UserId],
        old: UserId,
        new: Option<UserId>,
    ) -> StorageResult<PullRequest> {
        let mut tables = self.tables()?;
        let pr = tables.pull_request_mut(pr_id)?;
        if pr.is_merged() || pr.reviewers != expected {
            return Err(StorageError::Conflict {
                entity: "pull request",
                key: pr.system_id.clone(),
            });
        }
        pr.reviewers = swap_reviewer(&pr.reviewers, old, new);
        Ok(pr.clone())
    }

    async fn get_reviews_for_user(&self, user_id: UserId) -> StorageResult<Vec<PullRequest>> {
        let tables = self.tables()?;
        let mut reviews: Vec<PullRequest> = tables
            .pull_requests
            .iter()
            .filter(|p| p.has_reviewer(user_id))
            .cloned()
            .collect();
        // Stable: ties keep insertion order.
        reviews.sort_by_key(|p| p.created_at);
        Ok(reviews)
    }
}
