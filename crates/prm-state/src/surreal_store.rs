//! SurrealDB-backed ReviewStore implementation
//!
//! Uses the rows in `schema` for persistence, converting to/from
//! `storage_traits` types at the boundary. Multi-record writes run inside a
//! single `BEGIN TRANSACTION ... COMMIT TRANSACTION` query; compare-and-set
//! updates are single conditional `UPDATE` statements.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use surrealdb::engine::any::Any;
use surrealdb::sql::Datetime as SurrealDatetime;
use surrealdb::{Response, Surreal};
use tracing::{debug, info, instrument, warn};

use crate::error::{StateError, StorageError};
use crate::handle::StoreConfig;
use crate::schema::{id_strings, PullRequestRecord, TeamRecord, UserRecord};
use crate::storage_traits::*;

const UNIQUE_VIOLATION: &str = "already contains";
const FAILED_TRANSACTION: &str = "failed transaction";
/// Phrases the engines use when an optimistic commit loses to another writer.
const WRITE_CONFLICT: [&str; 3] = ["can be retried", "write conflict", "transaction conflict"];

/// Whether `err` is a commit rejected because a concurrent transaction won.
fn is_write_conflict(err: &StorageError) -> bool {
    match err {
        StorageError::Backend(message) => {
            let message = message.to_lowercase();
            WRITE_CONFLICT.iter().any(|marker| message.contains(marker))
        }
        _ => false,
    }
}

/// SurrealDB-backed implementation of [`ReviewStore`].
#[derive(Clone)]
pub struct SurrealReviewStore {
    db: Surreal<Any>,
}

impl SurrealReviewStore {
    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> Result<Self, StateError> {
        Self::connect(&StoreConfig::Memory).await
    }

    /// Connect using an explicit configuration.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StateError> {
        let db = config.connect().await?;
        info!("SurrealReviewStore ready");
        Ok(Self { db })
    }

    /// Connect using [`StoreConfig::from_env`].
    pub async fn from_env() -> Result<Self, StateError> {
        Self::connect(&StoreConfig::from_env()).await
    }

    // -- private helpers -----------------------------------------------------

    async fn select_one<T>(
        &self,
        sql: &'static str,
        key: &'static str,
        value: String,
    ) -> StorageResult<Option<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut res = self.db.query(sql).bind((key, value)).await?;
        let rows: Vec<T> = res.take(0)?;
        Ok(rows.into_iter().next())
    }

    async fn members(&self, team_id: String) -> StorageResult<Vec<User>> {
        let mut res = self
            .db
            .query("SELECT * FROM users WHERE team_id = $tid ORDER BY position ASC")
            .bind(("tid", team_id))
            .await?;
        let rows: Vec<UserRecord> = res.take(0)?;
        rows.into_iter().map(UserRecord::into_user).collect()
    }

    async fn team_with_members(&self, row: TeamRecord) -> StorageResult<Team> {
        let team_id = row.team_id()?;
        let members = self.members(row.team_id).await?;
        Ok(Team {
            team_id,
            team_name: row.team_name,
            members,
        })
    }

    async fn fetch_pull_request(
        &self,
        pr_id: PullRequestId,
    ) -> StorageResult<Option<PullRequest>> {
        self.select_one::<PullRequestRecord>(
            "SELECT * FROM pull_requests WHERE pull_request_id = $pid LIMIT 1",
            "pid",
            pr_id.to_string(),
        )
        .await?
        .map(PullRequestRecord::into_pull_request)
        .transpose()
    }

    async fn swap_reviewers(
        &self,
        pr_id: PullRequestId,
        expected: &[UserId],
        next: &[UserId],
    ) -> StorageResult<Vec<PullRequestRecord>> {
        let mut res = self
            .db
            .query(
                "UPDATE pull_requests SET reviewers = $next
                     WHERE pull_request_id = $pid AND status = 'OPEN' AND reviewers = $expected
                     RETURN AFTER",
            )
            .bind(("next", id_strings(next)))
            .bind(("pid", pr_id.to_string()))
            .bind(("expected", id_strings(expected)))
            .await?;
        Ok(res.take(0)?)
    }

    /// Map the first real statement error of a response, if any.
    ///
    /// Statements rolled back alongside a failing one report a generic
    /// "failed transaction" error; the statement that actually failed wins.
    fn checked(
        mut response: Response,
        entity: &'static str,
        key: &str,
    ) -> StorageResult<Response> {
        let mut errors: Vec<(usize, surrealdb::Error)> =
            response.take_errors().into_iter().collect();
        if errors.is_empty() {
            return Ok(response);
        }
        errors.sort_by_key(|(index, _)| *index);
        let message = errors
            .iter()
            .map(|(_, e)| e.to_string())
            .find(|m| !m.contains(FAILED_TRANSACTION))
            .unwrap_or_else(|| errors[0].1.to_string());
        Err(Self::classify(&message, entity, key))
    }

    fn classify(message: &str, entity: &'static str, key: &str) -> StorageError {
        if !message.contains(UNIQUE_VIOLATION) {
            return StorageError::Backend(message.to_string());
        }
        let entity = if message.contains("idx_user_") {
            "user"
        } else if message.contains("idx_team_") {
            "team"
        } else if message.contains("idx_pr_") {
            "pull request"
        } else {
            entity
        };
        StorageError::AlreadyExists {
            entity,
            key: key.to_string(),
        }
    }
}

#[async_trait]
impl ReviewStore for SurrealReviewStore {
    #[instrument(skip(self))]
    async fn team_exists(&self, team_name: &str) -> StorageResult<bool> {
        let row: Option<TeamRecord> = self
            .select_one(
                "SELECT * FROM teams WHERE team_name = $name LIMIT 1",
                "name",
                team_name.to_string(),
            )
            .await?;
        Ok(row.is_some())
    }

    #[instrument(skip(self, team), fields(team_name = %team.team_name, members = team.members.len()))]
    async fn create_team(&self, team: NewTeam) -> StorageResult<Team> {
        for (i, member) in team.members.iter().enumerate() {
            if team.members[..i].iter().any(|m| m.system_id == member.system_id) {
                return Err(StorageError::AlreadyExists {
                    entity: "user",
                    key: member.system_id.clone(),
                });
            }
        }

        let system_ids: Vec<String> = team.members.iter().map(|m| m.system_id.clone()).collect();
        let mut res = self
            .db
            .query("SELECT * FROM users WHERE system_id IN $ids LIMIT 1")
            .bind(("ids", system_ids))
            .await?;
        let taken: Vec<UserRecord> = res.take(0)?;
        if let Some(existing) = taken.into_iter().next() {
            return Err(StorageError::AlreadyExists {
                entity: "user",
                key: existing.system_id,
            });
        }

        let team_id = TeamId::new();
        let team_row = TeamRecord::new(team_id, team.team_name.clone());
        let members: Vec<User> = team
            .members
            .into_iter()
            .map(|m| User {
                user_id: UserId::new(),
                system_id: m.system_id,
                user_name: m.user_name,
                team_id,
                is_active: m.is_active,
            })
            .collect();
        let member_rows: Vec<UserRecord> = members
            .iter()
            .enumerate()
            .map(|(i, u)| UserRecord::from_user(u, i as u32))
            .collect();

        debug!("creating team");
        let response = self
            .db
            .query(
                "BEGIN TRANSACTION;
                 CREATE teams CONTENT $team;
                 FOR $member IN $members { CREATE users CONTENT $member; };
                 COMMIT TRANSACTION;",
            )
            .bind(("team", team_row))
            .bind(("members", member_rows))
            .await?;
        Self::checked(response, "team", &team.team_name)?;

        Ok(Team {
            team_id,
            team_name: team.team_name,
            members,
        })
    }

    #[instrument(skip(self))]
    async fn get_team_by_name(&self, team_name: &str) -> StorageResult<Option<Team>> {
        let row: Option<TeamRecord> = self
            .select_one(
                "SELECT * FROM teams WHERE team_name = $name LIMIT 1",
                "name",
                team_name.to_string(),
            )
            .await?;
        match row {
            Some(row) => self.team_with_members(row).await.map(Some),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn get_team_by_id(&self, team_id: TeamId) -> StorageResult<Option<Team>> {
        let row: Option<TeamRecord> = self
            .select_one(
                "SELECT * FROM teams WHERE team_id = $tid LIMIT 1",
                "tid",
                team_id.to_string(),
            )
            .await?;
        match row {
            Some(row) => self.team_with_members(row).await.map(Some),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn get_team_members(&self, team_id: TeamId) -> StorageResult<Vec<User>> {
        self.members(team_id.to_string()).await
    }

    #[instrument(skip(self))]
    async fn set_user_active(
        &self,
        system_id: &str,
        is_active: bool,
    ) -> StorageResult<Option<User>> {
        let mut res = self
            .db
            .query("UPDATE users SET is_active = $active WHERE system_id = $sid RETURN AFTER")
            .bind(("active", is_active))
            .bind(("sid", system_id.to_string()))
            .await?;
        let rows: Vec<UserRecord> = res.take(0)?;
        rows.into_iter().next().map(UserRecord::into_user).transpose()
    }

    #[instrument(skip(self))]
    async fn get_user_by_system_id(&self, system_id: &str) -> StorageResult<Option<User>> {
        self.select_one::<UserRecord>(
            "SELECT * FROM users WHERE system_id = $sid LIMIT 1",
            "sid",
            system_id.to_string(),
        )
        .await?
        .map(UserRecord::into_user)
        .transpose()
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn get_users_by_ids(&self, ids: &[UserId]) -> StorageResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut res = self
            .db
            .query("SELECT * FROM users WHERE user_id IN $ids")
            .bind(("ids", id_strings(ids)))
            .await?;
        let rows: Vec<UserRecord> = res.take(0)?;
        let users = rows
            .into_iter()
            .map(UserRecord::into_user)
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(ids
            .iter()
            .filter_map(|id| users.iter().find(|u| u.user_id == *id).cloned())
            .collect())
    }

    #[instrument(skip(self))]
    async fn pull_request_exists(&self, system_id: &str) -> StorageResult<bool> {
        let row: Option<PullRequestRecord> = self
            .select_one(
                "SELECT * FROM pull_requests WHERE system_id = $sid LIMIT 1",
                "sid",
                system_id.to_string(),
            )
            .await?;
        Ok(row.is_some())
    }

    #[instrument(skip(self, pr, reviewers), fields(pr = %pr.system_id, reviewers = reviewers.len()))]
    async fn create_pull_request_with_reviewers(
        &self,
        pr: NewPullRequest,
        reviewers: &[UserId],
    ) -> StorageResult<PullRequest> {
        let author: Option<UserRecord> = self
            .select_one(
                "SELECT * FROM users WHERE user_id = $uid LIMIT 1",
                "uid",
                pr.author_id.to_string(),
            )
            .await?;
        if author.is_none() {
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

        // Reviewers are stored inline, so one CREATE covers the whole unit.
        let response = self
            .db
            .query("CREATE pull_requests CONTENT $row")
            .bind(("row", PullRequestRecord::from_pull_request(&record)))
            .await?;
        Self::checked(response, "pull request", &record.system_id)?;

        Ok(record)
    }

    #[instrument(skip(self))]
    async fn get_pull_request_by_system_id(
        &self,
        system_id: &str,
    ) -> StorageResult<Option<PullRequest>> {
        self.select_one::<PullRequestRecord>(
            "SELECT * FROM pull_requests WHERE system_id = $sid LIMIT 1",
            "sid",
            system_id.to_string(),
        )
        .await?
        .map(PullRequestRecord::into_pull_request)
        .transpose()
    }

    #[instrument(skip(self))]
    async fn set_merged(
        &self,
        pr_id: PullRequestId,
        now: DateTime<Utc>,
    ) -> StorageResult<DateTime<Utc>> {
        // The guarded UPDATE is the compare-and-set: only an OPEN row is written.
        let written = self
            .db
            .query(
                "UPDATE pull_requests SET status = 'MERGED', merged_at = $now
                     WHERE pull_request_id = $pid AND status = 'OPEN'",
            )
            .bind(("now", SurrealDatetime::from(now)))
            .bind(("pid", pr_id.to_string()))
            .await
            .map_err(StorageError::from)
            .and_then(|response| Self::checked(response, "pull request", &pr_id.to_string()));
        match written {
            Ok(_) => {}
            // A concurrent merge committed first; its merged_at is the answer.
            Err(err) if is_write_conflict(&err) => {
                debug!(pr = %pr_id, "merge lost a write conflict, reading persisted state");
            }
            Err(err) => return Err(err),
        }

        let pr = self
            .fetch_pull_request(pr_id)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                entity: "pull request",
                key: pr_id.to_string(),
            })?;

        match pr.merged_at {
            Some(merged_at) => Ok(merged_at),
            // Lost a conflict to a writer that left the row open.
            None if pr.status == PullRequestStatus::Open => Err(StorageError::Conflict {
                entity: "pull request",
                key: pr.system_id,
            }),
            None => {
                warn!(pr = %pr.system_id, "merged pull request has no merged_at");
                Err(StorageError::Backend(format!(
                    "pull request {} missing merged_at",
                    pr.system_id
                )))
            }
        }
    }

    #[instrument(skip(self, expected))]
    async fn replace_reviewer(
        &self,
        pr_id: PullRequestId,
        expected: &[UserId],
        old: UserId,
        new: Option<UserId>,
    ) -> StorageResult<PullRequest> {
        let next = swap_reviewer(expected, old, new);

        let rows = match self.swap_reviewers(pr_id, expected, &next).await {
            Ok(rows) => rows,
            // The other writer committed; classify below like any lost race.
            Err(err) if is_write_conflict(&err) => Vec::new(),
            Err(err) => return Err(err),
        };

        if let Some(row) = rows.into_iter().next() {
            return row.into_pull_request();
        }

        // Nothing written: tell a missing row apart from a lost race.
        match self.fetch_pull_request(pr_id).await? {
            Some(current) => Err(StorageError::Conflict {
                entity: "pull request",
                key: current.system_id,
            }),
            None => Err(StorageError::NotFound {
                entity: "pull request",
                key: pr_id.to_string(),
            }),
        }
    }

    #[instrument(skip(self))]
    async fn get_reviews_for_user(&self, user_id: UserId) -> StorageResult<Vec<PullRequest>> {
        let mut res = self
            .db
            .query(
                "SELECT * FROM pull_requests WHERE reviewers CONTAINS $uid ORDER BY created_at ASC",
            )
            .bind(("uid", user_id.to_string()))
            .await?;
        let rows: Vec<PullRequestRecord> = res.take(0)?;
        rows.into_iter()
            .map(PullRequestRecord::into_pull_request)
            .collect()
    }
}
