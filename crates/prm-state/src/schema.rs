//! SurrealDB table definitions and row mappings
//!
//! Tables:
//! - teams: uniquely named teams
//! - users: team members, unique by `system_id`
//! - pull_requests: pull requests with their reviewer id list inline
//!
//! Reviewers live inside the pull request row so that a reviewer swap is a
//! single conditional `UPDATE`, which SurrealDB applies atomically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StateError, StorageError};
use crate::storage_traits::{
    PullRequest, PullRequestId, PullRequestStatus, StorageResult, TeamId, User, UserId,
};

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Module for serializing optional chrono DateTime to SurrealDB datetime format
mod surreal_datetime_opt {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => {
                let sd = SurrealDatetime::from(*d);
                serde::Serialize::serialize(&Some(sd), serializer)
            }
            None => serde::Serialize::serialize(&None::<SurrealDatetime>, serializer),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = Option::<SurrealDatetime>::deserialize(deserializer)?;
        Ok(sd.map(DateTime::from))
    }
}

pub(crate) fn parse_uuid(raw: &str, what: &str) -> StorageResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| StorageError::Backend(format!("invalid {what} '{raw}': {e}")))
}

/// Row in `teams`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub team_id: String,
    pub team_name: String,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
}

impl TeamRecord {
    pub fn new(team_id: TeamId, team_name: impl Into<String>) -> Self {
        Self {
            team_id: team_id.to_string(),
            team_name: team_name.into(),
            created_at: Utc::now(),
        }
    }

    pub fn team_id(&self) -> StorageResult<TeamId> {
        parse_uuid(&self.team_id, "team_id").map(TeamId)
    }
}

/// Row in `users`. `position` preserves member order within a team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    pub system_id: String,
    pub user_name: String,
    pub team_id: String,
    pub is_active: bool,
    pub position: u32,
}

impl UserRecord {
    pub fn from_user(user: &User, position: u32) -> Self {
        Self {
            user_id: user.user_id.to_string(),
            system_id: user.system_id.clone(),
            user_name: user.user_name.clone(),
            team_id: user.team_id.to_string(),
            is_active: user.is_active,
            position,
        }
    }

    pub fn into_user(self) -> StorageResult<User> {
        Ok(User {
            user_id: UserId(parse_uuid(&self.user_id, "user_id")?),
            system_id: self.system_id,
            user_name: self.user_name,
            team_id: TeamId(parse_uuid(&self.team_id, "team_id")?),
            is_active: self.is_active,
        })
    }
}

/// Row in `pull_requests`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub pull_request_id: String,
    pub system_id: String,
    pub name: String,
    pub author_id: String,
    /// "OPEN" | "MERGED"
    pub status: String,
    pub reviewers: Vec<String>,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "surreal_datetime_opt")]
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequestRecord {
    pub fn from_pull_request(pr: &PullRequest) -> Self {
        Self {
            pull_request_id: pr.pull_request_id.to_string(),
            system_id: pr.system_id.clone(),
            name: pr.name.clone(),
            author_id: pr.author_id.to_string(),
            status: pr.status.as_str().to_string(),
            reviewers: id_strings(&pr.reviewers),
            created_at: pr.created_at,
            merged_at: pr.merged_at,
        }
    }

    pub fn into_pull_request(self) -> StorageResult<PullRequest> {
        let status = PullRequestStatus::parse(&self.status).ok_or_else(|| {
            StorageError::Backend(format!("unknown pull request status: {}", self.status))
        })?;
        let reviewers = self
            .reviewers
            .iter()
            .map(|r| parse_uuid(r, "reviewer id").map(UserId))
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(PullRequest {
            pull_request_id: PullRequestId(parse_uuid(&self.pull_request_id, "pull_request_id")?),
            system_id: self.system_id,
            name: self.name,
            author_id: UserId(parse_uuid(&self.author_id, "author_id")?),
            status,
            reviewers,
            created_at: self.created_at,
            merged_at: self.merged_at,
        })
    }
}

pub(crate) fn id_strings(ids: &[UserId]) -> Vec<String> {
    ids.iter().map(ToString::to_string).collect()
}

/// Define tables and unique indexes.
///
/// Safe to call on every connection; `DEFINE ... IF NOT EXISTS` is idempotent.
pub async fn init_schema(db: &Surreal<Any>) -> Result<(), StateError> {
    debug!("Initializing PR Manager schema");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS teams SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_team_id ON TABLE teams COLUMNS team_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_team_name ON TABLE teams COLUMNS team_name UNIQUE;

        DEFINE TABLE IF NOT EXISTS users SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_user_id ON TABLE users COLUMNS user_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_user_system_id ON TABLE users COLUMNS system_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_user_team ON TABLE users COLUMNS team_id, position;

        DEFINE TABLE IF NOT EXISTS pull_requests SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_pr_id ON TABLE pull_requests COLUMNS pull_request_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_pr_system_id ON TABLE pull_requests COLUMNS system_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_pr_created_at ON TABLE pull_requests COLUMNS created_at;
    "#;

    db.query(sql)
        .await
        .map_err(|e| StateError::SchemaSetup(e.to_string()))?
        .check()
        .map_err(|e| StateError::SchemaSetup(e.to_string()))?;

    info!("PR Manager schema initialized");
    Ok(())
}
