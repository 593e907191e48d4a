//! Integration tests for schema initialization and row mappings

use chrono::Utc;
use prm_state::schema::{PullRequestRecord, UserRecord};
use prm_state::{
    NewTeam, NewUser, PullRequest, PullRequestId, PullRequestStatus, ReviewStore, StoreConfig,
    SurrealReviewStore, TeamId, User, UserId,
};

#[test]
fn test_pull_request_record_round_trip() {
    let merged = Utc::now();
    let pr = PullRequest {
        pull_request_id: PullRequestId::new(),
        system_id: "PR-7".to_string(),
        name: "Add search".to_string(),
        author_id: UserId::new(),
        status: PullRequestStatus::Merged,
        reviewers: vec![UserId::new(), UserId::new()],
        created_at: merged,
        merged_at: Some(merged),
    };

    let record = PullRequestRecord::from_pull_request(&pr);
    assert_eq!(record.status, "MERGED");
    assert_eq!(record.reviewers.len(), 2);
    assert_eq!(record.into_pull_request().unwrap(), pr);
}

#[test]
fn test_pull_request_record_rejects_unknown_status() {
    let pr = PullRequest {
        pull_request_id: PullRequestId::new(),
        system_id: "PR-8".to_string(),
        name: "Broken".to_string(),
        author_id: UserId::new(),
        status: PullRequestStatus::Open,
        reviewers: vec![],
        created_at: Utc::now(),
        merged_at: None,
    };
    let mut record = PullRequestRecord::from_pull_request(&pr);
    record.status = "CLOSED".to_string();

    assert!(record.into_pull_request().is_err());
}

#[test]
fn test_user_record_keeps_position() {
    let user = User {
        user_id: UserId::new(),
        system_id: "u1".to_string(),
        user_name: "Alice".to_string(),
        team_id: TeamId::new(),
        is_active: true,
    };
    let record = UserRecord::from_user(&user, 3);
    assert_eq!(record.position, 3);
    assert_eq!(record.into_user().unwrap(), user);
}

#[tokio::test]
async fn test_schema_init_is_idempotent() {
    let config = StoreConfig::Memory;
    let db = config.connect().await.unwrap();
    prm_state::schema::init_schema(&db).await.unwrap();
    prm_state::schema::init_schema(&db).await.unwrap();
}

#[tokio::test]
async fn test_local_store_creates_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("db");
    let config = StoreConfig::Local(path.clone());

    let store = SurrealReviewStore::connect(&config).await.unwrap();
    assert!(path.exists());

    store
        .create_team(NewTeam {
            team_name: "payments".to_string(),
            members: vec![NewUser {
                system_id: "p1".to_string(),
                user_name: "Pat".to_string(),
                is_active: true,
            }],
        })
        .await
        .unwrap();

    let team = store.get_team_by_name("payments").await.unwrap().unwrap();
    assert_eq!(team.members.len(), 1);
    assert_eq!(team.members[0].system_id, "p1");
}
