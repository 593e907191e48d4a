//! Observability tests for review lifecycle tracing.
//!
//! Verify that structured events are emitted for PR creation, merge,
//! reassignment, team creation, activity changes and store failures.

use std::sync::Arc;

use prm_core::{
    emit_pr_created, emit_pr_merged, emit_reviewer_reassigned, emit_store_failure,
    emit_team_created, emit_user_activity_changed, MemoryReviewStore, RequestContext,
    ReviewEngine, TeamMember, TeamView,
};
use tracing::Instrument;
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_pr_created_logs_reviewer_count() {
    emit_pr_created("PR1", "u1", 2);
    assert!(logs_contain("pr.created"));
    assert!(logs_contain("reviewers=2"));
}

#[traced_test]
#[test]
fn test_emit_pr_merged_logs_idempotent_flag() {
    emit_pr_merged("PR1", true);
    assert!(logs_contain("pr.merged"));
    assert!(logs_contain("idempotent=true"));
}

#[traced_test]
#[test]
fn test_emit_reviewer_reassigned_logs_outcome() {
    emit_reviewer_reassigned("PR1", "u2", "dropped", 1);
    assert!(logs_contain("pr.reviewer_reassigned"));
    assert!(logs_contain("dropped"));
}

#[traced_test]
#[test]
fn test_emit_team_and_user_events() {
    emit_team_created("backend", 3);
    emit_user_activity_changed("u3", false);
    assert!(logs_contain("team.created"));
    assert!(logs_contain("user.activity_changed"));
}

#[traced_test]
#[test]
fn test_emit_store_failure_logs_error() {
    emit_store_failure(&"connection refused");
    assert!(logs_contain("store.failure"));
    assert!(logs_contain("connection refused"));
}

#[traced_test]
#[test]
fn test_request_span_tags_events() {
    let ctx = RequestContext::new().with_request_id("req-span-1");
    let entered = ctx.span().entered();
    emit_pr_merged("PR7", false);
    drop(entered);
    assert!(logs_contain("req-span-1"));
}

#[traced_test]
#[tokio::test]
async fn test_engine_operations_emit_lifecycle_events() {
    let engine = ReviewEngine::new(Arc::new(MemoryReviewStore::new()));
    let ctx = RequestContext::new().with_request_id("req-obs-1");

    async {
        engine
            .add_team(
                &ctx,
                TeamView {
                    team_name: "backend".into(),
                    members: vec![
                        TeamMember {
                            user_id: "u1".into(),
                            username: "Alice".into(),
                            is_active: true,
                        },
                        TeamMember {
                            user_id: "u2".into(),
                            username: "Bob".into(),
                            is_active: true,
                        },
                    ],
                },
            )
            .await
            .unwrap();
        engine
            .create_pull_request(&ctx, "u1", "PR1", "Add search")
            .await
            .unwrap();
        engine.merge_pull_request(&ctx, "PR1").await.unwrap();
    }
    .instrument(ctx.span())
    .await;

    assert!(logs_contain("team.created"));
    assert!(logs_contain("pr.created"));
    assert!(logs_contain("pr.merged"));
    assert!(logs_contain("req-obs-1"));
}
