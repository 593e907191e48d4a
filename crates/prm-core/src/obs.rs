//! Structured observability hooks for review lifecycle events.
//!
//! Emission functions for lifecycle events. Request scoping comes from
//! [`crate::RequestContext::span`], which every event inherits.
//!
//! Events are emitted at `info!` level (filter with `RUST_LOG`). Store
//! failures are emitted at `error!` with the backend message, which callers
//! never see.

use tracing::info;

/// Emit event: pull request opened with its reviewer count.
///
/// # Example
///
/// ```ignore
/// emit_pr_created("PR1", "u1", 2);
/// // logs: event=pr.created pull_request_id=PR1 author_id=u1 reviewers=2
/// ```
pub fn emit_pr_created(pull_request_id: &str, author_id: &str, reviewers: usize) {
    info!(
        event = "pr.created",
        pull_request_id = %pull_request_id,
        author_id = %author_id,
        reviewers = reviewers,
    );
}

/// Emit event: merge completed. `idempotent` is true when the PR was already merged.
pub fn emit_pr_merged(pull_request_id: &str, idempotent: bool) {
    info!(event = "pr.merged", pull_request_id = %pull_request_id, idempotent = idempotent);
}

/// Emit event: reassignment finished with the given outcome kind.
pub fn emit_reviewer_reassigned(
    pull_request_id: &str,
    old_reviewer_id: &str,
    outcome: &str,
    attempts: u32,
) {
    info!(
        event = "pr.reviewer_reassigned",
        pull_request_id = %pull_request_id,
        old_reviewer_id = %old_reviewer_id,
        outcome = %outcome,
        attempts = attempts,
    );
}

pub fn emit_team_created(team_name: &str, members: usize) {
    info!(event = "team.created", team_name = %team_name, members = members);
}

pub fn emit_user_activity_changed(user_id: &str, is_active: bool) {
    info!(event = "user.activity_changed", user_id = %user_id, is_active = is_active);
}

/// Emit event: a reassignment lost a race and will be recomputed (warning level).
pub fn emit_reassign_conflict(pull_request_id: &str, attempt: u32) {
    tracing::warn!(
        event = "pr.reassign_conflict",
        pull_request_id = %pull_request_id,
        attempt = attempt,
    );
}

/// Emit event: backend failure translated to an opaque engine error.
pub fn emit_store_failure(error: &dyn std::fmt::Display) {
    tracing::error!(event = "store.failure", error = %error);
}
