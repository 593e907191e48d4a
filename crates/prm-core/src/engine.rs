//! Review engine: pull request creation, merge and reviewer reassignment.
//!
//! The engine owns no state beyond its store handle. Every call resolves
//! entities fresh from the store, runs the policy on a request-local copy and
//! commits through one atomic store operation. Concurrent callers are
//! serialised by the store, never by in-process locks.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use tracing::{debug, instrument};

use prm_state::{NewPullRequest, PullRequest, ReviewStore, StorageError, User, UserId};

use crate::context::RequestContext;
use crate::dto::{PullRequestResult, PullRequestSummary, ReassignOutcome, ReassignResult};
use crate::error::{ReviewError, ReviewResult, StateViolation};
use crate::obs;
use crate::policy;

/// How often a reassignment is recomputed after losing a race.
pub const MAX_REASSIGN_ATTEMPTS: u32 = 3;

/// Orchestrates the assignment policy over a [`ReviewStore`].
///
/// Cheap to clone and safe to share between tasks.
pub struct ReviewEngine<S: ReviewStore + ?Sized> {
    pub(crate) store: Arc<S>,
}

impl<S: ReviewStore + ?Sized> Clone for ReviewEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ReviewStore + ?Sized> ReviewEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Open a pull request and assign up to two reviewers from the author's team.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if `pull_request_id` is taken, `NotFound` if the
    /// author is unknown.
    #[instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn create_pull_request(
        &self,
        ctx: &RequestContext,
        author_id: &str,
        pull_request_id: &str,
        pull_request_name: &str,
    ) -> ReviewResult<PullRequestResult> {
        if ctx
            .guard(self.store.pull_request_exists(pull_request_id))
            .await?
        {
            return Err(ReviewError::already_exists("pull request", pull_request_id));
        }

        let author = self.require_user(ctx, author_id).await?;
        let members = ctx.guard(self.store.get_team_members(author.team_id)).await?;

        let reviewers = policy::select_reviewers(&members, author.user_id, &mut rand::thread_rng());
        let reviewer_ids: Vec<UserId> = reviewers.iter().map(|u| u.user_id).collect();
        debug!(eligible = members.len(), chosen = reviewers.len(), "selected reviewers");

        let new_pr = NewPullRequest {
            system_id: pull_request_id.to_string(),
            name: pull_request_name.to_string(),
            author_id: author.user_id,
            created_at: Utc::now(),
        };
        let pr = ctx
            .guard(
                self.store
                    .create_pull_request_with_reviewers(new_pr, &reviewer_ids),
            )
            .await?;

        obs::emit_pr_created(&pr.system_id, &author.system_id, reviewers.len());

        let mut names: HashMap<UserId, String> = reviewers
            .into_iter()
            .map(|u| (u.user_id, u.system_id))
            .collect();
        names.insert(author.user_id, author.system_id);
        Ok(to_result(&pr, &names))
    }

    /// Transition a pull request to MERGED.
    ///
    /// Idempotent: merging a merged pull request returns it unchanged.
    /// Concurrent merges all report the `merged_at` of the first committer.
    #[instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn merge_pull_request(
        &self,
        ctx: &RequestContext,
        pull_request_id: &str,
    ) -> ReviewResult<PullRequestResult> {
        let pr = self.require_pull_request(ctx, pull_request_id).await?;
        if pr.is_merged() {
            obs::emit_pr_merged(&pr.system_id, true);
            return self.resolve(ctx, &pr).await;
        }

        // Millisecond precision survives every backend, so the stamp compares exactly.
        let now = Utc::now().trunc_subsecs(3);
        let merged_at = ctx
            .guard(self.store.set_merged(pr.pull_request_id, now))
            .await?;

        // Reviewers are frozen from the merge on; re-read to report them as committed.
        let mut merged = self.require_pull_request(ctx, pull_request_id).await?;
        merged.merged_at = Some(merged_at);

        // A different stamp means a concurrent merge committed first.
        obs::emit_pr_merged(&merged.system_id, merged_at != now);
        self.resolve(ctx, &merged).await
    }

    /// Replace `old_reviewer_id` on an open pull request with another
    /// eligible teammate, or drop them when nobody is left.
    ///
    /// Returns `ReassignOutcome::NotAssigned` without writing anything when
    /// the user is not a current reviewer.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown pull request or user,
    /// `InvalidState(PullRequestMerged)` once merged, and
    /// `InvalidState(ConcurrentModification)` when the reviewer set kept
    /// changing for [`MAX_REASSIGN_ATTEMPTS`] attempts.
    #[instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn reassign_reviewer(
        &self,
        ctx: &RequestContext,
        pull_request_id: &str,
        old_reviewer_id: &str,
    ) -> ReviewResult<ReassignResult> {
        let mut pr = self.require_pull_request(ctx, pull_request_id).await?;
        let old = self.require_user(ctx, old_reviewer_id).await?;

        for attempt in 1..=MAX_REASSIGN_ATTEMPTS {
            if pr.is_merged() {
                return Err(ReviewError::InvalidState(StateViolation::PullRequestMerged));
            }
            if !pr.has_reviewer(old.user_id) {
                obs::emit_reviewer_reassigned(
                    &pr.system_id,
                    &old.system_id,
                    "not_assigned",
                    attempt,
                );
                return Ok(ReassignResult {
                    pr: self.resolve(ctx, &pr).await?,
                    outcome: ReassignOutcome::NotAssigned,
                });
            }

            let exclude = policy::replacement_exclusions(pr.author_id, &pr.reviewers);
            let members = ctx.guard(self.store.get_team_members(old.team_id)).await?;
            let replacement =
                policy::select_replacement(&members, &exclude, &mut rand::thread_rng());

            let swap = self.store.replace_reviewer(
                pr.pull_request_id,
                &pr.reviewers,
                old.user_id,
                replacement.as_ref().map(|u| u.user_id),
            );
            match ctx.race(swap).await? {
                Ok(updated) => {
                    let outcome = match replacement {
                        Some(new) => ReassignOutcome::Replaced {
                            old_reviewer_id: old.system_id.clone(),
                            new_reviewer_id: new.system_id,
                        },
                        None => ReassignOutcome::Dropped {
                            old_reviewer_id: old.system_id.clone(),
                        },
                    };
                    obs::emit_reviewer_reassigned(
                        &updated.system_id,
                        &old.system_id,
                        outcome_kind(&outcome),
                        attempt,
                    );
                    return Ok(ReassignResult {
                        pr: self.resolve(ctx, &updated).await?,
                        outcome,
                    });
                }
                Err(StorageError::Conflict { .. }) => {
                    obs::emit_reassign_conflict(&pr.system_id, attempt);
                    pr = self.require_pull_request(ctx, pull_request_id).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ReviewError::InvalidState(
            StateViolation::ConcurrentModification,
        ))
    }

    /// Pull requests the user currently reviews, oldest first.
    #[instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn get_reviews_for_user(
        &self,
        ctx: &RequestContext,
        user_id: &str,
    ) -> ReviewResult<Vec<PullRequestSummary>> {
        let user = self.require_user(ctx, user_id).await?;
        let prs = ctx.guard(self.store.get_reviews_for_user(user.user_id)).await?;

        let mut authors: Vec<UserId> = prs.iter().map(|pr| pr.author_id).collect();
        authors.sort();
        authors.dedup();
        let names = self.system_ids(ctx, &authors).await?;

        prs.iter()
            .map(|pr| {
                Ok(PullRequestSummary {
                    pull_request_id: pr.system_id.clone(),
                    pull_request_name: pr.name.clone(),
                    author_id: lookup(&names, pr.author_id)?,
                    status: pr.status,
                })
            })
            .collect()
    }

    // -- helpers -------------------------------------------------------------

    pub(crate) async fn require_user(
        &self,
        ctx: &RequestContext,
        system_id: &str,
    ) -> ReviewResult<User> {
        ctx.guard(self.store.get_user_by_system_id(system_id))
            .await?
            .ok_or_else(|| ReviewError::not_found("user", system_id))
    }

    async fn require_pull_request(
        &self,
        ctx: &RequestContext,
        system_id: &str,
    ) -> ReviewResult<PullRequest> {
        ctx.guard(self.store.get_pull_request_by_system_id(system_id))
            .await?
            .ok_or_else(|| ReviewError::not_found("pull request", system_id))
    }

    async fn system_ids(
        &self,
        ctx: &RequestContext,
        ids: &[UserId],
    ) -> ReviewResult<HashMap<UserId, String>> {
        let users = ctx.guard(self.store.get_users_by_ids(ids)).await?;
        Ok(users.into_iter().map(|u| (u.user_id, u.system_id)).collect())
    }

    /// Resolve author and reviewer ids of `pr` to external ids.
    async fn resolve(
        &self,
        ctx: &RequestContext,
        pr: &PullRequest,
    ) -> ReviewResult<PullRequestResult> {
        let mut ids = Vec::with_capacity(pr.reviewers.len() + 1);
        ids.push(pr.author_id);
        ids.extend(pr.reviewers.iter().copied());
        let names = self.system_ids(ctx, &ids).await?;
        lookup(&names, pr.author_id)?;
        Ok(to_result(pr, &names))
    }
}

fn lookup(names: &HashMap<UserId, String>, id: UserId) -> ReviewResult<String> {
    names
        .get(&id)
        .cloned()
        .ok_or_else(|| ReviewError::not_found("user", id.to_string()))
}

fn to_result(pr: &PullRequest, names: &HashMap<UserId, String>) -> PullRequestResult {
    PullRequestResult {
        pull_request_id: pr.system_id.clone(),
        pull_request_name: pr.name.clone(),
        author_id: names.get(&pr.author_id).cloned().unwrap_or_default(),
        status: pr.status,
        assigned_reviewers: pr
            .reviewers
            .iter()
            .filter_map(|id| names.get(id).cloned())
            .collect(),
        created_at: pr.created_at,
        merged_at: pr.merged_at,
    }
}

fn outcome_kind(outcome: &ReassignOutcome) -> &'static str {
    match outcome {
        ReassignOutcome::Replaced { .. } => "replaced",
        ReassignOutcome::Dropped { .. } => "dropped",
        ReassignOutcome::NotAssigned => "not_assigned",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prm_state::{MemoryReviewStore, NewTeam, NewUser, PullRequestStatus};

    async fn engine_with_backend() -> ReviewEngine<MemoryReviewStore> {
        let store = Arc::new(MemoryReviewStore::new());
        store
            .create_team(NewTeam {
                team_name: "backend".into(),
                members: vec![
                    NewUser {
                        system_id: "u1".into(),
                        user_name: "Alice".into(),
                        is_active: true,
                    },
                    NewUser {
                        system_id: "u2".into(),
                        user_name: "Bob".into(),
                        is_active: true,
                    },
                ],
            })
            .await
            .unwrap();
        ReviewEngine::new(store)
    }

    #[tokio::test]
    async fn create_assigns_only_teammate() {
        let engine = engine_with_backend().await;
        let ctx = RequestContext::new();

        let pr = engine
            .create_pull_request(&ctx, "u1", "PR1", "Add login")
            .await
            .unwrap();
        assert_eq!(pr.status, PullRequestStatus::Open);
        assert_eq!(pr.author_id, "u1");
        assert_eq!(pr.assigned_reviewers, vec!["u2".to_string()]);
    }

    #[tokio::test]
    async fn engine_is_shareable_between_tasks() {
        let engine = engine_with_backend().await;
        let cloned = engine.clone();
        let handle = tokio::spawn(async move {
            cloned
                .create_pull_request(&RequestContext::new(), "u1", "PR-task", "Spawned")
                .await
        });
        assert!(handle.await.unwrap().is_ok());
        assert!(engine.store().pull_request_exists("PR-task").await.unwrap());
    }

    #[test]
    fn outcome_kind_names() {
        assert_eq!(outcome_kind(&ReassignOutcome::NotAssigned), "not_assigned");
        assert_eq!(
            outcome_kind(&ReassignOutcome::Dropped {
                old_reviewer_id: "u2".into()
            }),
            "dropped"
        );
    }
}
