//! Team and user operations.

use std::collections::HashSet;

use tracing::instrument;

use prm_state::{NewTeam, NewUser, ReviewStore, Team};

use crate::context::RequestContext;
use crate::dto::{TeamMember, TeamView, UserReviews, UserView};
use crate::engine::ReviewEngine;
use crate::error::{ReviewError, ReviewResult};
use crate::obs;

impl<S: ReviewStore + ?Sized> ReviewEngine<S> {
    /// Create a team together with all of its members.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when a user id repeats inside the request,
    /// `AlreadyExists` when the team name or a member's user id is taken.
    #[instrument(skip(self, ctx, team), fields(request_id = %ctx.request_id, team_name = %team.team_name))]
    pub async fn add_team(&self, ctx: &RequestContext, team: TeamView) -> ReviewResult<TeamView> {
        let mut seen = HashSet::new();
        if let Some(dup) = team.members.iter().find(|m| !seen.insert(m.user_id.as_str())) {
            return Err(ReviewError::InvalidInput(format!(
                "user_id {} listed twice in team {}",
                dup.user_id, team.team_name
            )));
        }

        if ctx.guard(self.store.team_exists(&team.team_name)).await? {
            return Err(ReviewError::already_exists("team", team.team_name));
        }

        let new_team = NewTeam {
            team_name: team.team_name,
            members: team
                .members
                .into_iter()
                .map(|m| NewUser {
                    system_id: m.user_id,
                    user_name: m.username,
                    is_active: m.is_active,
                })
                .collect(),
        };
        let created = ctx.guard(self.store.create_team(new_team)).await?;

        obs::emit_team_created(&created.team_name, created.members.len());
        Ok(team_view(created))
    }

    #[instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn get_team(&self, ctx: &RequestContext, team_name: &str) -> ReviewResult<TeamView> {
        ctx.guard(self.store.get_team_by_name(team_name))
            .await?
            .map(team_view)
            .ok_or_else(|| ReviewError::not_found("team", team_name))
    }

    /// Toggle review eligibility of a user.
    #[instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn set_is_active(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        is_active: bool,
    ) -> ReviewResult<UserView> {
        let user = ctx
            .guard(self.store.set_user_active(user_id, is_active))
            .await?
            .ok_or_else(|| ReviewError::not_found("user", user_id))?;
        let team = ctx
            .guard(self.store.get_team_by_id(user.team_id))
            .await?
            .ok_or_else(|| ReviewError::not_found("team", user.team_id.to_string()))?;

        obs::emit_user_activity_changed(&user.system_id, user.is_active);
        Ok(UserView {
            user_id: user.system_id,
            username: user.user_name,
            team_name: team.team_name,
            is_active: user.is_active,
        })
    }

    /// [`get_reviews_for_user`](Self::get_reviews_for_user) wrapped with the user id.
    pub async fn get_review(
        &self,
        ctx: &RequestContext,
        user_id: &str,
    ) -> ReviewResult<UserReviews> {
        let pull_requests = self.get_reviews_for_user(ctx, user_id).await?;
        Ok(UserReviews {
            user_id: user_id.to_string(),
            pull_requests,
        })
    }
}

fn team_view(team: Team) -> TeamView {
    TeamView {
        team_name: team.team_name,
        members: team
            .members
            .into_iter()
            .map(|u| TeamMember {
                user_id: u.system_id,
                username: u.user_name,
                is_active: u.is_active,
            })
            .collect(),
    }
}
