//! prm-core: reviewer assignment and pull request lifecycle
//!
//! ## Layer 1 - Domain
//!
//! - `policy`: pure reviewer selection (no I/O)
//! - `ReviewEngine`: create, merge, reassign and list over a [`ReviewStore`]
//! - team and user operations on the same engine
//! - `RequestContext`: request id and cancellation for every call
//! - `obs` / `telemetry`: structured events and subscriber setup

pub mod context;
pub mod dto;
pub mod engine;
pub mod error;
pub mod obs;
pub mod policy;
pub mod teams;
pub mod telemetry;

pub use context::RequestContext;
pub use dto::{
    PullRequestResult, PullRequestSummary, ReassignOutcome, ReassignResult, TeamMember, TeamView,
    UserReviews, UserView,
};
pub use engine::{ReviewEngine, MAX_REASSIGN_ATTEMPTS};
pub use error::{ReviewError, ReviewResult, StateViolation};
pub use obs::{
    emit_pr_created, emit_pr_merged, emit_reassign_conflict, emit_reviewer_reassigned,
    emit_store_failure, emit_team_created, emit_user_activity_changed,
};
pub use policy::{select_replacement, select_reviewers, MAX_REVIEWERS};
pub use telemetry::init_tracing;

pub use prm_state::{
    MemoryReviewStore, PullRequestStatus, ReviewStore, StoreConfig, SurrealReviewStore,
};
