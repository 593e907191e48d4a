//! PR Manager CLI
//!
//! The `prm` command manages teams and pull requests and assigns reviewers
//! from the author's team automatically.
//!
//! ## Commands
//!
//! - `team add`: create a team with its members from a JSON file
//! - `team get`: show a team
//! - `users set-is-active`: toggle review eligibility
//! - `users get-review`: list pull requests a user reviews
//! - `pr create` / `pr merge` / `pr reassign`: pull request lifecycle
//!
//! Results are printed to stdout as JSON. Failures print
//! `{"error": {"code", "message"}}` and exit non-zero.

mod response;

use std::future::Future;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use prm_core::{RequestContext, ReviewEngine, TeamView};
use prm_state::{StoreConfig, SurrealReviewStore};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument, Level};

use response::{to_value, CommandError};

type Engine = ReviewEngine<SurrealReviewStore>;

#[derive(Parser, Debug)]
#[command(name = "prm")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Team-aware pull request reviewer assignment", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines (stderr)
    #[arg(long, global = true)]
    json_logs: bool,

    /// Database URL (mem://, surrealkv://<path>, ws://host:port)
    #[arg(long, global = true, env = "PRM_DB_URL")]
    db_url: Option<String>,

    /// Use an ephemeral in-memory database
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage teams
    Team {
        #[command(subcommand)]
        action: TeamAction,
    },

    /// Manage users
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },

    /// Manage pull requests
    Pr {
        #[command(subcommand)]
        action: PrAction,
    },
}

#[derive(Subcommand, Debug)]
enum TeamAction {
    /// Create a team and its members
    Add {
        /// JSON file with `team_name` and `members`, or `-` for stdin
        file: PathBuf,
    },

    /// Show a team and its members
    Get { team_name: String },
}

#[derive(Subcommand, Debug)]
enum UsersAction {
    /// Mark a user as (in)eligible for review
    SetIsActive {
        user_id: String,

        #[arg(long, action = ArgAction::Set)]
        active: bool,
    },

    /// List pull requests the user reviews
    GetReview { user_id: String },
}

#[derive(Subcommand, Debug)]
enum PrAction {
    /// Open a pull request and assign reviewers
    Create {
        /// Pull request id
        #[arg(long)]
        id: String,

        /// Pull request title
        #[arg(long)]
        name: String,

        /// Author user id
        #[arg(long)]
        author: String,
    },

    /// Merge a pull request (idempotent)
    Merge { pull_request_id: String },

    /// Replace a reviewer with another teammate
    Reassign {
        pull_request_id: String,

        #[arg(long)]
        old_reviewer: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    prm_core::init_tracing(cli.json_logs, level);

    let config = store_config(cli.in_memory, cli.db_url.as_deref());
    let store = SurrealReviewStore::connect(&config)
        .await
        .context("Failed to connect to PR Manager database")?;
    let engine = ReviewEngine::new(Arc::new(store));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });
    let ctx = RequestContext::with_token(cancel);

    let span = ctx.span();
    let command = cli.command;
    let outcome =
        supervise(async move { run(&engine, &ctx, command).await }.instrument(span)).await;

    match outcome {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            println!("{}", err.to_json());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn store_config(in_memory: bool, db_url: Option<&str>) -> StoreConfig {
    if in_memory {
        return StoreConfig::Memory;
    }
    match db_url {
        Some(url) => StoreConfig::Url(url.to_string()),
        None => StoreConfig::from_env(),
    }
}

/// Run a command on its own task so a panic surfaces as `SERVER_ERROR`
/// instead of tearing down the process with its message.
async fn supervise<F>(command: F) -> Result<Value, CommandError>
where
    F: Future<Output = Result<Value, CommandError>> + Send + 'static,
{
    match tokio::spawn(command).await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(event = "command.aborted", panicked = err.is_panic());
            Err(CommandError::Panicked)
        }
    }
}

async fn run(
    engine: &Engine,
    ctx: &RequestContext,
    command: Commands,
) -> Result<Value, CommandError> {
    debug!(?command, "dispatching");
    match command {
        Commands::Team { action } => match action {
            TeamAction::Add { file } => cmd_team_add(engine, ctx, &file).await,
            TeamAction::Get { team_name } => cmd_team_get(engine, ctx, &team_name).await,
        },
        Commands::Users { action } => match action {
            UsersAction::SetIsActive { user_id, active } => {
                cmd_set_is_active(engine, ctx, &user_id, active).await
            }
            UsersAction::GetReview { user_id } => cmd_get_review(engine, ctx, &user_id).await,
        },
        Commands::Pr { action } => match action {
            PrAction::Create { id, name, author } => {
                cmd_pr_create(engine, ctx, &id, &name, &author).await
            }
            PrAction::Merge { pull_request_id } => {
                cmd_pr_merge(engine, ctx, &pull_request_id).await
            }
            PrAction::Reassign {
                pull_request_id,
                old_reviewer,
            } => cmd_pr_reassign(engine, ctx, &pull_request_id, &old_reviewer).await,
        },
    }
}

fn require(field: &str, value: &str) -> Result<(), CommandError> {
    if value.trim().is_empty() {
        return Err(CommandError::invalid(format!("{field} must not be empty")));
    }
    Ok(())
}

fn read_team(file: &Path) -> Result<TeamView, CommandError> {
    let raw = if file == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| CommandError::invalid(format!("cannot read stdin: {e}")))?;
        buf
    } else {
        std::fs::read_to_string(file)
            .map_err(|e| CommandError::invalid(format!("cannot read {}: {e}", file.display())))?
    };

    let team: TeamView =
        serde_json::from_str(&raw).map_err(|e| CommandError::Parse(e.to_string()))?;

    require("team_name", &team.team_name)?;
    for member in &team.members {
        require("members[].user_id", &member.user_id)?;
        require("members[].username", &member.username)?;
    }
    Ok(team)
}

async fn cmd_team_add(
    engine: &Engine,
    ctx: &RequestContext,
    file: &Path,
) -> Result<Value, CommandError> {
    let team = read_team(file)?;
    let created = engine.add_team(ctx, team).await?;
    to_value(&serde_json::json!({ "team": created }))
}

async fn cmd_team_get(
    engine: &Engine,
    ctx: &RequestContext,
    team_name: &str,
) -> Result<Value, CommandError> {
    require("team_name", team_name)?;
    to_value(&engine.get_team(ctx, team_name).await?)
}

async fn cmd_set_is_active(
    engine: &Engine,
    ctx: &RequestContext,
    user_id: &str,
    active: bool,
) -> Result<Value, CommandError> {
    require("user_id", user_id)?;
    let user = engine.set_is_active(ctx, user_id, active).await?;
    to_value(&serde_json::json!({ "user": user }))
}

async fn cmd_get_review(
    engine: &Engine,
    ctx: &RequestContext,
    user_id: &str,
) -> Result<Value, CommandError> {
    require("user_id", user_id)?;
    to_value(&engine.get_review(ctx, user_id).await?)
}

async fn cmd_pr_create(
    engine: &Engine,
    ctx: &RequestContext,
    id: &str,
    name: &str,
    author: &str,
) -> Result<Value, CommandError> {
    require("pull_request_id", id)?;
    require("pull_request_name", name)?;
    require("author_id", author)?;
    let pr = engine.create_pull_request(ctx, author, id, name).await?;
    to_value(&serde_json::json!({ "pr": pr }))
}

async fn cmd_pr_merge(
    engine: &Engine,
    ctx: &RequestContext,
    pull_request_id: &str,
) -> Result<Value, CommandError> {
    require("pull_request_id", pull_request_id)?;
    let pr = engine.merge_pull_request(ctx, pull_request_id).await?;
    to_value(&serde_json::json!({ "pr": pr }))
}

async fn cmd_pr_reassign(
    engine: &Engine,
    ctx: &RequestContext,
    pull_request_id: &str,
    old_reviewer: &str,
) -> Result<Value, CommandError> {
    require("pull_request_id", pull_request_id)?;
    require("old_reviewer_id", old_reviewer)?;
    let result = engine
        .reassign_reviewer(ctx, pull_request_id, old_reviewer)
        .await?;
    to_value(&result)
}
