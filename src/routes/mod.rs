//! API route handlers - maps HTTP endpoints onto registry and repository
//! operations.
//!
//! Each submodule defines routes for a feature area:
//! - `repos`: listing, clone and zip import
//! - `branches`: list, create, switch, delete
//! - `files`: tree listing, file read/write, content search
//! - `changes`: status, diff, stage/unstage, commit, offline sync, suggestions
//! - `remote`: push, fetch, merge/rebase, commit-and-push, LFS
//! - `credentials`: per-repository secrets and the SSH key store
//! - `activity`: per-repository activity log
//!
//! Core calls block on git and the filesystem, so every handler hands its
//! work to `blocking`.

pub mod activity;
pub mod branches;
pub mod changes;
pub mod credentials;
pub mod files;
pub mod remote;
pub mod repos;

use std::convert::Infallible;

use axum::{Json, Router, extract::FromRequestParts, http::request::Parts};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{AppError, Result};
use crate::git::GitRepository;
use crate::state::AppState;

pub const USER_HEADER: &str = "x-workspace-user";
const ANONYMOUS: &str = "anonymous";

/// Who performed an action, taken from the `x-workspace-user` header.
#[derive(Debug, Clone)]
pub struct Actor(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(ANONYMOUS);
        Ok(Actor(user.to_string()))
    }
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

pub fn ok() -> Json<OkResponse> {
    Json(OkResponse { ok: true })
}

/// Run a blocking core call on the blocking pool.
pub async fn blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("worker task failed: {}", e)))?
}

/// Append an activity entry stamped with the repository's current branch.
/// A failed write is logged and does not fail the request.
pub fn record(
    state: &AppState,
    repo: &GitRepository,
    action: &str,
    user: &str,
    details: impl IntoIterator<Item = (&'static str, Option<Value>)>,
) {
    let branch = repo.current_branch().ok().flatten();
    if let Err(e) = state
        .activity
        .append(repo.repo_id(), action, user, branch.as_deref(), details)
    {
        warn!(repo_id = %repo.repo_id(), action, error = %e, "failed to record activity");
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(repos::routes(state.clone()))
        .merge(branches::routes(state.clone()))
        .merge(files::routes(state.clone()))
        .merge(changes::routes(state.clone()))
        .merge(remote::routes(state.clone()))
        .merge(credentials::routes(state.clone()))
        .merge(activity::routes(state))
}
