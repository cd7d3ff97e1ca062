//! Index and commit endpoints.
//!
//! - GET /repo/{id}/status
//! - GET /repo/{id}/diff
//!   Staged then unstaged patch text.
//! - POST /repo/{id}/stage { paths }
//! - POST /repo/{id}/unstage { paths }
//! - POST /repo/{id}/commit { message, authorName, authorEmail }
//! - POST /repo/{id}/offline-commit { changes: [{ path, content }], message?, authorName?, authorEmail? }
//!   Applies edits made while disconnected and commits them if anything changed.
//! - POST /repo/{id}/suggest-commit-message
//!   One-line summary of the staged changes.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::Result;
use crate::models::{FileChange, WorkingTreeStatus};
use crate::routes::{Actor, OkResponse, blocking, ok, record};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/repo/{id}/status", get(get_status))
        .route("/repo/{id}/diff", get(get_diff))
        .route("/repo/{id}/stage", post(stage))
        .route("/repo/{id}/unstage", post(unstage))
        .route("/repo/{id}/commit", post(commit))
        .route("/repo/{id}/offline-commit", post(offline_commit))
        .route("/repo/{id}/suggest-commit-message", post(suggest_commit_message))
        .with_state(state)
}

async fn get_status(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<WorkingTreeStatus>> {
    let status = blocking(move || state.registry.open(&id)?.status()).await?;
    Ok(Json(status))
}

#[derive(Debug, Serialize)]
struct DiffResponse {
    diff: String,
}

async fn get_diff(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<DiffResponse>> {
    let diff = blocking(move || state.registry.open(&id)?.diff()).await?;
    Ok(Json(DiffResponse { diff }))
}

#[derive(Debug, Deserialize)]
struct PathsRequest {
    paths: Vec<String>,
}

async fn stage(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Actor(user): Actor,
    Json(request): Json<PathsRequest>,
) -> Result<Json<OkResponse>> {
    blocking(move || {
        let repo = state.registry.open(&id)?;
        repo.stage(&request.paths)?;
        record(&state, &repo, "stage", &user, [("paths", Some(json!(request.paths)))]);
        Ok(())
    })
    .await?;
    Ok(ok())
}

async fn unstage(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Actor(user): Actor,
    Json(request): Json<PathsRequest>,
) -> Result<Json<OkResponse>> {
    blocking(move || {
        let repo = state.registry.open(&id)?;
        repo.unstage(&request.paths)?;
        record(&state, &repo, "unstage", &user, [("paths", Some(json!(request.paths)))]);
        Ok(())
    })
    .await?;
    Ok(ok())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitRequest {
    message: String,
    author_name: String,
    author_email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CommitResponse {
    ok: bool,
    commit_hash: Option<String>,
}

async fn commit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Actor(user): Actor,
    Json(request): Json<CommitRequest>,
) -> Result<Json<CommitResponse>> {
    let hash = blocking(move || {
        let repo = state.registry.open(&id)?;
        let hash = repo.commit(&request.message, &request.author_name, &request.author_email)?;
        record(
            &state,
            &repo,
            "commit",
            &user,
            [("msg", Some(json!(request.message))), ("hash", Some(json!(hash)))],
        );
        Ok(hash)
    })
    .await?;
    Ok(Json(CommitResponse {
        ok: true,
        commit_hash: Some(hash),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfflineCommitRequest {
    #[serde(default)]
    changes: Vec<FileChange>,
    message: Option<String>,
    author_name: Option<String>,
    author_email: Option<String>,
}

async fn offline_commit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Actor(user): Actor,
    Json(request): Json<OfflineCommitRequest>,
) -> Result<Json<CommitResponse>> {
    let hash = blocking(move || {
        let repo = state.registry.open(&id)?;
        if request.changes.is_empty() {
            return Ok(None);
        }
        let hash = repo.sync_offline_changes(
            &request.changes,
            request.message.as_deref(),
            request.author_name.as_deref(),
            request.author_email.as_deref(),
        )?;
        if let Some(hash) = &hash {
            let paths: Vec<&str> = request.changes.iter().map(|c| c.path.as_str()).collect();
            record(
                &state,
                &repo,
                "offline_commit",
                &user,
                [("hash", Some(json!(hash))), ("paths", Some(json!(paths)))],
            );
        }
        Ok(hash)
    })
    .await?;
    Ok(Json(CommitResponse {
        ok: true,
        commit_hash: hash,
    }))
}

#[derive(Debug, Serialize)]
struct SuggestionResponse {
    suggestion: String,
}

async fn suggest_commit_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuggestionResponse>> {
    let suggestion = blocking(move || state.registry.open(&id)?.suggest_commit_message()).await?;
    Ok(Json(SuggestionResponse { suggestion }))
}
