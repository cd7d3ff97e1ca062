//! Remote transport and LFS endpoints.
//!
//! - POST /repo/{id}/push
//!   Pushes HEAD. `pushed` is false when the remote was already up to date.
//! - POST /repo/{id}/fetch
//! - POST /repo/{id}/merge { fromBranch, strategy: "merge" | "rebase" }
//! - POST /repo/{id}/commit-and-push { message, authorName, authorEmail }
//!   Stages everything, commits and pushes under one lock.
//! - GET /repo/{id}/lfs/list
//! - GET /repo/{id}/lfs/fetch?path=
//!   Object content as base64.
//!
//! Credentials are chosen per call: stored SSH key, then vault HTTP
//! credentials, then whatever the remote already has configured.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::Result;
use crate::models::{CommitAndPush, LfsContent, LfsPointer};
use crate::routes::{Actor, OkResponse, blocking, ok, record};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/repo/{id}/push", post(push))
        .route("/repo/{id}/fetch", post(fetch))
        .route("/repo/{id}/merge", post(merge))
        .route("/repo/{id}/commit-and-push", post(commit_and_push))
        .route("/repo/{id}/lfs/list", get(lfs_list))
        .route("/repo/{id}/lfs/fetch", get(lfs_fetch))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct PushResponse {
    ok: bool,
    pushed: bool,
}

async fn push(State(state): State<AppState>, Path(id): Path<String>, Actor(user): Actor) -> Result<Json<PushResponse>> {
    let pushed = blocking(move || {
        let repo = state.registry.open(&id)?;
        let pushed = repo.push()?;
        record(&state, &repo, "push", &user, [("pushed", Some(json!(pushed)))]);
        Ok(pushed)
    })
    .await?;
    Ok(Json(PushResponse { ok: true, pushed }))
}

async fn fetch(State(state): State<AppState>, Path(id): Path<String>, Actor(user): Actor) -> Result<Json<OkResponse>> {
    blocking(move || {
        let repo = state.registry.open(&id)?;
        repo.fetch()?;
        record(&state, &repo, "fetch", &user, []);
        Ok(())
    })
    .await?;
    Ok(ok())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MergeRequest {
    from_branch: String,
    strategy: String,
}

#[derive(Debug, Serialize)]
struct MergeResponse {
    ok: bool,
    result: &'static str,
}

async fn merge(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Actor(user): Actor,
    Json(request): Json<MergeRequest>,
) -> Result<Json<MergeResponse>> {
    let result = blocking(move || {
        let repo = state.registry.open(&id)?;
        let result = repo.merge_or_rebase(&request.from_branch, &request.strategy)?;
        record(
            &state,
            &repo,
            "merge",
            &user,
            [("from_branch", Some(json!(request.from_branch))), ("result", Some(json!(result)))],
        );
        Ok(result)
    })
    .await?;
    Ok(Json(MergeResponse { ok: true, result }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitAndPushRequest {
    message: String,
    author_name: String,
    author_email: String,
}

#[derive(Debug, Serialize)]
struct CommitAndPushResponse {
    ok: bool,
    #[serde(flatten)]
    outcome: CommitAndPush,
}

async fn commit_and_push(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Actor(user): Actor,
    Json(request): Json<CommitAndPushRequest>,
) -> Result<Json<CommitAndPushResponse>> {
    let outcome = blocking(move || {
        let repo = state.registry.open(&id)?;
        let outcome = repo.commit_and_push(&request.message, &request.author_name, &request.author_email)?;
        record(
            &state,
            &repo,
            "commit_push",
            &user,
            [
                ("msg", Some(json!(request.message))),
                ("hash", Some(json!(outcome.commit_hash))),
                ("pushed", Some(json!(outcome.pushed))),
            ],
        );
        Ok(outcome)
    })
    .await?;
    Ok(Json(CommitAndPushResponse { ok: true, outcome }))
}

#[derive(Debug, Serialize)]
struct LfsListResponse {
    files: Vec<LfsPointer>,
}

async fn lfs_list(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<LfsListResponse>> {
    let files = blocking(move || state.registry.open(&id)?.lfs_list()).await?;
    Ok(Json(LfsListResponse { files }))
}

#[derive(Debug, Deserialize)]
struct LfsFetchQuery {
    path: String,
}

async fn lfs_fetch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LfsFetchQuery>,
) -> Result<Json<LfsContent>> {
    let content = blocking(move || state.registry.open(&id)?.lfs_fetch(&query.path)).await?;
    Ok(Json(content))
}
