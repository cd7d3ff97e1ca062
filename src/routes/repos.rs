//! Repository registry endpoints.
//!
//! - GET /repos
//!   Every working tree with its current branch and ahead/behind counts.
//!
//! - POST /clone { url, branch?, auth?: { username, password }, sshKeyId? }
//!   Clones into a fresh id. HTTP credentials are stored in the repository's
//!   vault; the SSH key id is remembered in its metadata.
//!
//! - POST /import-zip?fileName=&name=  (raw zip body)
//!   Creates a repository from an uploaded archive.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::git::remote::sanitize_url;
use crate::models::{CloneRequest, CloneResult, RepoSummary};
use crate::routes::{Actor, blocking, record};
use crate::state::AppState;

const MAX_ARCHIVE_BYTES: usize = 256 * 1024 * 1024;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/repos", get(list_repos))
        .route("/clone", post(clone_repo))
        .route(
            "/import-zip",
            post(import_zip).layer(DefaultBodyLimit::max(MAX_ARCHIVE_BYTES)),
        )
        .with_state(state)
}

async fn list_repos(State(state): State<AppState>) -> Result<Json<Vec<RepoSummary>>> {
    let repos = blocking(move || state.registry.list()).await?;
    Ok(Json(repos))
}

async fn clone_repo(
    State(state): State<AppState>,
    Actor(user): Actor,
    Json(request): Json<CloneRequest>,
) -> Result<Json<CloneResult>> {
    let result = blocking(move || {
        let result = state.registry.clone_repo(&request)?;
        let repo = state.registry.open(&result.repo_id)?;
        record(&state, &repo, "clone", &user, [("url", Some(json!(sanitize_url(&request.url))))]);
        Ok(result)
    })
    .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportQuery {
    file_name: Option<String>,
    name: Option<String>,
}

async fn import_zip(
    State(state): State<AppState>,
    Actor(user): Actor,
    Query(query): Query<ImportQuery>,
    body: Bytes,
) -> Result<Json<CloneResult>> {
    let file_name = query
        .file_name
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| AppError::InvalidArgument("Missing filename".to_string()))?;

    let result = blocking(move || {
        let result = state
            .registry
            .import_zip(&body, &file_name, query.name.as_deref())?;
        let repo = state.registry.open(&result.repo_id)?;
        record(&state, &repo, "import_zip", &user, [("name", Some(json!(result.name)))]);
        Ok(result)
    })
    .await?;
    Ok(Json(result))
}
