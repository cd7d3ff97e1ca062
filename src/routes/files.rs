//! Working-tree browsing and editing endpoints.
//!
//! - GET /repo/{id}/tree?path=
//! - GET /repo/{id}/file?path=
//! - PUT /repo/{id}/file { path, content }
//! - GET /repo/{id}/search?q=
//!
//! Paths are relative to the repository root and never leave it.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::{SearchHit, TreeEntry};
use crate::routes::{Actor, OkResponse, blocking, ok, record};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/repo/{id}/tree", get(get_tree))
        .route("/repo/{id}/file", get(read_file).put(write_file))
        .route("/repo/{id}/search", get(search))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct TreeQuery {
    path: Option<String>,
}

#[derive(Debug, Serialize)]
struct TreeResponse {
    path: String,
    entries: Vec<TreeEntry>,
}

async fn get_tree(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<TreeQuery>,
) -> Result<Json<TreeResponse>> {
    let path = query.path.unwrap_or_default();
    let (path, entries) = blocking(move || {
        let repo = state.registry.open(&id)?;
        let entries = repo.tree(Some(&path).filter(|p| !p.is_empty()).map(String::as_str))?;
        Ok((path, entries))
    })
    .await?;
    Ok(Json(TreeResponse { path, entries }))
}

#[derive(Debug, Deserialize)]
struct FileQuery {
    path: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct FileBody {
    path: String,
    content: String,
}

async fn read_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<FileQuery>,
) -> Result<Json<FileBody>> {
    let file = blocking(move || {
        let content = state.registry.open(&id)?.read_file(&query.path)?;
        Ok(FileBody {
            path: query.path,
            content,
        })
    })
    .await?;
    Ok(Json(file))
}

async fn write_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Actor(user): Actor,
    Json(request): Json<FileBody>,
) -> Result<Json<OkResponse>> {
    blocking(move || {
        let repo = state.registry.open(&id)?;
        repo.write_file(&request.path, &request.content)?;
        record(&state, &repo, "write_file", &user, [("path", Some(json!(request.path)))]);
        Ok(())
    })
    .await?;
    Ok(ok())
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: String,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

async fn search(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>> {
    if query.q.is_empty() {
        return Err(AppError::InvalidArgument("Search query is required".to_string()));
    }
    let results = blocking(move || state.registry.open(&id)?.search(&query.q)).await?;
    Ok(Json(SearchResponse { results }))
}
