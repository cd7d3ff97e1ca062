//! Branch endpoints.
//!
//! - GET /repo/{id}/branches
//!   Local branches and the checked-out one.
//!
//! - POST /repo/{id}/branch/create { name, from }
//!   Creates `name` at the commit `from` resolves to. Does not switch.
//!
//! - POST /repo/{id}/branch/switch { name }
//!   Checks out a local branch, or creates a tracking branch from a remote.
//!
//! - DELETE /repo/{id}/branch { name }
//!   Force-deletes a local branch.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::Result;
use crate::models::BranchList;
use crate::routes::{Actor, OkResponse, blocking, ok, record};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/repo/{id}/branches", get(list_branches))
        .route("/repo/{id}/branch/create", post(create_branch))
        .route("/repo/{id}/branch/switch", post(switch_branch))
        .route("/repo/{id}/branch", delete(delete_branch))
        .with_state(state)
}

async fn list_branches(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<BranchList>> {
    let branches = blocking(move || state.registry.open(&id)?.list_branches()).await?;
    Ok(Json(branches))
}

#[derive(Debug, Deserialize)]
struct CreateBranchRequest {
    name: String,
    from: String,
}

async fn create_branch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Actor(user): Actor,
    Json(request): Json<CreateBranchRequest>,
) -> Result<Json<OkResponse>> {
    blocking(move || {
        let repo = state.registry.open(&id)?;
        repo.create_branch(&request.name, &request.from)?;
        record(
            &state,
            &repo,
            "branch_create",
            &user,
            [("name", Some(json!(request.name))), ("from_branch", Some(json!(request.from)))],
        );
        Ok(())
    })
    .await?;
    Ok(ok())
}

#[derive(Debug, Deserialize)]
struct BranchNameRequest {
    name: String,
}

#[derive(Debug, Serialize)]
struct SwitchResponse {
    ok: bool,
    current: Option<String>,
}

async fn switch_branch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Actor(user): Actor,
    Json(request): Json<BranchNameRequest>,
) -> Result<Json<SwitchResponse>> {
    let current = blocking(move || {
        let repo = state.registry.open(&id)?;
        repo.switch_branch(&request.name)?;
        record(&state, &repo, "branch_switch", &user, [("name", Some(json!(request.name)))]);
        repo.current_branch()
    })
    .await?;
    Ok(Json(SwitchResponse { ok: true, current }))
}

async fn delete_branch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Actor(user): Actor,
    Json(request): Json<BranchNameRequest>,
) -> Result<Json<OkResponse>> {
    blocking(move || {
        let repo = state.registry.open(&id)?;
        repo.delete_branch(&request.name)?;
        record(&state, &repo, "branch_delete", &user, [("name", Some(json!(request.name)))]);
        Ok(())
    })
    .await?;
    Ok(ok())
}
