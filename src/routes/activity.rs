//! Activity log endpoint.
//!
//! - GET /repo/{id}/activity?limit=
//!   Recorded actions oldest first; `limit` keeps only the most recent.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::ActivityEvent;
use crate::routes::blocking;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/repo/{id}/activity", get(get_activity))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ActivityQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ActivityResponse {
    events: Vec<ActivityEvent>,
}

async fn get_activity(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<ActivityResponse>> {
    let events = blocking(move || {
        state.registry.open(&id)?;
        state.activity.read(&id, query.limit)
    })
    .await?;
    Ok(Json(ActivityResponse { events }))
}
