//! Secret and SSH key endpoints.
//!
//! - GET /repo/{id}/secrets
//!   Names with masked values; plaintext never leaves the vault here.
//! - POST /repo/{id}/secrets { name, value }  (201)
//! - DELETE /repo/{id}/secrets { name }
//!
//! - GET /keys/list
//! - POST /keys/upload { privateKey, name? }
//! - DELETE /keys/{keyId}

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::{SecretEntry, SshKeyRecord};
use crate::routes::{Actor, OkResponse, blocking, ok, record};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route(
            "/repo/{id}/secrets",
            get(list_secrets).post(create_secret).delete(delete_secret),
        )
        .route("/keys/list", get(list_keys))
        .route("/keys/upload", post(upload_key))
        .route("/keys/{key_id}", delete(delete_key))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct SecretListResponse {
    secrets: Vec<SecretEntry>,
}

async fn list_secrets(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<SecretListResponse>> {
    let secrets = blocking(move || {
        state.registry.open(&id)?;
        let secrets: Vec<SecretEntry> = state
            .vault()
            .list(&id)?
            .into_iter()
            .map(|(name, value)| SecretEntry { name, value })
            .collect();
        Ok(secrets)
    })
    .await?;
    Ok(Json(SecretListResponse { secrets }))
}

#[derive(Debug, Deserialize)]
struct CreateSecretRequest {
    name: String,
    value: String,
}

async fn create_secret(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Actor(user): Actor,
    Json(request): Json<CreateSecretRequest>,
) -> Result<(StatusCode, Json<OkResponse>)> {
    blocking(move || {
        let repo = state.registry.open(&id)?;
        state.vault().set(&id, &request.name, &request.value)?;
        record(&state, &repo, "secret_add", &user, [("name", Some(json!(request.name)))]);
        Ok(())
    })
    .await?;
    Ok((StatusCode::CREATED, ok()))
}

#[derive(Debug, Deserialize)]
struct DeleteSecretRequest {
    name: String,
}

async fn delete_secret(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Actor(user): Actor,
    Json(request): Json<DeleteSecretRequest>,
) -> Result<Json<OkResponse>> {
    blocking(move || {
        let repo = state.registry.open(&id)?;
        if !state.vault().delete(&id, &request.name)? {
            return Err(AppError::NotFound("Secret not found".to_string()));
        }
        record(&state, &repo, "secret_remove", &user, [("name", Some(json!(request.name)))]);
        Ok(())
    })
    .await?;
    Ok(ok())
}

#[derive(Debug, Serialize)]
struct KeyListResponse {
    keys: Vec<SshKeyRecord>,
}

async fn list_keys(State(state): State<AppState>) -> Result<Json<KeyListResponse>> {
    let keys = blocking(move || state.keys().list_keys()).await?;
    Ok(Json(KeyListResponse { keys }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadKeyRequest {
    private_key: String,
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct UploadKeyResponse {
    key: SshKeyRecord,
}

async fn upload_key(
    State(state): State<AppState>,
    Json(request): Json<UploadKeyRequest>,
) -> Result<Json<UploadKeyResponse>> {
    let key = blocking(move || state.keys().save_key(&request.private_key, request.name.as_deref())).await?;
    Ok(Json(UploadKeyResponse { key }))
}

async fn delete_key(State(state): State<AppState>, Path(key_id): Path<String>) -> Result<Json<OkResponse>> {
    blocking(move || {
        state.keys().key_path_for(&key_id)?;
        state.keys().delete_key(&key_id)
    })
    .await?;
    Ok(ok())
}
