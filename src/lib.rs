//! Server-side mediation layer for a hosted multi-repository git workspace.
//!
//! Module map:
//! - `registry`: repository ids, open/list, clone and zip import
//! - `git`: per-repository operations behind a single lock
//! - `sandbox`: confines caller paths to a repository root
//! - `vault`: encrypted per-repository secrets
//! - `ssh_keys`: private key storage and the SSH transport overlay
//! - `activity`: append-only per-repository action log
//! - `routes`: thin HTTP surface over all of the above

pub mod activity;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod git;
pub mod import;
pub mod models;
pub mod registry;
pub mod routes;
pub mod sandbox;
pub mod ssh_keys;
pub mod state;
pub mod vault;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::{AppError, Result};
pub use state::AppState;

/// The full application: API routes with permissive CORS and request tracing.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::create_router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
