//! Activity log DTOs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One line of a repository's activity log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub ts: String,
    pub action: String,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Action-specific fields (`msg`, `hash`, `paths`, ...)
    #[serde(flatten)]
    pub details: Map<String, Value>,
}
