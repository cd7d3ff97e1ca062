//! Repository-level DTOs.
//!
//! - `RepoSummary`: one row of the repository list
//! - `CloneResult`: returned by clone and zip import
//! - `BranchList`: local branches plus the checked-out one
//! - `CommitAndPush`: result of the one-shot commit-and-push flow
//! - `CloneRequest`: what to clone and with which credential

use serde::{Deserialize, Serialize};

use crate::models::HttpCredentials;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoSummary {
    pub repo_id: String,
    pub name: String,
    pub current_branch: Option<String>,
    pub ahead: usize,
    pub behind: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneResult {
    pub repo_id: String,
    pub name: String,
    /// Empty when HEAD is detached
    pub default_branch: String,
    pub branches: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloneRequest {
    pub url: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub auth: Option<HttpCredentials>,
    #[serde(default, rename = "sshKeyId")]
    pub ssh_key_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchList {
    pub current: Option<String>,
    pub branches: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitAndPush {
    pub commit_hash: String,
    pub pushed: bool,
}

/// One file edit carried by an offline sync.
#[derive(Debug, Clone, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub content: String,
}
