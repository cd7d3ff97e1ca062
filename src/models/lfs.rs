//! Git LFS DTOs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LfsPointer {
    pub path: String,
    pub oid: Option<String>,
    pub size: Option<u64>,
    pub tracked: bool,
    pub present: Option<bool>,
}

/// Materialized LFS object content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LfsContent {
    pub path: String,
    /// Always `"base64"`
    pub encoding: String,
    pub content: String,
    pub size: u64,
}
