//! Credential DTOs.
//!
//! Secret values never appear here in plaintext except inside
//! `HttpCredentials`, whose `Debug` output hides the password.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Deserialize)]
pub struct HttpCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for HttpCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SshKeyRecord {
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

/// A secret name with its masked value.
#[derive(Debug, Clone, Serialize)]
pub struct SecretEntry {
    pub name: String,
    pub value: String,
}
