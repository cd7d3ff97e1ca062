use std::sync::Arc;

use crate::activity::ActivityLog;
use crate::config::Config;
use crate::error::Result;
use crate::git::{Collaborators, GitCommand, LfsTool, VcsTool};
use crate::registry::RepoRegistry;
use crate::ssh_keys::SshKeyStore;
use crate::vault::SecretVault;

/// Everything request handlers share.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RepoRegistry>,
    pub activity: Arc<ActivityLog>,
}

impl AppState {
    /// Open the stores under the configured data directory and wire them to
    /// the system `git`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let git = Arc::new(GitCommand::new(config.git_binary.clone()));
        Self::with_tools(config, git.clone(), git)
    }

    /// Same as `from_config` with substitute command-line collaborators.
    pub fn with_tools(config: &Config, vcs: Arc<dyn VcsTool>, lfs: Arc<dyn LfsTool>) -> Result<Self> {
        let tools = Collaborators {
            vault: Arc::new(SecretVault::open(config.secrets_dir(), config.secret_key.as_deref())?),
            keys: Arc::new(SshKeyStore::open(config.keys_dir())?),
            vcs,
            lfs,
        };
        Ok(Self {
            registry: Arc::new(RepoRegistry::new(config.repos_dir(), tools)?),
            activity: Arc::new(ActivityLog::open(config.activity_dir())?),
        })
    }

    pub fn vault(&self) -> &SecretVault {
        &self.registry.tools().vault
    }

    pub fn keys(&self) -> &SshKeyStore {
        &self.registry.tools().keys
    }
}
