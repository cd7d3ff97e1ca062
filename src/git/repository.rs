use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use git2::{ErrorCode, Repository};

use crate::error::{AppError, Result};
use crate::git::cli::{LfsTool, VcsTool};
use crate::git::metadata::RepoMetadata;
use crate::models::RepoSummary;
use crate::ssh_keys::SshKeyStore;
use crate::vault::SecretVault;

/// Process-wide services every working tree consults.
#[derive(Clone)]
pub struct Collaborators {
    pub vault: Arc<SecretVault>,
    pub keys: Arc<SshKeyStore>,
    pub vcs: Arc<dyn VcsTool>,
    pub lfs: Arc<dyn LfsTool>,
}

/// One working tree and its metadata.
///
/// The engine handle sits behind a mutex; every operation, including the
/// subprocess-backed ones, runs while holding it, which serializes all work
/// against the same repository.
pub struct GitRepository {
    repo: Mutex<Repository>,
    root: PathBuf,
    repo_id: String,
    pub(crate) tools: Collaborators,
}

impl GitRepository {
    pub fn open<P: AsRef<Path>>(path: P, tools: Collaborators) -> Result<Self> {
        let path = path.as_ref();
        let repo_id = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let repo = Repository::open(path).map_err(|_| AppError::NotFound(format!("Repository {}", repo_id)))?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| AppError::InvalidArgument(format!("Repository {} has no working tree", repo_id)))?;
        let root = fs::canonicalize(workdir)?;

        Ok(Self {
            repo: Mutex::new(repo),
            root,
            repo_id,
            tools,
        })
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    /// Canonical working-tree root; the sandbox boundary.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn with_repo<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Repository) -> Result<T>,
    {
        let repo = self.repo.lock().map_err(|_| AppError::lock_poisoned())?;
        f(&repo)
    }

    /// Sidecar metadata, or an empty record when the tree has none.
    pub fn metadata(&self) -> Result<RepoMetadata> {
        Ok(RepoMetadata::load(&self.root)?.unwrap_or_else(|| RepoMetadata::new(&self.repo_id)))
    }

    pub fn name(&self) -> Result<String> {
        let metadata = self.metadata()?;
        Ok(metadata
            .display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.repo_id.clone()))
    }

    pub fn current_branch(&self) -> Result<Option<String>> {
        self.with_repo(|repo| Ok(current_branch(repo)))
    }

    pub fn summary(&self) -> Result<RepoSummary> {
        let name = self.name()?;
        self.with_repo(|repo| {
            let ahead_behind = self.ahead_behind_in(repo);
            Ok(RepoSummary {
                repo_id: self.repo_id.clone(),
                name,
                current_branch: current_branch(repo),
                ahead: ahead_behind.ahead,
                behind: ahead_behind.behind,
            })
        })
    }
}

/// Checked-out branch name; `None` when HEAD is detached.
///
/// An unborn branch (no commits yet) still reports the name HEAD points at.
pub(crate) fn current_branch(repo: &Repository) -> Option<String> {
    match repo.head() {
        Ok(head) if head.is_branch() => head.shorthand().map(str::to_string),
        Ok(_) => None,
        Err(e) if e.code() == ErrorCode::UnbornBranch => {
            let head = repo.find_reference("HEAD").ok()?;
            head.symbolic_target()
                .and_then(|target| target.strip_prefix("refs/heads/"))
                .map(str::to_string)
        }
        Err(_) => None,
    }
}
