//! Repository Registry.
//!
//! Owns the `repos/` directory: generates ids, opens working trees by id and
//! hands out one shared `GitRepository` per id so every caller goes through
//! the same lock. Clone and zip import create new trees here.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use git2::{IndexAddOption, Repository, Signature};
use rand::Rng;
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::git::branches::switch_branch_in;
use crate::git::metadata::RepoMetadata;
use crate::git::remote::{embed_credentials, is_http_url, is_ssh_url, sanitize_url};
use crate::git::repository::current_branch;
use crate::git::{Collaborators, GitRepository};
use crate::import;
use crate::models::{CloneRequest, CloneResult, RepoSummary};

const ID_LENGTH: usize = 10;
const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

const IMPORT_MESSAGE: &str = "Initial import";
const IMPORT_AUTHOR_NAME: &str = "Imported";
const IMPORT_AUTHOR_EMAIL: &str = "import@local";

/// Ids name directories; anything that could leave `repos/` is refused.
pub fn is_valid_repo_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub struct RepoRegistry {
    base_path: PathBuf,
    tools: Collaborators,
    open_repos: Mutex<HashMap<String, Arc<GitRepository>>>,
}

impl RepoRegistry {
    pub fn new<P: AsRef<Path>>(base_path: P, tools: Collaborators) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            tools,
            open_repos: Mutex::new(HashMap::new()),
        })
    }

    pub fn tools(&self) -> &Collaborators {
        &self.tools
    }

    /// A fresh id whose directory does not exist yet.
    pub fn generate_repo_id(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let id: String = (0..ID_LENGTH)
                .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
                .collect();
            if !self.base_path.join(&id).exists() {
                return id;
            }
        }
    }

    pub fn open(&self, repo_id: &str) -> Result<Arc<GitRepository>> {
        let not_found = || AppError::NotFound(format!("Repository {}", repo_id));
        if !is_valid_repo_id(repo_id) {
            return Err(not_found());
        }
        let path = self.base_path.join(repo_id);

        let mut open_repos = self.open_repos.lock().map_err(|_| AppError::lock_poisoned())?;
        if !path.is_dir() {
            open_repos.remove(repo_id);
            return Err(not_found());
        }
        if let Some(repo) = open_repos.get(repo_id) {
            return Ok(Arc::clone(repo));
        }

        let repo = Arc::new(GitRepository::open(&path, self.tools.clone())?);
        open_repos.insert(repo_id.to_string(), Arc::clone(&repo));
        Ok(repo)
    }

    /// Every openable working tree, sorted by id.
    pub fn list(&self) -> Result<Vec<RepoSummary>> {
        let mut ids: Vec<String> = fs::read_dir(&self.base_path)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|id| is_valid_repo_id(id))
            .collect();
        ids.sort();

        Ok(ids
            .iter()
            .filter_map(|id| match self.open(id).and_then(|repo| repo.summary()) {
                Ok(summary) => Some(summary),
                Err(e) => {
                    warn!(repo_id = %id, error = %e, "skipping unreadable repository");
                    None
                }
            })
            .collect())
    }

    pub fn clone_repo(&self, request: &CloneRequest) -> Result<CloneResult> {
        let url = request.url.trim();
        if url.is_empty() {
            return Err(AppError::InvalidArgument("Repository URL is required".to_string()));
        }
        if url.starts_with('-') {
            return Err(AppError::InvalidArgument(format!("Invalid repository URL: {}", sanitize_url(url))));
        }

        let repo_id = self.generate_repo_id();
        let target = self.base_path.join(&repo_id);

        let result = self.clone_into(&repo_id, &target, url, request);
        if result.is_err() {
            remove_partial(&target);
        }
        let result = result?;
        info!(repo_id = %repo_id, url = %sanitize_url(url), "cloned repository");
        Ok(result)
    }

    fn clone_into(&self, repo_id: &str, target: &Path, url: &str, request: &CloneRequest) -> Result<CloneResult> {
        let http_auth = request.auth.as_ref().filter(|_| is_http_url(url));
        let clone_url = match http_auth {
            Some(credentials) => embed_credentials(url, credentials)?,
            None => url.to_string(),
        };

        let ssh_key_id = request
            .ssh_key_id
            .as_deref()
            .filter(|id| !id.is_empty() && is_ssh_url(url));
        let env = ssh_key_id
            .and_then(|id| self.tools.keys.transport_env(id))
            .unwrap_or_default();
        let applied_key = ssh_key_id.filter(|_| !env.is_empty());

        self.tools.vcs.clone_repo(&clone_url, target, &env)?;

        let default_branch = {
            let repo = Repository::open(target)?;
            if http_auth.is_some() {
                repo.remote_set_url("origin", url)?;
            }
            if let Some(branch) = request.branch.as_deref().filter(|b| !b.is_empty()) {
                switch_branch_in(&repo, branch)?;
            }
            current_branch(&repo)
        };
        if let Some(credentials) = http_auth {
            self.tools.vault.store_http_credentials(repo_id, credentials)?;
        }

        RepoMetadata {
            repo_id: repo_id.to_string(),
            remote_url: Some(url.to_string()),
            default_branch: default_branch.clone(),
            display_name: None,
            ssh_key_id: applied_key.map(str::to_string),
        }
        .save(target)?;

        self.describe(repo_id, default_branch)
    }

    /// Create a repository from an uploaded zip archive.
    pub fn import_zip(&self, bytes: &[u8], file_name: &str, display_name: Option<&str>) -> Result<CloneResult> {
        let repo_id = self.generate_repo_id();
        let target = self.base_path.join(&repo_id);
        fs::create_dir_all(&target)?;

        let result = self.import_into(&repo_id, &target, bytes, file_name, display_name);
        if result.is_err() {
            remove_partial(&target);
        }
        let result = result?;
        info!(repo_id = %repo_id, file_name, "imported archive");
        Ok(result)
    }

    fn import_into(
        &self,
        repo_id: &str,
        target: &Path,
        bytes: &[u8],
        file_name: &str,
        display_name: Option<&str>,
    ) -> Result<CloneResult> {
        let top_level = import::extract_archive(bytes, target)?;
        import::remove_platform_debris(target)?;
        import::validate_tree(target)?;
        let lifted = import::flatten_single_directory(target)?;

        let name = display_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or(lifted)
            .or_else(|| match top_level.len() {
                1 => top_level.iter().next().cloned(),
                _ => None,
            })
            .or_else(|| {
                Path::new(file_name)
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .filter(|s| !s.is_empty())
            })
            .unwrap_or_else(|| repo_id.to_string());

        let (remote_url, default_branch) = if target.join(".git").exists() {
            let repo = Repository::open(target)?;
            (default_remote_url(&repo), current_branch(&repo))
        } else {
            let repo = Repository::init(target)?;
            initial_commit(&repo)?;
            (None, current_branch(&repo))
        };

        RepoMetadata {
            repo_id: repo_id.to_string(),
            remote_url,
            default_branch: default_branch.clone(),
            display_name: Some(name),
            ssh_key_id: None,
        }
        .save(target)?;

        self.describe(repo_id, default_branch)
    }

    fn describe(&self, repo_id: &str, default_branch: Option<String>) -> Result<CloneResult> {
        let repo = self.open(repo_id)?;
        Ok(CloneResult {
            repo_id: repo_id.to_string(),
            name: repo.name()?,
            default_branch: default_branch.unwrap_or_default(),
            branches: repo.list_branches()?.branches,
        })
    }
}

/// Stage everything and commit as the importer, even when the tree is empty.
fn initial_commit(repo: &Repository) -> Result<()> {
    let mut index = repo.index()?;
    index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
    index.write()?;
    let tree = repo.find_tree(index.write_tree()?)?;
    let signature = Signature::now(IMPORT_AUTHOR_NAME, IMPORT_AUTHOR_EMAIL)?;
    repo.commit(Some("HEAD"), &signature, &signature, IMPORT_MESSAGE, &tree, &[])?;
    Ok(())
}

fn default_remote_url(repo: &Repository) -> Option<String> {
    let remotes = repo.remotes().ok()?;
    let name = remotes
        .iter()
        .flatten()
        .find(|n| *n == "origin")
        .or_else(|| remotes.iter().flatten().next())?;
    repo.find_remote(name).ok()?.url().map(str::to_string)
}

fn remove_partial(target: &Path) {
    if let Err(e) = fs::remove_dir_all(target) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %target.display(), error = %e, "failed to remove partial repository");
        }
    }
}
