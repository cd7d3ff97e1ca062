//! Common test utilities and fixtures.
//!
//! Each test file compiles this module separately, so not every helper is
//! used everywhere.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use git2::{Repository, Signature};
use git_workspace::git::{GitRepository, LfsTool, VcsTool};
use git_workspace::{AppError, AppState, Config, Result};
use tempfile::TempDir;

/// One recorded subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: &'static str,
    pub target: String,
    pub refspec: Option<String>,
    pub env: Vec<(String, String)>,
}

/// Stands in for the `git` binary: remembers every call and fakes the
/// side effects the registry depends on.
pub struct RecordingVcs {
    calls: Mutex<Vec<Call>>,
    pub counts: Mutex<(usize, usize)>,
}

impl RecordingVcs {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            counts: Mutex::new((0, 0)),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str, target: &str, refspec: Option<&str>, env: &[(String, String)]) {
        self.calls.lock().unwrap().push(Call {
            op,
            target: target.to_string(),
            refspec: refspec.map(str::to_string),
            env: env.to_vec(),
        });
    }
}

impl VcsTool for RecordingVcs {
    /// Creates a one-commit repository whose `origin` points at `url`.
    /// URLs containing `unreachable` fail the way a dead host would.
    fn clone_repo(&self, url: &str, dest: &Path, env: &[(String, String)]) -> Result<()> {
        self.record("clone", url, None, env);
        if url.contains("unreachable") {
            fs::create_dir_all(dest)?;
            return Err(AppError::Transport("Could not resolve host: unreachable".to_string()));
        }
        let repo = init_repo(dest);
        repo.remote("origin", url).unwrap();
        Ok(())
    }

    fn push(&self, _cwd: &Path, target: &str, refspec: &str, env: &[(String, String)]) -> Result<bool> {
        self.record("push", target, Some(refspec), env);
        Ok(true)
    }

    fn fetch(&self, _cwd: &Path, target: &str, refspec: Option<&str>, env: &[(String, String)]) -> Result<()> {
        self.record("fetch", target, refspec, env);
        Ok(())
    }

    fn merge(&self, _cwd: &Path, from: &str) -> Result<()> {
        self.record("merge", from, None, &[]);
        Ok(())
    }

    fn rebase(&self, _cwd: &Path, onto: &str) -> Result<()> {
        self.record("rebase", onto, None, &[]);
        Ok(())
    }

    fn ahead_behind(&self, _cwd: &Path, upstream: &str) -> Result<(usize, usize)> {
        self.record("ahead_behind", upstream, None, &[]);
        Ok(*self.counts.lock().unwrap())
    }
}

/// LFS tool double. `listing: None` behaves like a server without git-lfs.
pub struct FakeLfs {
    pub listing: Mutex<Option<String>>,
    pub object: Vec<u8>,
    pulls: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl FakeLfs {
    pub fn new() -> Self {
        Self {
            listing: Mutex::new(None),
            object: b"\x00binary-object\xff".to_vec(),
            pulls: Mutex::new(Vec::new()),
        }
    }

    pub fn pulls(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.pulls.lock().unwrap().clone()
    }
}

impl LfsTool for FakeLfs {
    fn ls_files(&self, _cwd: &Path) -> Result<String> {
        self.listing
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::ToolUnavailable("Git LFS is not installed on the server".to_string()))
    }

    /// Replaces an existing pointer with the object bytes; paths that are
    /// not in the tree are left alone, as `git lfs pull` does.
    fn pull(&self, cwd: &Path, path: &str, env: &[(String, String)]) -> Result<()> {
        self.pulls.lock().unwrap().push((path.to_string(), env.to_vec()));
        let target = cwd.join(path);
        if target.is_file() {
            fs::write(target, &self.object)?;
        }
        Ok(())
    }
}

/// A data directory wired to recording fakes.
pub struct TestWorkspace {
    pub state: AppState,
    pub vcs: Arc<RecordingVcs>,
    pub lfs: Arc<FakeLfs>,
    pub config: Config,
    _temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut config = Config::with_data_dir(temp_dir.path().join("data"));
        config.secret_key = Some("test-passphrase".to_string());

        let vcs = Arc::new(RecordingVcs::new());
        let lfs = Arc::new(FakeLfs::new());
        let state = AppState::with_tools(&config, vcs.clone(), lfs.clone()).expect("Failed to build state");

        Self {
            state,
            vcs,
            lfs,
            config,
            _temp_dir: temp_dir,
        }
    }

    pub fn router(&self) -> axum::Router {
        git_workspace::app(self.state.clone())
    }

    pub fn repo_dir(&self, repo_id: &str) -> PathBuf {
        self.config.repos_dir().join(repo_id)
    }

    /// A fresh working tree under `repos/<id>` with one commit holding
    /// `README.md`.
    pub fn create_repo(&self, repo_id: &str) -> Arc<GitRepository> {
        init_repo(&self.repo_dir(repo_id));
        self.state.registry.open(repo_id).expect("Failed to open repository")
    }
}

pub fn signature() -> Signature<'static> {
    Signature::now("Test", "test@example.com").unwrap()
}

/// Initialize `path` and commit `README.md` with `hello\n`.
pub fn init_repo(path: &Path) -> Repository {
    fs::create_dir_all(path).unwrap();
    let repo = Repository::init(path).unwrap();
    fs::write(path.join("README.md"), "hello\n").unwrap();
    commit_all(&repo, "init");
    repo
}

/// Stage every file in the working tree and commit it on HEAD.
pub fn commit_all(repo: &Repository, message: &str) -> git2::Oid {
    let mut index = repo.index().unwrap();
    index.add_all(["*"], git2::IndexAddOption::DEFAULT, None).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    let sig = signature();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents).unwrap()
}

pub fn is_commit_hash(hash: &str) -> bool {
    hash.len() == 40 && hash.chars().all(|c| c.is_ascii_hexdigit())
}
