//! Index and working-tree state: staging, status, diff, commit and the
//! advisory ahead/behind count.

use std::fs;
use std::path::{Path, PathBuf};

use git2::{Diff, DiffFormat, IndexAddOption, Patch, Repository, Signature, Status, StatusOptions, Tree};
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::git::repository::{GitRepository, current_branch};
use crate::models::{AheadBehind, ChangeKind, StatusEntry, WorkingTreeStatus};
use crate::sandbox;

const STAGED_HEADER: &str = "# Staged changes";
const UNSTAGED_HEADER: &str = "# Unstaged changes";

/// One staged file with its patch text.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub path: String,
    pub kind: ChangeKind,
    pub patch: String,
}

impl GitRepository {
    /// Stage paths. A path missing from disk stages its deletion; a
    /// directory stages everything beneath it.
    pub fn stage(&self, paths: &[String]) -> Result<()> {
        let rels = self.resolve_all(paths)?;
        self.with_repo(|repo| stage_paths_in(repo, self.root(), &rels))?;
        debug!(repo_id = %self.repo_id(), count = paths.len(), "staged paths");
        Ok(())
    }

    pub fn unstage(&self, paths: &[String]) -> Result<()> {
        let rels = self.resolve_all(paths)?;
        self.with_repo(|repo| {
            let specs: Vec<String> = rels.iter().map(|rel| pathspec(rel)).collect();
            match repo.head().ok().and_then(|h| h.peel_to_commit().ok()) {
                Some(commit) => repo.reset_default(Some(commit.as_object()), specs.iter().map(String::as_str))?,
                None => {
                    let mut index = repo.index()?;
                    index.read(false)?;
                    index.remove_all(specs.iter().map(String::as_str), None)?;
                    index.write()?;
                }
            }
            Ok(())
        })?;
        debug!(repo_id = %self.repo_id(), count = paths.len(), "unstaged paths");
        Ok(())
    }

    pub fn stage_all(&self) -> Result<()> {
        self.with_repo(stage_all_in)
    }

    pub fn has_staged_changes(&self) -> Result<bool> {
        self.with_repo(has_staged_in)
    }

    pub fn status(&self) -> Result<WorkingTreeStatus> {
        self.with_repo(|repo| {
            let staged = entries(&staged_diff(repo)?);
            let unstaged = entries(&unstaged_diff(repo)?);

            let mut opts = StatusOptions::new();
            opts.include_untracked(true)
                .recurse_untracked_dirs(true)
                .include_ignored(false);
            let untracked = repo
                .statuses(Some(&mut opts))?
                .iter()
                .filter(|s| s.status().contains(Status::WT_NEW))
                .filter_map(|s| {
                    s.path().map(|p| StatusEntry {
                        path: p.to_string(),
                        status: ChangeKind::Untracked,
                    })
                })
                .collect();

            let ahead_behind = self.ahead_behind_in(repo);
            Ok(WorkingTreeStatus {
                branch: current_branch(repo),
                staged,
                unstaged,
                untracked,
                ahead: ahead_behind.ahead,
                behind: ahead_behind.behind,
            })
        })
    }

    /// Staged and unstaged patches under labeled sections. Never fails on an
    /// unchanged tree; returns `""`.
    pub fn diff(&self) -> Result<String> {
        self.with_repo(|repo| {
            let staged = staged_diff(repo).and_then(|d| patch_text(&d)).unwrap_or_default();
            let unstaged = unstaged_diff(repo).and_then(|d| patch_text(&d)).unwrap_or_default();
            Ok(combine_diffs(&staged, &unstaged))
        })
    }

    pub fn staged_files(&self) -> Result<Vec<StagedFile>> {
        self.with_repo(|repo| {
            let diff = staged_diff(repo)?;
            let mut files = Vec::new();
            for (idx, delta) in diff.deltas().enumerate() {
                let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) else {
                    continue;
                };
                let patch = match Patch::from_diff(&diff, idx)? {
                    Some(mut patch) => String::from_utf8_lossy(&patch.to_buf()?).into_owned(),
                    None => String::new(),
                };
                files.push(StagedFile {
                    path: path.to_string_lossy().to_string(),
                    kind: delta.status().into(),
                    patch,
                });
            }
            Ok(files)
        })
    }

    /// Commit the index as `author_name <author_email>`; returns the hash.
    pub fn commit(&self, message: &str, author_name: &str, author_email: &str) -> Result<String> {
        let hash = self.with_repo(|repo| commit_in(repo, message, author_name, author_email))?;
        info!(repo_id = %self.repo_id(), commit = %hash, "created commit");
        Ok(hash)
    }

    /// `(0, 0)` unless the current branch tracks an upstream and the count
    /// succeeds.
    pub fn ahead_behind(&self) -> Result<AheadBehind> {
        self.with_repo(|repo| Ok(self.ahead_behind_in(repo)))
    }

    pub(crate) fn ahead_behind_in(&self, repo: &Repository) -> AheadBehind {
        let Some(upstream) = upstream_name(repo) else {
            return AheadBehind::default();
        };
        match self.tools.vcs.ahead_behind(self.root(), &upstream) {
            Ok((ahead, behind)) => AheadBehind { ahead, behind },
            Err(e) => {
                debug!(repo_id = %self.repo_id(), error = %e, "ahead/behind unavailable");
                AheadBehind::default()
            }
        }
    }

    fn resolve_all(&self, paths: &[String]) -> Result<Vec<PathBuf>> {
        paths
            .iter()
            .map(|p| sandbox::resolve_relative(self.root(), p))
            .collect()
    }
}

pub(crate) fn stage_paths_in(repo: &Repository, root: &Path, rels: &[PathBuf]) -> Result<()> {
    let mut index = repo.index()?;
    index.read(false)?;
    for rel in rels {
        let spec = pathspec(rel);
        match fs::symlink_metadata(root.join(rel)) {
            Ok(meta) if meta.is_dir() => {
                index.add_all([spec.as_str()], IndexAddOption::DEFAULT, None)?;
                index.update_all([spec.as_str()], None)?;
            }
            Ok(_) => index.add_path(rel)?,
            Err(_) => index.remove_all([spec.as_str()], None)?,
        }
    }
    index.write()?;
    Ok(())
}

pub(crate) fn stage_all_in(repo: &Repository) -> Result<()> {
    let mut index = repo.index()?;
    index.read(false)?;
    index.add_all(["*"], IndexAddOption::DEFAULT, None)?;
    index.update_all(["*"], None)?;
    index.write()?;
    Ok(())
}

pub(crate) fn has_staged_in(repo: &Repository) -> Result<bool> {
    let mut index = repo.index()?;
    index.read(false)?;
    match head_tree(repo) {
        Some(tree) => Ok(repo.diff_tree_to_index(Some(&tree), Some(&index), None)?.deltas().len() > 0),
        None => Ok(!index.is_empty()),
    }
}

pub(crate) fn commit_in(repo: &Repository, message: &str, author_name: &str, author_email: &str) -> Result<String> {
    if author_name.trim().is_empty() || author_email.trim().is_empty() {
        return Err(AppError::InvalidArgument(
            "Author name and email are required".to_string(),
        ));
    }
    if !has_staged_in(repo)? {
        return Err(AppError::InvalidArgument("nothing staged to commit".to_string()));
    }

    let signature = Signature::now(author_name, author_email)?;
    let mut index = repo.index()?;
    index.read(false)?;
    let tree = repo.find_tree(index.write_tree()?)?;
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();

    let oid = repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
    Ok(oid.to_string())
}

/// Join non-empty patches under their section headers.
pub fn combine_diffs(staged: &str, unstaged: &str) -> String {
    [(STAGED_HEADER, staged), (UNSTAGED_HEADER, unstaged)]
        .into_iter()
        .filter(|(_, body)| !body.trim().is_empty())
        .map(|(header, body)| format!("{}\n{}", header, body.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn head_tree(repo: &Repository) -> Option<Tree<'_>> {
    repo.head().ok()?.peel_to_tree().ok()
}

fn staged_diff(repo: &Repository) -> Result<Diff<'_>> {
    let mut index = repo.index()?;
    index.read(false)?;
    let tree = head_tree(repo);
    let mut diff = repo.diff_tree_to_index(tree.as_ref(), Some(&index), None)?;
    diff.find_similar(None)?;
    Ok(diff)
}

fn unstaged_diff(repo: &Repository) -> Result<Diff<'_>> {
    let mut index = repo.index()?;
    index.read(false)?;
    Ok(repo.diff_index_to_workdir(Some(&index), None)?)
}

fn entries(diff: &Diff<'_>) -> Vec<StatusEntry> {
    diff.deltas()
        .filter_map(|delta| {
            let path = delta.new_file().path().or_else(|| delta.old_file().path())?;
            Some(StatusEntry {
                path: path.to_string_lossy().to_string(),
                status: delta.status().into(),
            })
        })
        .collect()
}

fn patch_text(diff: &Diff<'_>) -> Result<String> {
    let mut out = Vec::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        if matches!(line.origin(), '+' | '-' | ' ') {
            out.push(line.origin() as u8);
        }
        out.extend_from_slice(line.content());
        true
    })?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn upstream_name(repo: &Repository) -> Option<String> {
    let head = repo.head().ok()?;
    if !head.is_branch() {
        return None;
    }
    let branch = repo.find_branch(head.shorthand()?, git2::BranchType::Local).ok()?;
    let upstream = branch.upstream().ok()?;
    upstream.name().ok().flatten().map(str::to_string)
}

/// Index-style pathspec for a sandbox-relative path; the root becomes `*`.
fn pathspec(rel: &Path) -> String {
    if rel.as_os_str().is_empty() {
        return "*".to_string();
    }
    rel.to_string_lossy().replace('\\', "/")
}
