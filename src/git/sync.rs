//! Multi-step flows that hold the repository lock from start to finish.
//!
//! Neither flow is transactional: a failure part-way leaves earlier file
//! writes and staging in place.

use std::collections::BTreeMap;

use tracing::info;

use crate::error::{AppError, Result};
use crate::git::changes::{commit_in, has_staged_in, stage_all_in, stage_paths_in};
use crate::git::repository::GitRepository;
use crate::models::{CommitAndPush, FileChange};
use crate::sandbox;

pub const OFFLINE_MESSAGE: &str = "Offline edits sync";
pub const OFFLINE_AUTHOR_NAME: &str = "Offline Editor";
pub const OFFLINE_AUTHOR_EMAIL: &str = "offline@git-workspace";

impl GitRepository {
    /// Apply edits made while disconnected, then commit them if anything
    /// actually changed. Returns the new commit hash, or `None` for a no-op.
    pub fn sync_offline_changes(
        &self,
        changes: &[FileChange],
        message: Option<&str>,
        author_name: Option<&str>,
        author_email: Option<&str>,
    ) -> Result<Option<String>> {
        // last write per path wins
        let mut latest: BTreeMap<&str, &str> = BTreeMap::new();
        for change in changes {
            latest.insert(&change.path, &change.content);
        }

        let rels = latest
            .keys()
            .map(|path| sandbox::resolve_relative(self.root(), path))
            .collect::<Result<Vec<_>>>()?;

        let hash = self.with_repo(|repo| {
            for (path, content) in &latest {
                self.write_file_locked(path, content)?;
            }
            stage_paths_in(repo, self.root(), &rels)?;

            if !has_staged_in(repo)? {
                return Ok(None);
            }
            let hash = commit_in(
                repo,
                non_blank(message).unwrap_or(OFFLINE_MESSAGE),
                non_blank(author_name).unwrap_or(OFFLINE_AUTHOR_NAME),
                non_blank(author_email).unwrap_or(OFFLINE_AUTHOR_EMAIL),
            )?;
            Ok(Some(hash))
        })?;

        match &hash {
            Some(hash) => info!(repo_id = %self.repo_id(), commit = %hash, files = latest.len(), "synced offline edits"),
            None => info!(repo_id = %self.repo_id(), "offline sync had no changes"),
        }
        Ok(hash)
    }

    /// Stage everything, commit, push.
    pub fn commit_and_push(&self, message: &str, author_name: &str, author_email: &str) -> Result<CommitAndPush> {
        if message.trim().is_empty() {
            return Err(AppError::InvalidArgument("Commit message is required".to_string()));
        }
        self.with_repo(|repo| {
            stage_all_in(repo)?;
            if !has_staged_in(repo)? {
                return Err(AppError::InvalidArgument("No changes to commit".to_string()));
            }
            let commit_hash = commit_in(repo, message, author_name, author_email)?;
            let pushed = self.push_in(repo)?;
            Ok(CommitAndPush { commit_hash, pushed })
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
