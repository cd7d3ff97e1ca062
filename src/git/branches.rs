use git2::{BranchType, Repository, build::CheckoutBuilder};
use tracing::info;

use crate::error::{AppError, Result};
use crate::git::repository::{GitRepository, current_branch};
use crate::models::BranchList;

impl GitRepository {
    /// Local branches sorted by name, plus the checked-out one.
    pub fn list_branches(&self) -> Result<BranchList> {
        self.with_repo(|repo| {
            let mut branches: Vec<String> = repo
                .branches(Some(BranchType::Local))?
                .filter_map(|b| b.ok())
                .filter_map(|(branch, _)| branch.name().ok().flatten().map(str::to_string))
                .collect();
            branches.sort();

            Ok(BranchList {
                current: current_branch(repo),
                branches,
            })
        })
    }

    /// Create `name` pointing at whatever `from_ref` resolves to.
    pub fn create_branch(&self, name: &str, from_ref: &str) -> Result<()> {
        self.with_repo(|repo| {
            let target = repo.revparse_single(from_ref)?.peel_to_commit()?;
            repo.branch(name, &target, false)?;
            info!(repo_id = %self.repo_id(), branch = name, from = from_ref, "created branch");
            Ok(())
        })
    }

    /// Force-delete a local branch, merged or not.
    pub fn delete_branch(&self, name: &str) -> Result<()> {
        self.with_repo(|repo| {
            let mut branch = repo.find_branch(name, BranchType::Local)?;
            branch.delete()?;
            info!(repo_id = %self.repo_id(), branch = name, "deleted branch");
            Ok(())
        })
    }

    pub fn switch_branch(&self, name: &str) -> Result<()> {
        self.with_repo(|repo| {
            switch_branch_in(repo, name)?;
            info!(repo_id = %self.repo_id(), branch = name, "switched branch");
            Ok(())
        })
    }
}

/// Check out a local branch, creating it from `<remote>/<name>` when only the
/// remote-tracking branch exists.
pub(crate) fn switch_branch_in(repo: &Repository, name: &str) -> Result<()> {
    let branch = match repo.find_branch(name, BranchType::Local) {
        Ok(branch) => branch,
        Err(e) if e.code() == git2::ErrorCode::NotFound => create_tracking_branch(repo, name)?,
        Err(e) => return Err(e.into()),
    };

    let reference = branch.into_reference();
    let refname = reference
        .name()
        .ok_or_else(|| AppError::Engine(format!("branch {} has an invalid name", name)))?
        .to_string();
    let commit = reference.peel_to_commit()?;

    repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().safe()))?;
    repo.set_head(&refname)?;
    Ok(())
}

fn create_tracking_branch<'r>(repo: &'r Repository, name: &str) -> Result<git2::Branch<'r>> {
    for remote in repo.remotes()?.iter().flatten() {
        let remote_name = format!("{}/{}", remote, name);
        let Ok(remote_branch) = repo.find_branch(&remote_name, BranchType::Remote) else {
            continue;
        };
        let commit = remote_branch.get().peel_to_commit()?;
        let mut local = repo.branch(name, &commit, false)?;
        local.set_upstream(Some(&remote_name))?;
        return Ok(local);
    }
    Err(AppError::Engine(format!(
        "pathspec '{}' did not match any branch known to git",
        name
    )))
}
