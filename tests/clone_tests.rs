//! End-to-end transport through the system `git` against a local bare remote.
//!
//! Skipped when no `git` executable is on the PATH.

mod common;

use std::process::Command;

use git_workspace::models::CloneRequest;
use git_workspace::{AppError, AppState, Config};
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

/// A bare remote seeded with one commit.
fn bare_remote(tmp: &TempDir) -> String {
    let seed = tmp.path().join("seed");
    common::init_repo(&seed);
    let bare = tmp.path().join("origin.git");
    let status = Command::new("git")
        .args(["clone", "--bare", "--quiet"])
        .arg(&seed)
        .arg(&bare)
        .status()
        .unwrap();
    assert!(status.success());
    bare.to_string_lossy().to_string()
}

#[test]
fn clone_commit_push_round_trip() {
    if !git_available() {
        return;
    }
    let tmp = TempDir::new().unwrap();
    let url = bare_remote(&tmp);
    let config = Config::with_data_dir(tmp.path().join("data"));
    let state = AppState::from_config(&config).unwrap();

    let cloned = state
        .registry
        .clone_repo(&CloneRequest {
            url: url.clone(),
            branch: None,
            auth: None,
            ssh_key_id: None,
        })
        .unwrap();
    assert!(cloned.branches.contains(&cloned.default_branch));

    let repo = state.registry.open(&cloned.repo_id).unwrap();
    assert_eq!(repo.read_file("README.md").unwrap(), "hello\n");
    assert_eq!(repo.metadata().unwrap().remote_url.as_deref(), Some(url.as_str()));

    repo.write_file("CHANGELOG.md", "- first\n").unwrap();
    repo.stage(&["CHANGELOG.md".to_string()]).unwrap();
    repo.commit("changelog", "T", "t@example.com").unwrap();
    assert_eq!(repo.ahead_behind().unwrap().ahead, 1);

    assert!(repo.push().unwrap());
    assert_eq!(repo.ahead_behind().unwrap().ahead, 0);
    assert!(!repo.push().unwrap());

    repo.fetch().unwrap();
    let summary = repo.summary().unwrap();
    assert_eq!((summary.ahead, summary.behind), (0, 0));
}

#[test]
fn unknown_branch_on_clone_fails_and_cleans_up() {
    if !git_available() {
        return;
    }
    let tmp = TempDir::new().unwrap();
    let url = bare_remote(&tmp);
    let config = Config::with_data_dir(tmp.path().join("data"));
    let state = AppState::from_config(&config).unwrap();

    let result = state.registry.clone_repo(&CloneRequest {
        url,
        branch: Some("does-not-exist".to_string()),
        auth: None,
        ssh_key_id: None,
    });
    assert!(result.is_err());
    assert_eq!(std::fs::read_dir(config.repos_dir()).unwrap().count(), 0);
}

#[test]
fn merge_source_is_resolved_before_git_runs() {
    if !git_available() {
        return;
    }
    let tmp = TempDir::new().unwrap();
    let url = bare_remote(&tmp);
    let config = Config::with_data_dir(tmp.path().join("data"));
    let state = AppState::from_config(&config).unwrap();
    let cloned = state
        .registry
        .clone_repo(&CloneRequest {
            url,
            branch: None,
            auth: None,
            ssh_key_id: None,
        })
        .unwrap();
    let repo = state.registry.open(&cloned.repo_id).unwrap();

    let marker = tmp.path().join("marker");
    let hostile = format!("--exec=touch {}", marker.display());
    assert!(matches!(
        repo.merge_or_rebase(&hostile, "rebase"),
        Err(AppError::InvalidArgument(_))
    ));
    assert!(!marker.exists());

    let upstream = format!("origin/{}", cloned.default_branch);
    assert_eq!(repo.merge_or_rebase(&upstream, "merge").unwrap(), "merged");
}
