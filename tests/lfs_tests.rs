//! LFS pointer discovery and object retrieval.

mod common;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use common::TestWorkspace;
use git_workspace::AppError;
use git_workspace::git::GitRepository;

const POINTER: &str = "version https://git-lfs.github.com/spec/v1\noid sha256:abc123\nsize 42\n";

fn track_bin_files(repo: &GitRepository) {
    repo.write_file(".gitattributes", "*.bin filter=lfs diff=lfs merge=lfs -text\n")
        .unwrap();
    repo.write_file("assets/model.bin", POINTER).unwrap();
    repo.write_file("assets/notes.bin", "not a pointer\n").unwrap();
    repo.write_file("readme.txt", POINTER).unwrap();
    repo.stage_all().unwrap();
}

#[test]
fn falls_back_to_attributes_without_the_tool() {
    let ws = TestWorkspace::new();
    let repo = ws.create_repo("r1");
    track_bin_files(&repo);

    let pointers = repo.lfs_list().unwrap();
    assert_eq!(pointers.len(), 1);
    let pointer = &pointers[0];
    assert_eq!(pointer.path, "assets/model.bin");
    assert_eq!(pointer.oid.as_deref(), Some("abc123"));
    assert_eq!(pointer.size, Some(42));
    assert!(pointer.tracked);
    assert_eq!(pointer.present, Some(false));
}

#[test]
fn empty_or_garbled_tool_output_also_falls_back() {
    let ws = TestWorkspace::new();
    let repo = ws.create_repo("r1");
    track_bin_files(&repo);

    *ws.lfs.listing.lock().unwrap() = Some(String::new());
    assert_eq!(repo.lfs_list().unwrap().len(), 1);

    *ws.lfs.listing.lock().unwrap() = Some("Git LFS: (0 of 1 files)".to_string());
    assert_eq!(repo.lfs_list().unwrap().len(), 1);
}

#[test]
fn tool_listing_wins_when_it_reports_files() {
    let ws = TestWorkspace::new();
    let repo = ws.create_repo("r1");
    track_bin_files(&repo);
    *ws.lfs.listing.lock().unwrap() =
        Some(r#"{"files":[{"name":"video.mp4","oid":"ffee","size":1024,"downloaded":true}]}"#.to_string());

    let pointers = repo.lfs_list().unwrap();
    assert_eq!(pointers.len(), 1);
    assert_eq!(pointers[0].path, "video.mp4");
    assert_eq!(pointers[0].size, Some(1024));
    assert_eq!(pointers[0].present, Some(true));
}

#[test]
fn no_attributes_means_no_pointers() {
    let ws = TestWorkspace::new();
    let repo = ws.create_repo("r1");
    assert!(repo.lfs_list().unwrap().is_empty());
}

#[test]
fn fetch_returns_object_bytes_as_base64() {
    let ws = TestWorkspace::new();
    let repo = ws.create_repo("r1");
    track_bin_files(&repo);

    let content = repo.lfs_fetch("assets/model.bin").unwrap();
    assert_eq!(content.encoding, "base64");
    assert_eq!(content.size, ws.lfs.object.len() as u64);
    assert_eq!(STANDARD.decode(&content.content).unwrap(), ws.lfs.object);

    let pulls = ws.lfs.pulls();
    assert_eq!(pulls.len(), 1);
    assert_eq!(pulls[0].0, "assets/model.bin");
    assert!(pulls[0].1.is_empty());
}

#[test]
fn fetch_outside_the_tree_never_reaches_the_tool() {
    let ws = TestWorkspace::new();
    let repo = ws.create_repo("r1");

    assert!(matches!(repo.lfs_fetch("../secret.bin"), Err(AppError::PathEscape(_))));
    assert!(ws.lfs.pulls().is_empty());
}

#[test]
fn fetch_of_a_path_the_tool_did_not_materialize_is_not_found() {
    let ws = TestWorkspace::new();
    let repo = ws.create_repo("r1");

    assert!(matches!(repo.lfs_fetch("assets/missing.bin"), Err(AppError::NotFound(_))));
    assert_eq!(ws.lfs.pulls().len(), 1);
}
