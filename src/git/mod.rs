//! Git State Aggregator.
//!
//! `GitRepository` wraps one working tree. Its operations are split by area:
//! - `branches`: list/create/delete/switch
//! - `files`: sandboxed tree listing, read/write, search
//! - `changes`: stage/unstage, status, diff, commit, ahead/behind
//! - `remote`: push/fetch/merge/rebase and transport selection
//! - `lfs`: pointer listing and object retrieval
//! - `suggest`: commit message suggestion
//! - `sync`: offline sync and commit-and-push
//!
//! `cli` holds the subprocess collaborators; `metadata` the per-tree sidecar.

pub mod branches;
pub mod changes;
pub mod cli;
pub mod files;
pub mod lfs;
pub mod metadata;
pub mod remote;
pub mod repository;
pub mod suggest;
pub mod sync;

pub use cli::{GitCommand, LfsTool, TransportEnv, VcsTool};
pub use metadata::RepoMetadata;
pub use repository::{Collaborators, GitRepository};
