//! Data transfer objects shared by the core and the HTTP layer.
//!
//! - `repo`: RepoSummary, CloneResult, BranchList, CommitAndPush
//! - `tree`: TreeEntry, SearchHit for working-tree browsing
//! - `status`: WorkingTreeStatus, StatusEntry, ChangeKind, AheadBehind
//! - `credentials`: HttpCredentials, SshKeyRecord, SecretEntry
//! - `lfs`: LfsPointer, LfsContent
//! - `activity`: ActivityEvent

pub mod activity;
pub mod credentials;
pub mod lfs;
pub mod repo;
pub mod status;
pub mod tree;

pub use activity::*;
pub use credentials::*;
pub use lfs::*;
pub use repo::*;
pub use status::*;
pub use tree::*;
