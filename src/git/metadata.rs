//! Repository metadata sidecar.
//!
//! A small JSON record kept at the working-tree root and hidden from version
//! control through `.git/info/exclude`. Written on clone/import, read by every
//! operation that needs remote or transport context.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AppError, Result};

pub const METADATA_FILENAME: &str = ".git-workspace.json";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoMetadata {
    pub repo_id: String,
    pub remote_url: Option<String>,
    pub default_branch: Option<String>,
    pub display_name: Option<String>,
    pub ssh_key_id: Option<String>,
}

/// On-disk shape.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct MetadataFile {
    #[serde(rename = "repoId", default)]
    repo_id: Option<String>,
    #[serde(default)]
    remote: Option<String>,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    ssh_key_id: Option<String>,
}

impl RepoMetadata {
    pub fn new(repo_id: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            ..Default::default()
        }
    }

    /// Read the sidecar of the working tree at `root`.
    ///
    /// A missing file yields `None`. The stored `repoId` is ignored in favor
    /// of the directory name.
    pub fn load(root: &Path) -> Result<Option<Self>> {
        let path = metadata_path(root);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let file: MetadataFile = serde_json::from_str(&raw).map_err(|e| {
            warn!(path = %path.display(), error = %e, "repository metadata has unexpected shape");
            AppError::Internal(format!("repository metadata at {} is corrupt", path.display()))
        })?;

        Ok(Some(Self {
            repo_id: dir_name(root),
            remote_url: file.remote,
            default_branch: file.default_branch,
            display_name: file.name,
            ssh_key_id: file.ssh_key_id,
        }))
    }

    /// Write the sidecar and make sure version control ignores it.
    pub fn save(&self, root: &Path) -> Result<()> {
        let file = MetadataFile {
            repo_id: Some(self.repo_id.clone()),
            remote: self.remote_url.clone(),
            default_branch: self.default_branch.clone(),
            name: self.display_name.clone(),
            ssh_key_id: self.ssh_key_id.clone(),
        };
        let payload = serde_json::to_string_pretty(&file).map_err(|e| AppError::Internal(e.to_string()))?;
        fs::write(metadata_path(root), payload)?;
        ensure_excluded(root)?;
        Ok(())
    }
}

pub fn metadata_path(root: &Path) -> PathBuf {
    root.join(METADATA_FILENAME)
}

/// Append the sidecar name to `.git/info/exclude` once.
pub fn ensure_excluded(root: &Path) -> Result<()> {
    let exclude = root.join(".git").join("info").join("exclude");
    if let Some(parent) = exclude.parent() {
        fs::create_dir_all(parent)?;
    }

    let existing = match fs::read_to_string(&exclude) {
        Ok(existing) => existing,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    if existing.lines().any(|line| line.trim() == METADATA_FILENAME) {
        return Ok(());
    }

    let mut handle = OpenOptions::new().create(true).append(true).open(&exclude)?;
    if !existing.is_empty() && !existing.ends_with('\n') {
        handle.write_all(b"\n")?;
    }
    writeln!(handle, "{}", METADATA_FILENAME)?;
    Ok(())
}

fn dir_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree(name: &str) -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join(name);
        fs::create_dir_all(root.join(".git/info")).unwrap();
        (tmp, root)
    }

    #[test]
    fn save_then_load_uses_directory_name_as_id() {
        let (_tmp, root) = tree("abc123");
        let metadata = RepoMetadata {
            repo_id: "other".to_string(),
            remote_url: Some("https://example.com/r.git".to_string()),
            default_branch: Some("main".to_string()),
            display_name: Some("Demo".to_string()),
            ssh_key_id: None,
        };
        metadata.save(&root).unwrap();

        let loaded = RepoMetadata::load(&root).unwrap().unwrap();
        assert_eq!(loaded.repo_id, "abc123");
        assert_eq!(loaded.remote_url.as_deref(), Some("https://example.com/r.git"));
        assert_eq!(loaded.display_name.as_deref(), Some("Demo"));

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(metadata_path(&root)).unwrap()).unwrap();
        assert_eq!(raw["default_branch"], "main");
        assert!(raw["ssh_key_id"].is_null());
    }

    #[test]
    fn missing_file_is_none() {
        let (_tmp, root) = tree("r");
        assert!(RepoMetadata::load(&root).unwrap().is_none());
    }

    #[test]
    fn unknown_shape_is_rejected() {
        let (_tmp, root) = tree("r");
        fs::write(metadata_path(&root), r#"{"remote": "x", "surprise": 1}"#).unwrap();
        assert!(matches!(RepoMetadata::load(&root), Err(AppError::Internal(_))));

        fs::write(metadata_path(&root), "[]").unwrap();
        assert!(RepoMetadata::load(&root).is_err());
    }

    #[test]
    fn exclude_entry_is_added_once() {
        let (_tmp, root) = tree("r");
        fs::write(root.join(".git/info/exclude"), "# existing").unwrap();

        ensure_excluded(&root).unwrap();
        ensure_excluded(&root).unwrap();
        RepoMetadata::new("r").save(&root).unwrap();

        let content = fs::read_to_string(root.join(".git/info/exclude")).unwrap();
        assert_eq!(content, format!("# existing\n{}\n", METADATA_FILENAME));
    }
}
