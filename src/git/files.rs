//! Working-tree file access.
//!
//! Every path goes through `sandbox::resolve` before the filesystem is
//! touched; nothing here joins caller input onto the root by hand.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{AppError, Result};
use crate::git::repository::GitRepository;
use crate::models::{EntryType, SearchHit, TreeEntry};
use crate::sandbox;

impl GitRepository {
    /// List one directory of the working tree.
    ///
    /// Directories come first, then files, each case-insensitively by name.
    /// A missing directory lists as empty. `.git` is never shown.
    pub fn tree(&self, path: Option<&str>) -> Result<Vec<TreeEntry>> {
        let dir = sandbox::resolve(self.root(), path)?;
        self.with_repo(|_repo| {
            let read_dir = match fs::read_dir(&dir) {
                Ok(read_dir) => read_dir,
                Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
                    return Ok(Vec::new());
                }
                Err(e) => return Err(e.into()),
            };

            let mut entries = Vec::new();
            for entry in read_dir {
                let entry = entry?;
                let name = entry.file_name().to_string_lossy().to_string();
                if name == ".git" {
                    continue;
                }
                let metadata = entry.metadata()?;
                if metadata.is_dir() {
                    entries.push(TreeEntry {
                        entry_type: EntryType::Dir,
                        name,
                        size: None,
                    });
                } else {
                    entries.push(TreeEntry {
                        entry_type: EntryType::File,
                        name,
                        size: Some(metadata.len()),
                    });
                }
            }

            entries.sort_by(|a, b| match (a.entry_type, b.entry_type) {
                (EntryType::Dir, EntryType::File) => std::cmp::Ordering::Less,
                (EntryType::File, EntryType::Dir) => std::cmp::Ordering::Greater,
                _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            });
            Ok(entries)
        })
    }

    pub fn read_file(&self, path: &str) -> Result<String> {
        let bytes = self.read_file_bytes(path)?;
        String::from_utf8(bytes).map_err(|_| AppError::InvalidArgument(format!("{} is not a text file", path)))
    }

    pub fn read_file_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let target = sandbox::resolve(self.root(), Some(path))?;
        self.with_repo(|_repo| read_existing(&target, path))
    }

    /// Write `content`, creating parent directories as needed.
    pub fn write_file(&self, path: &str, content: &str) -> Result<()> {
        self.with_repo(|_repo| self.write_file_locked(path, content))?;
        debug!(repo_id = %self.repo_id(), path, "wrote file");
        Ok(())
    }

    /// Plain substring scan over every tracked file, line by line.
    pub fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.with_repo(|repo| {
            let mut index = repo.index()?;
            index.read(false)?;

            let mut hits = Vec::new();
            for entry in index.iter() {
                let rel = String::from_utf8_lossy(&entry.path).to_string();
                let Ok(full) = sandbox::resolve(self.root(), Some(&rel)) else {
                    continue;
                };
                let Ok(bytes) = fs::read(&full) else {
                    continue;
                };
                let text = String::from_utf8_lossy(&bytes);
                for (number, line) in text.lines().enumerate() {
                    if line.contains(query) {
                        hits.push(SearchHit {
                            path: rel.clone(),
                            line: number + 1,
                            preview: line.trim().to_string(),
                        });
                    }
                }
            }
            Ok(hits)
        })
    }

    /// Resolve and write without taking the repository lock; the caller holds it.
    pub(crate) fn write_file_locked(&self, path: &str, content: &str) -> Result<PathBuf> {
        let target = sandbox::resolve(self.root(), Some(path))?;
        if inside_git_dir(self.root(), &target) {
            return Err(AppError::PathEscape(path.to_string()));
        }
        write_resolved(&target, content)?;
        Ok(target)
    }
}

pub(crate) fn read_existing(target: &Path, display: &str) -> Result<Vec<u8>> {
    match fs::read(target) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(AppError::NotFound(display.to_string())),
        Err(e) if e.kind() == io::ErrorKind::IsADirectory => {
            Err(AppError::InvalidArgument(format!("{} is a directory", display)))
        }
        Err(e) => Err(e.into()),
    }
}

fn write_resolved(target: &Path, content: &str) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(target, content)?;
    Ok(())
}

fn inside_git_dir(root: &Path, target: &Path) -> bool {
    target
        .strip_prefix(root)
        .ok()
        .and_then(|rel| rel.components().next())
        .is_some_and(|first| first == Component::Normal(".git".as_ref()))
}
