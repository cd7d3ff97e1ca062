//! Zip archive extraction for repository import.
//!
//! Members are validated and written one by one; nothing from the archive is
//! trusted to stay inside the destination on its own.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;
use zip::ZipArchive;

use crate::error::{AppError, Result};
use crate::sandbox;

const IGNORED_ROOT: &str = "__MACOSX";
const FINDER_METADATA: &str = ".DS_Store";

/// Extract `bytes` into `dest`, returning the distinct top-level names.
pub fn extract_archive(bytes: &[u8], dest: &Path) -> Result<BTreeSet<String>> {
    if bytes.is_empty() {
        return Err(AppError::InvalidArgument("Zip file is empty".to_string()));
    }
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|_| AppError::InvalidArgument("Invalid zip archive".to_string()))?;

    let mut top_level = BTreeSet::new();
    for i in 0..archive.len() {
        let mut member = archive
            .by_index(i)
            .map_err(|_| AppError::InvalidArgument("Invalid zip archive".to_string()))?;
        let name = member.name().to_string();
        let parts = member_parts(&name)?;
        let Some(first) = parts.first() else {
            continue;
        };
        if first == IGNORED_ROOT {
            continue;
        }
        top_level.insert(first.clone());

        let target = parts.iter().fold(dest.to_path_buf(), |path, part| path.join(part));
        if member.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&target)?;
        io::copy(&mut member, &mut out)?;
    }
    debug!(dest = %dest.display(), entries = archive.len(), "extracted archive");
    Ok(top_level)
}

/// Normalized components of a member name. Absolute names and any `..`
/// are rejected; empty and `.` segments are dropped.
fn member_parts(name: &str) -> Result<Vec<String>> {
    let normalized = name.replace('\\', "/");
    let is_absolute = normalized.starts_with('/')
        || normalized.as_bytes().get(1) == Some(&b':') && normalized.as_bytes()[0].is_ascii_alphabetic();
    if is_absolute {
        return Err(AppError::InvalidArgument("Zip file contains absolute paths".to_string()));
    }

    let mut parts = Vec::new();
    for part in normalized.split('/') {
        match part {
            "" | "." => {}
            ".." => return Err(AppError::InvalidArgument("Zip file contains unsafe paths".to_string())),
            other => parts.push(other.to_string()),
        }
    }
    Ok(parts)
}

/// Remove `__MACOSX` and every `.DS_Store` under `root`.
pub fn remove_platform_debris(root: &Path) -> Result<()> {
    let macos = root.join(IGNORED_ROOT);
    if macos.is_dir() {
        fs::remove_dir_all(&macos)?;
    }
    for path in walk(root)? {
        if path.file_name().is_some_and(|n| n == FINDER_METADATA) && path.is_file() {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Re-check every extracted path against the sandbox.
pub fn validate_tree(root: &Path) -> Result<()> {
    for path in walk(root)? {
        let rel = path
            .strip_prefix(root)
            .map_err(|_| AppError::InvalidArgument("Zip file contains invalid paths".to_string()))?;
        sandbox::resolve(root, Some(&rel.to_string_lossy()))
            .map_err(|_| AppError::InvalidArgument("Zip file contains invalid paths".to_string()))?;
    }
    Ok(())
}

/// When the root holds exactly one directory, lift its contents up one
/// level and return the directory's name.
pub fn flatten_single_directory(root: &Path) -> Result<Option<String>> {
    let entries: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.file_name().is_some_and(|n| n != IGNORED_ROOT))
        .collect();

    let [inner] = entries.as_slice() else {
        return Ok(None);
    };
    let inner_name = inner
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if !inner.is_dir() || inner_name == ".git" {
        return Ok(None);
    }

    // Park the directory under a unique name so a child sharing its name can move up.
    let parked = root.join(format!(".import-{}", Uuid::new_v4().simple()));
    fs::rename(inner, &parked)?;
    for child in fs::read_dir(&parked)? {
        let child = child?;
        fs::rename(child.path(), root.join(child.file_name()))?;
    }
    fs::remove_dir(&parked)?;
    Ok(Some(inner_name))
}

/// Every file and directory below `root`, depth first. Symlinks are not
/// followed.
fn walk(root: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                stack.push(path.clone());
            }
            out.push(path);
        }
    }
    Ok(out)
}
