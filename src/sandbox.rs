//! Path sandbox for working-tree access.
//!
//! Every path supplied by a caller is resolved here before the filesystem is
//! touched. Resolution follows symlinks (including dangling ones) and `..`
//! segments against the canonical root, so the containment check runs on the
//! real location rather than on the spelling of the request. Components that do
//! not exist yet are resolved lexically, which lets writes create new files.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{AppError, Result};

const MAX_LINK_DEPTH: usize = 40;

/// Resolve `relative` against `root`, rejecting anything outside it.
///
/// `None`, `""` and `"."` resolve to the canonical root itself.
pub fn resolve(root: &Path, relative: Option<&str>) -> Result<PathBuf> {
    let root = canonical_root(root)?;

    let relative = match relative {
        None => return Ok(root),
        Some(p) if p.is_empty() || p == "." => return Ok(root),
        Some(p) => p,
    };

    let resolved = resolve_components(root.clone(), Path::new(relative), 0)?;
    if resolved.starts_with(&root) {
        Ok(resolved)
    } else {
        Err(AppError::PathEscape(relative.to_string()))
    }
}

/// Check `relative` against the sandbox and return it relative to the root,
/// as the index expects.
///
/// Containment is decided on the fully resolved location, but the returned
/// path is the caller's spelling with `.` and `..` folded lexically, so a
/// symlink names the link itself rather than its target.
pub fn resolve_relative(root: &Path, relative: &str) -> Result<PathBuf> {
    let root_canonical = canonical_root(root)?;
    let resolved = resolve(&root_canonical, Some(relative))?;
    let escape = || AppError::PathEscape(relative.to_string());

    if Path::new(relative).is_absolute() {
        return resolved
            .strip_prefix(&root_canonical)
            .map(Path::to_path_buf)
            .map_err(|_| escape());
    }

    let mut lexical = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !lexical.pop() {
                    return Err(escape());
                }
            }
            Component::Normal(name) => lexical.push(name),
            Component::RootDir | Component::Prefix(_) => return Err(escape()),
        }
    }
    Ok(lexical)
}

fn canonical_root(root: &Path) -> Result<PathBuf> {
    fs::canonicalize(root).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => AppError::NotFound(root.display().to_string()),
        _ => AppError::Io(e),
    })
}

fn resolve_components(mut resolved: PathBuf, relative: &Path, depth: usize) -> io::Result<PathBuf> {
    for component in relative.components() {
        match component {
            Component::Prefix(prefix) => resolved = PathBuf::from(prefix.as_os_str()),
            Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(name) => {
                let next = resolved.join(name);
                match fs::symlink_metadata(&next) {
                    Ok(meta) if meta.file_type().is_symlink() => {
                        if depth >= MAX_LINK_DEPTH {
                            return Err(io::Error::other("too many levels of symbolic links"));
                        }
                        let target = fs::read_link(&next)?;
                        resolved = resolve_components(resolved, &target, depth + 1)?;
                    }
                    Ok(_) => resolved = next,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => resolved = next,
                    Err(e) => return Err(e),
                }
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("repo");
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/lib.rs"), "fn main() {}").unwrap();
        (tmp, root)
    }

    #[test]
    fn empty_and_dot_resolve_to_root() {
        let (_tmp, root) = setup();
        let canonical = fs::canonicalize(&root).unwrap();
        assert_eq!(resolve(&root, None).unwrap(), canonical);
        assert_eq!(resolve(&root, Some("")).unwrap(), canonical);
        assert_eq!(resolve(&root, Some(".")).unwrap(), canonical);
    }

    #[test]
    fn existing_and_new_paths_stay_inside() {
        let (_tmp, root) = setup();
        let canonical = fs::canonicalize(&root).unwrap();
        assert_eq!(
            resolve(&root, Some("src/lib.rs")).unwrap(),
            canonical.join("src/lib.rs")
        );
        assert_eq!(
            resolve(&root, Some("new/dir/file.txt")).unwrap(),
            canonical.join("new/dir/file.txt")
        );
        assert_eq!(
            resolve(&root, Some("missing/../src/./lib.rs")).unwrap(),
            canonical.join("src/lib.rs")
        );
    }

    #[test]
    fn dotdot_escape_is_rejected() {
        let (_tmp, root) = setup();
        for path in ["..", "../outside.txt", "src/../../x", "a/b/../../../x"] {
            let err = resolve(&root, Some(path)).unwrap_err();
            assert!(matches!(err, AppError::PathEscape(_)), "{path} should escape");
        }
    }

    #[test]
    fn absolute_path_is_rejected() {
        let (_tmp, root) = setup();
        let err = resolve(&root, Some("/etc/passwd")).unwrap_err();
        assert!(matches!(err, AppError::PathEscape(_)));
    }

    #[test]
    fn sibling_with_shared_prefix_is_rejected() {
        let (tmp, root) = setup();
        fs::create_dir_all(tmp.path().join("repo2")).unwrap();
        let err = resolve(&root, Some("../repo2/file")).unwrap_err();
        assert!(matches!(err, AppError::PathEscape(_)));
    }

    #[test]
    fn relative_form_strips_root() {
        let (_tmp, root) = setup();
        assert_eq!(
            resolve_relative(&root, "src/../src/lib.rs").unwrap(),
            PathBuf::from("src/lib.rs")
        );
    }

    #[cfg(unix)]
    #[test]
    fn relative_form_keeps_symlink_names() {
        let (_tmp, root) = setup();
        std::os::unix::fs::symlink("src/lib.rs", root.join("link")).unwrap();
        assert_eq!(resolve_relative(&root, "link").unwrap(), PathBuf::from("link"));
        assert_eq!(resolve_relative(&root, "./src/../link").unwrap(), PathBuf::from("link"));
        assert!(matches!(
            resolve_relative(&root, "src/../../x"),
            Err(AppError::PathEscape(_))
        ));
    }

    #[test]
    fn missing_root_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = resolve(&tmp.path().join("nope"), Some("a")).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_rejected() {
        let (tmp, root) = setup();
        let outside = tmp.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        let err = resolve(&root, Some("link/secret.txt")).unwrap_err();
        assert!(matches!(err, AppError::PathEscape(_)));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_escape_is_rejected() {
        let (tmp, root) = setup();
        std::os::unix::fs::symlink(tmp.path().join("not-yet"), root.join("dangling")).unwrap();

        let err = resolve(&root, Some("dangling")).unwrap_err();
        assert!(matches!(err, AppError::PathEscape(_)));
    }

    #[cfg(unix)]
    #[test]
    fn internal_symlink_is_allowed() {
        let (_tmp, root) = setup();
        std::os::unix::fs::symlink("src", root.join("alias")).unwrap();
        let canonical = fs::canonicalize(&root).unwrap();
        assert_eq!(
            resolve(&root, Some("alias/lib.rs")).unwrap(),
            canonical.join("src/lib.rs")
        );
    }
}
