//! Commit message suggestion from the staged changes.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{AppError, Result};
use crate::git::changes::StagedFile;
use crate::git::repository::GitRepository;
use crate::models::ChangeKind;

const DOC_EXTENSIONS: &[&str] = &["md", "rst", "txt", "markdown", "adoc"];
const CONFIG_EXTENSIONS: &[&str] = &["json", "yml", "yaml", "toml", "ini", "cfg", "conf", "env", "properties"];
const ASSET_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "bmp", "mp3", "wav", "mp4", "mov", "avi", "ttf", "otf",
    "woff", "woff2",
];
const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "jsx", "ts", "tsx", "java", "c", "cpp", "cs", "go", "rb", "rs", "php", "swift", "kt", "m", "scala",
    "sh", "bash", "ps1", "html", "htm", "css",
];
const CODE_MARKERS: &[&str] = &[
    ";", "{", "}", "=>", "()", " def ", "function ", "class ", "return", " if ", " for ", " while ",
];

/// Summary categories, in the order they are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Category {
    Code,
    Docs,
    Tests,
    Config,
    Assets,
}

impl Category {
    fn label(self) -> &'static str {
        match self {
            Category::Code => "code changes",
            Category::Docs => "docs / text changes",
            Category::Tests => "tests updated",
            Category::Config => "config updates",
            Category::Assets => "asset updates",
        }
    }
}

impl GitRepository {
    pub fn suggest_commit_message(&self) -> Result<String> {
        suggest(&self.staged_files()?)
    }
}

pub fn suggest(files: &[StagedFile]) -> Result<String> {
    let no_changes = || AppError::InvalidArgument("No staged changes to summarize".to_string());
    if files.is_empty() {
        return Err(no_changes());
    }

    let mut paths: Vec<&str> = Vec::new();
    let mut categories = BTreeSet::new();
    let mut kinds = BTreeSet::new();
    for file in files {
        kinds.insert(kind_code(file.kind));
        if !paths.contains(&file.path.as_str()) {
            paths.push(&file.path);
        }
        categories.extend(categorize(&file.path, &file.patch));
    }

    let verb = match kinds.iter().collect::<Vec<_>>().as_slice() {
        [ChangeCode::Added] => "Add",
        [ChangeCode::Deleted] => "Remove",
        [ChangeCode::Renamed] => "Rename",
        _ => "Update",
    };

    let base = match paths.len() {
        1 => format!("{} {}", verb, paths[0]),
        2..=5 => format!("{} {}", verb, paths.join(", ")),
        _ => format!("Multiple files updated: {}, …", paths[..3].join(", ")),
    };

    if categories.is_empty() {
        return Ok(base);
    }
    let labels: Vec<&str> = categories.iter().map(|c| c.label()).collect();
    Ok(format!("{} ({})", base, labels.join(", ")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ChangeCode {
    Added,
    Deleted,
    Renamed,
    Other,
}

fn kind_code(kind: ChangeKind) -> ChangeCode {
    match kind {
        ChangeKind::Added => ChangeCode::Added,
        ChangeKind::Deleted => ChangeCode::Deleted,
        ChangeKind::Renamed => ChangeCode::Renamed,
        _ => ChangeCode::Other,
    }
}

fn categorize(path: &str, patch: &str) -> BTreeSet<Category> {
    let mut categories = BTreeSet::new();
    let lower = path.to_lowercase();
    let extension = Path::new(&lower)
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();
    let has_ext = |set: &[&str]| !extension.is_empty() && set.contains(&extension.as_str());

    if has_ext(DOC_EXTENSIONS) || lower.contains("readme") {
        categories.insert(Category::Docs);
    }
    if has_ext(CONFIG_EXTENSIONS) || lower.ends_with("package.json") || lower.ends_with("package-lock.json") {
        categories.insert(Category::Config);
    }
    if has_ext(ASSET_EXTENSIONS) {
        categories.insert(Category::Assets);
    }
    if is_test_path(&lower) {
        categories.insert(Category::Tests);
    }

    if has_ext(CODE_EXTENSIONS) || looks_like_code(&changed_lines(patch)) {
        categories.insert(Category::Code);
    } else if categories.is_empty() {
        categories.insert(Category::Docs);
    }
    categories
}

fn is_test_path(lower: &str) -> bool {
    let path = Path::new(lower);
    let in_test_dir = path
        .parent()
        .into_iter()
        .flat_map(|p| p.components())
        .any(|c| matches!(c.as_os_str().to_str(), Some("test" | "tests" | "spec")));
    if in_test_dir {
        return true;
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    stem.starts_with("test") || stem.ends_with("_test") || stem.ends_with("spec")
}

/// Added and removed lines of a patch, without their `+`/`-` prefix.
fn changed_lines(patch: &str) -> Vec<&str> {
    patch
        .lines()
        .filter(|line| !line.starts_with("+++") && !line.starts_with("---"))
        .filter_map(|line| line.strip_prefix('+').or_else(|| line.strip_prefix('-')))
        .collect()
}

fn looks_like_code(lines: &[&str]) -> bool {
    let lines: Vec<&&str> = lines.iter().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return false;
    }
    let mut code_hits = 0;
    let mut punctuation_hits = 0;
    for line in &lines {
        let normalized = line.to_lowercase();
        if CODE_MARKERS.iter().any(|m| normalized.contains(m)) {
            code_hits += 1;
        }
        punctuation_hits += line.chars().filter(|c| "{}[]();<>".contains(*c)).count();
    }
    code_hits >= (lines.len() / 3).max(1) || punctuation_hits >= lines.len()
}
