//! Git LFS pointer listing and object retrieval.
//!
//! Listing asks the LFS tool first. When the tool is missing, fails, prints
//! something unparseable or reports nothing, the pointers are found by hand:
//! root `.gitattributes` patterns bound to `filter=lfs`, intersected with the
//! index, each candidate read and checked for the pointer format.

use std::fs;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use git2::Repository;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::git::cli::TransportEnv;
use crate::git::files::read_existing;
use crate::git::repository::GitRepository;
use crate::models::{LfsContent, LfsPointer};
use crate::sandbox;

const POINTER_MARKER: &str = "git-lfs";

impl GitRepository {
    pub fn lfs_list(&self) -> Result<Vec<LfsPointer>> {
        self.with_repo(|repo| {
            match self.tools.lfs.ls_files(self.root()) {
                Ok(output) => match parse_ls_files(&output) {
                    Some(pointers) if !pointers.is_empty() => return Ok(pointers),
                    Some(_) => debug!(repo_id = %self.repo_id(), "lfs tool listed nothing"),
                    None => debug!(repo_id = %self.repo_id(), "lfs tool output unparseable"),
                },
                Err(e) => debug!(repo_id = %self.repo_id(), error = %e, "lfs tool unavailable"),
            }
            self.pointers_from_attributes(repo)
        })
    }

    /// Materialize one LFS object and return its bytes base64-encoded.
    pub fn lfs_fetch(&self, path: &str) -> Result<LfsContent> {
        let target = sandbox::resolve(self.root(), Some(path))?;
        self.with_repo(|repo| {
            let env = self.ssh_overlay(repo)?;
            self.tools.lfs.pull(self.root(), path, &env)?;
            let bytes = read_existing(&target, path)?;
            info!(repo_id = %self.repo_id(), path, size = bytes.len(), "fetched lfs object");
            Ok(LfsContent {
                path: path.to_string(),
                encoding: "base64".to_string(),
                content: STANDARD.encode(&bytes),
                size: bytes.len() as u64,
            })
        })
    }

    /// SSH key overlay for the LFS tool. The tool takes no explicit URL, so
    /// stored HTTP credentials do not apply here.
    fn ssh_overlay(&self, repo: &Repository) -> Result<TransportEnv> {
        match self.transport_plan(repo) {
            Ok(plan) if !plan.one_shot_url => Ok(plan.env),
            Ok(_) | Err(AppError::InvalidArgument(_)) => Ok(TransportEnv::new()),
            Err(e) => Err(e),
        }
    }

    fn pointers_from_attributes(&self, repo: &Repository) -> Result<Vec<LfsPointer>> {
        let Ok(attributes) = sandbox::resolve(self.root(), Some(".gitattributes")) else {
            return Ok(Vec::new());
        };
        let patterns = match fs::read_to_string(&attributes) {
            Ok(text) => lfs_patterns(&text),
            Err(_) => return Ok(Vec::new()),
        };
        if patterns.is_empty() {
            return Ok(Vec::new());
        }

        let mut index = repo.index()?;
        index.read(false)?;

        let mut pointers = Vec::new();
        for entry in index.iter() {
            let rel = String::from_utf8_lossy(&entry.path).to_string();
            if !patterns.iter().any(|p| wildcard_match(p, &rel)) {
                continue;
            }
            let Ok(full) = sandbox::resolve(self.root(), Some(&rel)) else {
                continue;
            };
            let Ok(text) = fs::read_to_string(&full) else {
                continue;
            };
            if let Some((oid, size)) = parse_pointer(&text) {
                pointers.push(LfsPointer {
                    path: rel,
                    oid: Some(oid),
                    size: Some(size),
                    tracked: true,
                    present: Some(false),
                });
            }
        }
        Ok(pointers)
    }
}

/// Accepts one `{"files": [...]}` document or one JSON object per line.
/// `None` means the output could not be understood.
pub fn parse_ls_files(output: &str) -> Option<Vec<LfsPointer>> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Some(Vec::new());
    }

    if let Ok(Value::Object(document)) = serde_json::from_str::<Value>(trimmed) {
        if let Some(files) = document.get("files") {
            return match files {
                Value::Array(files) => Some(files.iter().filter_map(pointer_from_json).collect()),
                Value::Null => Some(Vec::new()),
                _ => None,
            };
        }
    }

    let mut pointers = Vec::new();
    for line in trimmed.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let value: Value = serde_json::from_str(line).ok()?;
        if let Some(pointer) = pointer_from_json(&value) {
            pointers.push(pointer);
        }
    }
    Some(pointers)
}

fn pointer_from_json(value: &Value) -> Option<LfsPointer> {
    let path = value
        .get("name")
        .or_else(|| value.get("path"))
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())?;
    Some(LfsPointer {
        path: path.to_string(),
        oid: value.get("oid").and_then(Value::as_str).map(str::to_string),
        size: value.get("size").and_then(Value::as_u64),
        tracked: value.get("tracked").and_then(Value::as_bool).unwrap_or(true),
        present: value
            .get("present")
            .or_else(|| value.get("downloaded"))
            .and_then(Value::as_bool),
    })
}

/// Patterns whose attributes include `filter=lfs`.
fn lfs_patterns(attributes: &str) -> Vec<String> {
    attributes
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let pattern = parts.next()?;
            parts
                .any(|attr| attr.contains("filter=lfs"))
                .then(|| pattern.to_string())
        })
        .collect()
}

/// `(oid, size)` when `text` is a pointer file.
fn parse_pointer(text: &str) -> Option<(String, u64)> {
    if !text.contains(POINTER_MARKER) {
        return None;
    }
    let mut oid = None;
    let mut size = None;
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("oid ") {
            oid = rest
                .split_once("sha256:")
                .map(|(_, hex)| hex.trim().to_string())
                .filter(|hex| !hex.is_empty());
        } else if let Some(rest) = line.strip_prefix("size ") {
            size = rest.split_whitespace().next().and_then(|s| s.parse().ok());
        }
    }
    Some((oid?, size?))
}

/// Shell-style wildcard match over the whole path: `*` (crosses `/`), `?`,
/// `[...]` and `[!...]`.
///
/// O(pattern × path): a mismatch widens only the most recent `*`.
pub fn wildcard_match(pattern: &str, path: &str) -> bool {
    let tokens = tokenize(pattern);
    let path: Vec<char> = path.chars().collect();

    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while p < path.len() {
        match tokens.get(t) {
            Some(Token::Star) => {
                backtrack = Some((t, p));
                t += 1;
                continue;
            }
            Some(token) if token.matches(path[p]) => {
                t += 1;
                p += 1;
                continue;
            }
            _ => {}
        }
        match backtrack {
            Some((star, consumed)) => {
                backtrack = Some((star, consumed + 1));
                t = star + 1;
                p = consumed + 1;
            }
            None => return false,
        }
    }
    tokens[t..].iter().all(|token| matches!(token, Token::Star))
}

#[derive(Debug)]
enum Token {
    Star,
    Any,
    Literal(char),
    Class(CharClass),
}

impl Token {
    fn matches(&self, c: char) -> bool {
        match self {
            Token::Star => false,
            Token::Any => true,
            Token::Literal(l) => *l == c,
            Token::Class(class) => class.contains(c),
        }
    }
}

/// A bracket expression.
#[derive(Debug)]
struct CharClass {
    negated: bool,
    members: Vec<char>,
}

impl CharClass {
    fn contains(&self, c: char) -> bool {
        let members = &self.members;
        let mut hit = false;
        let mut i = 0;
        while i < members.len() {
            if i + 2 < members.len() && members[i + 1] == '-' {
                hit |= members[i] <= c && c <= members[i + 2];
                i += 3;
            } else {
                hit |= members[i] == c;
                i += 1;
            }
        }
        hit != self.negated
    }
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut tokens = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                // consecutive stars collapse into one
                if !matches!(tokens.last(), Some(Token::Star)) {
                    tokens.push(Token::Star);
                }
                i += 1;
            }
            '?' => {
                tokens.push(Token::Any);
                i += 1;
            }
            '[' => match parse_class(&chars[i + 1..]) {
                Some((class, used)) => {
                    tokens.push(Token::Class(class));
                    i += 1 + used;
                }
                None => {
                    tokens.push(Token::Literal('['));
                    i += 1;
                }
            },
            c => {
                tokens.push(Token::Literal(c));
                i += 1;
            }
        }
    }
    tokens
}

/// `body` starts right after `[`. Returns the class and how many chars of
/// `body` it consumed, closing `]` included. An unterminated class yields
/// `None`.
fn parse_class(body: &[char]) -> Option<(CharClass, usize)> {
    let (negated, start) = match body.first() {
        Some('!') => (true, 1),
        _ => (false, 0),
    };
    // `]` directly after the opening (or `!`) is a literal member
    let close = (start + 1..body.len()).find(|&i| body[i] == ']')?;
    let class = CharClass {
        negated,
        members: body[start..close].to_vec(),
    };
    Some((class, close + 1))
}
