//! Command-line collaborators.
//!
//! Everything the in-process engine does not cover goes through the system
//! `git` binary: network transport (clone, push, fetch), merge/rebase,
//! ahead/behind counting and the LFS subcommands. The two traits keep the
//! policy code in `GitRepository` independent of how the tool is invoked, so
//! tests substitute recording fakes.
//!
//! Every invocation sets `GIT_TERMINAL_PROMPT=0` and applies the caller's
//! environment overlay (usually `GIT_SSH_COMMAND`). Failure text is redacted
//! of URL userinfo before it is turned into an error.

use std::ffi::OsStr;
use std::io;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tracing::debug;

use crate::error::{AppError, Result};

/// Process-environment overlay applied to one tool invocation.
pub type TransportEnv = Vec<(String, String)>;

pub trait VcsTool: Send + Sync {
    fn clone_repo(&self, url: &str, dest: &Path, env: &[(String, String)]) -> Result<()>;

    /// Push `refspec` to `target` (remote name or URL). Returns `false` when
    /// the remote was already up to date.
    fn push(&self, cwd: &Path, target: &str, refspec: &str, env: &[(String, String)]) -> Result<bool>;

    fn fetch(
        &self,
        cwd: &Path,
        target: &str,
        refspec: Option<&str>,
        env: &[(String, String)],
    ) -> Result<()>;

    fn merge(&self, cwd: &Path, from: &str) -> Result<()>;

    fn rebase(&self, cwd: &Path, onto: &str) -> Result<()>;

    /// `(ahead, behind)` of HEAD relative to `upstream`.
    fn ahead_behind(&self, cwd: &Path, upstream: &str) -> Result<(usize, usize)>;
}

pub trait LfsTool: Send + Sync {
    /// Raw output of `git lfs ls-files --json`.
    fn ls_files(&self, cwd: &Path) -> Result<String>;

    /// Materialize exactly one path.
    fn pull(&self, cwd: &Path, path: &str, env: &[(String, String)]) -> Result<()>;
}

/// Stderr fragments that mean the remote could not be reached or refused us.
const TRANSPORT_MARKERS: &[&str] = &[
    "authentication failed",
    "permission denied",
    "could not resolve host",
    "could not read from remote",
    "could not read username",
    "unable to access",
    "connection refused",
    "connection timed out",
    "host key verification failed",
    "terminal prompts disabled",
];

const LFS_MISSING_MARKER: &str = "'lfs' is not a git command";

/// Shells out to a `git` executable.
#[derive(Debug, Clone)]
pub struct GitCommand {
    program: String,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, cwd: Option<&Path>, env: &[(String, String)]) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        for (k, v) in env {
            cmd.env(k, v);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }

    fn run<I, S>(&self, cwd: Option<&Path>, args: I, env: &[(String, String)], action: &str) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = self.command(cwd, env);
        cmd.args(args);

        debug!(action, "spawning git");
        let output = cmd.output().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                AppError::ToolUnavailable(format!("{} is not installed on the server", self.program))
            }
            _ => AppError::Io(e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(action, &stderr));
        }
        Ok(output)
    }
}

impl VcsTool for GitCommand {
    fn clone_repo(&self, url: &str, dest: &Path, env: &[(String, String)]) -> Result<()> {
        self.run(
            None,
            [OsStr::new("clone"), OsStr::new("--"), OsStr::new(url), dest.as_os_str()],
            env,
            "clone",
        )?;
        Ok(())
    }

    fn push(&self, cwd: &Path, target: &str, refspec: &str, env: &[(String, String)]) -> Result<bool> {
        let output = self.run(Some(cwd), ["push", target, refspec], env, "push")?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let up_to_date = stdout.contains("Everything up-to-date") || stderr.contains("Everything up-to-date");
        Ok(!up_to_date)
    }

    fn fetch(
        &self,
        cwd: &Path,
        target: &str,
        refspec: Option<&str>,
        env: &[(String, String)],
    ) -> Result<()> {
        let mut args = vec!["fetch", target];
        args.extend(refspec);
        self.run(Some(cwd), args, env, "fetch")?;
        Ok(())
    }

    fn merge(&self, cwd: &Path, from: &str) -> Result<()> {
        self.run(Some(cwd), ["merge", "--no-edit", "--end-of-options", from], &[], "merge")?;
        Ok(())
    }

    fn rebase(&self, cwd: &Path, onto: &str) -> Result<()> {
        self.run(Some(cwd), ["rebase", "--end-of-options", onto], &[], "rebase")?;
        Ok(())
    }

    fn ahead_behind(&self, cwd: &Path, upstream: &str) -> Result<(usize, usize)> {
        let range = format!("{}...HEAD", upstream);
        let output = self.run(
            Some(cwd),
            ["rev-list", "--left-right", "--count", range.as_str()],
            &[],
            "rev-list",
        )?;
        parse_left_right_count(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| AppError::Engine("unexpected rev-list output".to_string()))
    }
}

impl LfsTool for GitCommand {
    fn ls_files(&self, cwd: &Path) -> Result<String> {
        let output = self.run(Some(cwd), ["lfs", "ls-files", "--json"], &[], "lfs ls-files")?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn pull(&self, cwd: &Path, path: &str, env: &[(String, String)]) -> Result<()> {
        self.run(
            Some(cwd),
            ["lfs", "pull", "--include", path, "--exclude", ""],
            env,
            "lfs pull",
        )?;
        Ok(())
    }
}

/// `rev-list --left-right --count upstream...HEAD` prints `behind<TAB>ahead`.
fn parse_left_right_count(stdout: &str) -> Option<(usize, usize)> {
    let mut parts = stdout.split_whitespace();
    let behind = parts.next()?.parse().ok()?;
    let ahead = parts.next()?.parse().ok()?;
    Some((ahead, behind))
}

fn classify_failure(action: &str, stderr: &str) -> AppError {
    let lower = stderr.to_lowercase();
    if lower.contains(LFS_MISSING_MARKER) {
        return AppError::ToolUnavailable("Git LFS is not installed on the server".to_string());
    }

    let mut message = redact_userinfo(stderr.trim());
    if message.is_empty() {
        message = format!("git {} failed", action);
    }

    if TRANSPORT_MARKERS.iter().any(|marker| lower.contains(marker)) {
        AppError::Transport(message)
    } else {
        AppError::Engine(message)
    }
}

/// Drop `user:password@` from every URL embedded in `text`.
pub fn redact_userinfo(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find("://") {
        let (head, tail) = rest.split_at(idx + 3);
        out.push_str(head);
        let end = tail
            .find(|c: char| c.is_whitespace() || matches!(c, '/' | '\'' | '"'))
            .unwrap_or(tail.len());
        let authority = &tail[..end];
        match authority.rfind('@') {
            Some(at) => out.push_str(&authority[at + 1..]),
            None => out.push_str(authority),
        }
        rest = &tail[end..];
    }
    out.push_str(rest);
    out
}
