//! Append-only activity log, one JSON object per line per repository.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{AppError, Result};
use crate::models::ActivityEvent;
use crate::registry::is_valid_repo_id;

pub struct ActivityLog {
    base_path: PathBuf,
    append_lock: Mutex<()>,
}

impl ActivityLog {
    pub fn open<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            append_lock: Mutex::new(()),
        })
    }

    /// Record one action. `None` detail values are dropped.
    pub fn append(
        &self,
        repo_id: &str,
        action: &str,
        user: &str,
        branch: Option<&str>,
        details: impl IntoIterator<Item = (&'static str, Option<Value>)>,
    ) -> Result<()> {
        let details: Map<String, Value> = details
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
            .collect();
        let event = ActivityEvent {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            action: action.to_string(),
            user: user.to_string(),
            branch: branch.filter(|b| !b.is_empty()).map(str::to_string),
            details,
        };
        let mut line = serde_json::to_string(&event).map_err(|e| AppError::Internal(e.to_string()))?;
        line.push('\n');

        let path = self.log_path(repo_id)?;
        let _guard = self.append_lock.lock().map_err(|_| AppError::lock_poisoned())?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Entries in write order; with `limit`, only the last `limit`.
    pub fn read(&self, repo_id: &str, limit: Option<usize>) -> Result<Vec<ActivityEvent>> {
        let path = self.log_path(repo_id)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries: Vec<ActivityEvent> = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(repo_id, error = %e, "skipping malformed activity line");
                    None
                }
            })
            .collect();

        if let Some(limit) = limit {
            let skip = entries.len().saturating_sub(limit);
            entries.drain(..skip);
        }
        Ok(entries)
    }

    fn log_path(&self, repo_id: &str) -> Result<PathBuf> {
        if !is_valid_repo_id(repo_id) {
            return Err(AppError::NotFound(format!("Repository {}", repo_id)));
        }
        Ok(self.base_path.join(format!("{}.jsonl", repo_id)))
    }
}
