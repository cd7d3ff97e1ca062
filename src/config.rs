use std::path::PathBuf;

use clap::Parser;

use crate::vault::SECRET_KEY_ENV;

/// Hosted multi-repository git workspace
#[derive(Parser, Debug, Clone)]
#[command(name = "git-workspace")]
#[command(about = "Serve server-side git working trees over HTTP", long_about = None)]
pub struct Config {
    /// Directory holding repositories, secrets, keys and activity logs
    #[arg(long, env = "GIT_WORKSPACE_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Address to bind the HTTP server to
    #[arg(long, env = "GIT_WORKSPACE_BIND", default_value = "127.0.0.1")]
    pub bind: String,

    /// Port to run the server on
    #[arg(short, long, env = "GIT_WORKSPACE_PORT", default_value = "3001")]
    pub port: u16,

    /// git executable used for transport, merge/rebase and LFS
    #[arg(long, env = "GIT_WORKSPACE_GIT", default_value = "git")]
    pub git_binary: String,

    /// Vault key override: 32 bytes of base64, or any passphrase
    #[arg(long, env = SECRET_KEY_ENV, hide_env_values = true)]
    pub secret_key: Option<String>,
}

impl Config {
    /// Settings rooted at `data_dir` with everything else defaulted.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            bind: "127.0.0.1".to_string(),
            port: 3001,
            git_binary: "git".to_string(),
            secret_key: None,
        }
    }

    pub fn repos_dir(&self) -> PathBuf {
        self.data_dir.join("repos")
    }

    pub fn secrets_dir(&self) -> PathBuf {
        self.data_dir.join("secrets")
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.data_dir.join("keys")
    }

    pub fn activity_dir(&self) -> PathBuf {
        self.data_dir.join("activity")
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
