//! Secret vault for per-repository credentials.
//!
//! Each repository gets one JSON file mapping secret names to ciphertext.
//! Values are sealed with AES-256-GCM under a process-wide key that is loaded
//! once when the vault is opened:
//!
//! ```text
//! stored value = base64( nonce[12] || ciphertext || tag[16] )
//! ```
//!
//! Plaintext leaves the vault only through [`SecretVault::http_credentials`],
//! which transport selection uses to build a one-shot remote URL. The listing
//! API returns masked placeholders.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::fsutil::write_private;
use crate::models::HttpCredentials;
use crate::registry::is_valid_repo_id;

pub const SECRET_KEY_ENV: &str = "GIT_WORKSPACE_SECRET_KEY";

pub const GIT_USERNAME: &str = "GIT_USERNAME";
pub const GIT_PASSWORD: &str = "GIT_PASSWORD";
pub const GIT_TOKEN: &str = "GIT_TOKEN";

const KEY_FILE: &str = ".key";
const NONCE_LEN: usize = 12;
const UNREADABLE_MASK: &str = "******";

pub struct SecretVault {
    base_path: PathBuf,
    cipher: Aes256Gcm,
    /// Serializes read-modify-write cycles on the per-repository files.
    write_lock: Mutex<()>,
}

impl SecretVault {
    /// Open the vault rooted at `base_path`.
    ///
    /// `key_override` (usually from `GIT_WORKSPACE_SECRET_KEY`) wins over the
    /// key file. Without an override the key file is loaded, or generated and
    /// persisted with owner-only permissions on first use.
    pub fn open<P: AsRef<Path>>(base_path: P, key_override: Option<&str>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;

        let key = match key_override.filter(|v| !v.is_empty()) {
            Some(value) => key_from_override(value),
            None => load_or_generate_key(&base_path.join(KEY_FILE))?,
        };
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|_| AppError::Internal("vault key must be 32 bytes".to_string()))?;

        Ok(Self {
            base_path,
            cipher,
            write_lock: Mutex::new(()),
        })
    }

    pub fn set(&self, repo_id: &str, name: &str, value: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(AppError::InvalidArgument("Secret name is required".to_string()));
        }
        let _guard = self.write_lock.lock().map_err(|_| AppError::lock_poisoned())?;

        let mut secrets = self.load(repo_id)?;
        secrets.insert(name.to_string(), self.encrypt(value)?);
        self.save(repo_id, &secrets)?;

        debug!(repo_id, name, "stored secret");
        Ok(())
    }

    /// Remove a secret, returning whether it existed.
    pub fn delete(&self, repo_id: &str, name: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().map_err(|_| AppError::lock_poisoned())?;

        let mut secrets = self.load(repo_id)?;
        if secrets.remove(name).is_none() {
            return Ok(false);
        }
        self.save(repo_id, &secrets)?;

        debug!(repo_id, name, "deleted secret");
        Ok(true)
    }

    /// Secret names with masked placeholders in place of their values.
    pub fn list(&self, repo_id: &str) -> Result<BTreeMap<String, String>> {
        let secrets = self.load(repo_id)?;
        Ok(secrets
            .into_iter()
            .map(|(name, sealed)| {
                let masked = self.mask(&sealed);
                (name, masked)
            })
            .collect())
    }

    /// Derive HTTP credentials from `GIT_USERNAME`, `GIT_PASSWORD` and `GIT_TOKEN`.
    ///
    /// A username needs a password or a token; a lone token authenticates as
    /// the `token` user. Empty values count as missing.
    pub fn http_credentials(&self, repo_id: &str) -> Result<Option<HttpCredentials>> {
        let username = self.get_secret(repo_id, GIT_USERNAME)?;
        let password = self.get_secret(repo_id, GIT_PASSWORD)?;
        let token = self.get_secret(repo_id, GIT_TOKEN)?;

        let credentials = match (username, password.or(token.clone())) {
            (Some(username), Some(password)) => Some(HttpCredentials { username, password }),
            (None, _) => token.map(|token| HttpCredentials {
                username: "token".to_string(),
                password: token,
            }),
            (Some(_), None) => None,
        };
        Ok(credentials)
    }

    /// Persist clone-time credentials so later push/fetch can reuse them.
    pub fn store_http_credentials(&self, repo_id: &str, credentials: &HttpCredentials) -> Result<()> {
        self.set(repo_id, GIT_USERNAME, &credentials.username)?;
        self.set(repo_id, GIT_PASSWORD, &credentials.password)
    }

    pub(crate) fn get_secret(&self, repo_id: &str, name: &str) -> Result<Option<String>> {
        let secrets = self.load(repo_id)?;
        Ok(secrets
            .get(name)
            .and_then(|sealed| self.decrypt(sealed).ok())
            .filter(|plain| !plain.is_empty()))
    }

    fn mask(&self, sealed: &str) -> String {
        match self.decrypt(sealed) {
            Ok(plain) => mask_plaintext(&plain),
            Err(_) => UNREADABLE_MASK.to_string(),
        }
    }

    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| AppError::Internal("failed to encrypt secret".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    fn decrypt(&self, sealed: &str) -> Result<String> {
        let invalid = || AppError::Internal("secret cannot be decrypted".to_string());

        let bytes = STANDARD.decode(sealed).map_err(|_| invalid())?;
        if bytes.len() <= NONCE_LEN {
            return Err(invalid());
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| invalid())?;
        String::from_utf8(plaintext).map_err(|_| invalid())
    }

    fn repo_file(&self, repo_id: &str) -> Result<PathBuf> {
        if !is_valid_repo_id(repo_id) {
            return Err(AppError::NotFound(format!("Repository {}", repo_id)));
        }
        Ok(self.base_path.join(format!("{}.json", repo_id)))
    }

    fn load(&self, repo_id: &str) -> Result<BTreeMap<String, String>> {
        let path = self.repo_file(repo_id)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        match serde_json::from_str(&raw) {
            Ok(secrets) => Ok(secrets),
            Err(e) => {
                warn!(repo_id, error = %e, "secret store has unexpected shape, treating as empty");
                Ok(BTreeMap::new())
            }
        }
    }

    fn save(&self, repo_id: &str, secrets: &BTreeMap<String, String>) -> Result<()> {
        let path = self.repo_file(repo_id)?;
        let payload = serde_json::to_string_pretty(secrets)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        write_private(&path, payload.as_bytes())?;
        Ok(())
    }
}

/// Length-scaled asterisks clamped to 4..=10; empty plaintext masks to "".
pub fn mask_plaintext(plain: &str) -> String {
    let len = plain.chars().count();
    if len == 0 {
        return String::new();
    }
    "*".repeat(len.clamp(4, 10))
}

/// A 32-byte base64 value is used as-is; anything else is hashed into a key.
fn key_from_override(value: &str) -> Vec<u8> {
    match STANDARD.decode(value.trim()) {
        Ok(bytes) if bytes.len() == 32 => bytes,
        _ => Sha256::digest(value.as_bytes()).to_vec(),
    }
}

fn load_or_generate_key(path: &Path) -> Result<Vec<u8>> {
    match fs::read_to_string(path) {
        Ok(raw) => STANDARD
            .decode(raw.trim())
            .ok()
            .filter(|bytes| bytes.len() == 32)
            .ok_or_else(|| AppError::Internal(format!("vault key file {} is invalid", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let key = Aes256Gcm::generate_key(OsRng);
            write_private(path, STANDARD.encode(key).as_bytes())?;
            info!(path = %path.display(), "generated new vault key");
            Ok(key.to_vec())
        }
        Err(e) => Err(e.into()),
    }
}
