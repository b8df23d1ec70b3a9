//! API key storage.
//!
//! `login` writes `{"apiKey": "..."}` to `<config dir>/flex-cli/auth.json`;
//! `FLEX_API_KEY` takes precedence over the file when set.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the stored key.
pub const API_KEY_ENV: &str = "FLEX_API_KEY";

const AUTH_FILE: &str = "auth.json";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credentials {
    api_key: String,
}

/// Credential file for one user.
#[derive(Debug, Clone)]
pub struct AuthStore {
    path: PathBuf,
}

impl AuthStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the platform config directory.
    pub fn default_location() -> Result<Self> {
        let dir = dirs::config_dir().context("Could not determine the user config directory")?;
        Ok(Self::new(dir.join("flex-cli").join(AUTH_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored key, if any.
    pub fn load(&self) -> Result<Option<String>> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };
        let creds: Credentials = serde_json::from_str(&data)
            .with_context(|| format!("Invalid credential file {}", self.path.display()))?;
        Ok(Some(creds.api_key))
    }

    /// Save `api_key`, replacing any stored key.
    pub fn save(&self, api_key: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&Credentials {
            api_key: api_key.to_string(),
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        restrict_permissions(&tmp)?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    /// Remove the stored key. Returns whether one existed.
    pub fn clear(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("Failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Pick the API key: a non-empty environment value wins over the store.
pub fn resolve_api_key(env_value: Option<String>, store: &AuthStore) -> Result<Option<String>> {
    match env_value.filter(|k| !k.trim().is_empty()) {
        Some(key) => Ok(Some(key)),
        None => store.load(),
    }
}
