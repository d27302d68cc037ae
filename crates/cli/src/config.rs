// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Mirror configuration.
//!
//! Configuration is stored in a TOML file located by, in order:
//! - the `--config` option
//! - the `BUGMIRROR_CONFIG` environment variable
//! - `bugmirror.toml` in the current directory
//! - `bugmirror/config.toml` in the user config directory

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const CONFIG_FILE_NAME: &str = "bugmirror.toml";
const USER_CONFIG_DIR: &str = "bugmirror";
const USER_CONFIG_FILE: &str = "config.toml";
const DB_FILE_NAME: &str = "bugmirror.db";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub remote: RemoteConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    /// Directory of the loaded file; relative paths resolve against it.
    #[serde(skip)]
    base_dir: PathBuf,
}

/// Remote endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// JSON-RPC endpoint URL.
    pub endpoint: String,
    /// Per-request timeout in seconds (default: 60).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Issues per page when listing open issues (default: 50).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Form login; when absent calls carry no session token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<LoginConfig>,
}

/// Form-based login producing a session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginConfig {
    pub url: String,
    /// Requested once with the session cookie when the run ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logout_url: Option<String>,
    #[serde(default = "default_username_field")]
    pub username_field: String,
    #[serde(default = "default_password_field")]
    pub password_field: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database path, relative to the config file directory unless absolute.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Issues written per batch (default: 20).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Status id the tracker uses for closed issues (default: 90).
    #[serde(default = "default_closed_status_id")]
    pub closed_status_id: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            batch_size: default_batch_size(),
            closed_status_id: default_closed_status_id(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_page_size() -> u32 {
    50
}

fn default_username_field() -> String {
    "username".to_string()
}

fn default_password_field() -> String {
    "password".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from(DB_FILE_NAME)
}

fn default_batch_size() -> usize {
    20
}

fn default_closed_status_id() -> i64 {
    bm_core::db::DEFAULT_CLOSED_STATUS_ID
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl Config {
    /// Parses and validates configuration text.
    pub fn parse(content: &str, base_dir: &Path) -> Result<Self> {
        let mut config: Config = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.base_dir = base_dir.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from the given file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config {}: {}", path.display(), e))
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Config::parse(&content, base_dir)
    }

    fn validate(&self) -> Result<()> {
        if !is_http_url(&self.remote.endpoint) {
            return Err(Error::Config(format!(
                "invalid remote endpoint '{}': must be an http:// or https:// URL",
                self.remote.endpoint
            )));
        }
        if let Some(login) = &self.remote.login {
            if !is_http_url(&login.url) {
                return Err(Error::Config(format!(
                    "invalid login url '{}': must be an http:// or https:// URL",
                    login.url
                )));
            }
        }
        if self.remote.page_size == 0 {
            return Err(Error::Config("remote.page_size must be at least 1".to_string()));
        }
        if self.sync.batch_size == 0 {
            return Err(Error::Config("sync.batch_size must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Returns the database path, resolved against the config directory.
    pub fn store_path(&self) -> PathBuf {
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            self.base_dir.join(&self.store.path)
        }
    }
}

/// Picks the config file from the explicit option, the environment, the
/// working directory or the user config directory, in that order.
///
/// Explicit and environment paths are returned even if they do not exist so
/// that loading reports the missing file.
pub fn locate(
    explicit: Option<&Path>,
    from_env: Option<PathBuf>,
    cwd: &Path,
    user_config_dir: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = from_env {
        return Ok(path);
    }
    let local = cwd.join(CONFIG_FILE_NAME);
    if local.is_file() {
        return Ok(local);
    }
    if let Some(dir) = user_config_dir {
        let user = dir.join(USER_CONFIG_DIR).join(USER_CONFIG_FILE);
        if user.is_file() {
            return Ok(user);
        }
    }
    Err(Error::Config(format!(
        "no configuration found\n  hint: pass --config, set BUGMIRROR_CONFIG or create ./{}",
        CONFIG_FILE_NAME
    )))
}

/// Locate and load the configuration for this process.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let cwd = std::env::current_dir()?;
    let path = locate(explicit, crate::env::config_path(), &cwd, dirs::config_dir())?;
    tracing::debug!(path = %path.display(), "loading config");
    Config::load(&path)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
