//! Unified path management for scribe.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/scribe/            # Config directory
//! └── config.toml              # Application configuration
//!
//! ~/.local/share/scribe/       # Data directory (store root)
//! ├── index.json               # Lightweight index (schema 2.0.0)
//! ├── index.v1.bak             # Legacy blob, kept after migration
//! └── conversations/
//!     └── <id>.json            # One file per conversation
//! ```

use scribe_core::error::{Result, ScribeError};
use std::path::{Path, PathBuf};
use version_migrate::AppPaths;

/// Overrides the store root.
pub const DATA_DIR_ENV: &str = "SCRIBE_DATA_DIR";

/// Overrides the config file location.
pub const CONFIG_FILE_ENV: &str = "SCRIBE_CONFIG";

const APP_NAME: &str = "scribe";
const MAX_ID_LEN: usize = 128;

/// Platform directories for scribe, resolved through [`AppPaths`].
pub struct ScribePaths;

impl ScribePaths {
    fn app_paths() -> AppPaths {
        AppPaths::new(APP_NAME)
    }

    /// Returns the default store root: `$SCRIBE_DATA_DIR`, else the per-user
    /// application-data directory.
    pub fn data_dir() -> Result<PathBuf> {
        if let Some(dir) = env_path(DATA_DIR_ENV) {
            return Ok(dir);
        }
        Self::app_paths()
            .data_dir()
            .map_err(|e| ScribeError::config(format!("Cannot determine the data directory: {e}")))
    }

    pub fn config_dir() -> Result<PathBuf> {
        Self::app_paths()
            .config_dir()
            .map_err(|e| ScribeError::config(format!("Cannot determine the config directory: {e}")))
    }

    /// Returns the config file: `$SCRIBE_CONFIG`, else `config.toml` in
    /// [`config_dir`](Self::config_dir).
    pub fn config_file() -> Result<PathBuf> {
        if let Some(file) = env_path(CONFIG_FILE_ENV) {
            return Ok(file);
        }
        Ok(Self::config_dir()?.join("config.toml"))
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// File layout below one store root.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn conversations_dir(&self) -> PathBuf {
        self.root.join("conversations")
    }

    /// Path of the file holding conversation `id`.
    ///
    /// The path is a pure function of the id. Ids that could escape the
    /// conversations directory are rejected.
    pub fn conversation_file(&self, id: &str) -> Result<PathBuf> {
        validate_id(id)?;
        Ok(self.conversations_dir().join(format!("{id}.json")))
    }

    pub fn index_file(&self) -> PathBuf {
        self.root.join("index.json")
    }

    /// Where the legacy index blob is kept after migration.
    pub fn legacy_backup_file(&self) -> PathBuf {
        self.root.join("index.v1.bak")
    }

    /// Where an unreadable index file is moved aside.
    pub fn corrupt_index_file(&self) -> PathBuf {
        self.root.join("index.corrupt.bak")
    }
}

/// Checks that `id` maps to exactly one file name.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(ScribeError::invalid_id(id, "empty"));
    }
    if id.len() > MAX_ID_LEN {
        return Err(ScribeError::invalid_id(
            id,
            format!("longer than {MAX_ID_LEN} bytes"),
        ));
    }
    if id == "." || id == ".." {
        return Err(ScribeError::invalid_id(id, "reserved name"));
    }
    if let Some(c) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(ScribeError::invalid_id(
            id,
            format!("contains disallowed character {c:?}"),
        ));
    }
    Ok(())
}
