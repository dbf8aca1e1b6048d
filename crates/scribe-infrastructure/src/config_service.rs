//! Configuration service implementation.
//!
//! Loads [`ScribeConfig`] from `config.toml` (see [`ScribePaths::config_file`])
//! through version-migrate's `FileStorage` and caches it. A missing file is
//! created with the defaults.

use crate::dto::{CONFIG_ENTITY, create_config_migrator};
use crate::paths::{DATA_DIR_ENV, ScribePaths};
use scribe_core::config::ScribeConfig;
use scribe_core::error::{Result, ScribeError};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use version_migrate::{FileStorage, FileStorageStrategy, FormatStrategy, LoadBehavior};

/// Configuration service that loads and caches the root configuration.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: Option<PathBuf>,
    config: Arc<RwLock<Option<ScribeConfig>>>,
}

impl ConfigService {
    /// Creates a service reading the default config file.
    pub fn new() -> Self {
        Self {
            path: None,
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Creates a service reading `path` instead of the default location.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Gets the configuration, loading it on first access.
    ///
    /// `$SCRIBE_DATA_DIR` overrides `store.data_dir` from the file.
    ///
    /// # Errors
    ///
    /// Returns `ScribeError::Config` if the file exists but cannot be read
    /// as a config entity.
    pub fn get_config(&self) -> Result<ScribeConfig> {
        {
            let read_lock = self.config.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = read_lock.as_ref() {
                return Ok(cached.clone());
            }
        }

        let path = match &self.path {
            Some(path) => path.clone(),
            None => ScribePaths::config_file()?,
        };
        let mut loaded = Self::load_from(&path)?;
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            loaded.store.data_dir = Some(PathBuf::from(dir));
        }

        let mut write_lock = self.config.write().unwrap_or_else(|e| e.into_inner());
        *write_lock = Some(loaded.clone());
        Ok(loaded)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.config.write().unwrap_or_else(|e| e.into_inner());
        *write_lock = None;
    }

    /// Reads `path` without consulting the environment.
    ///
    /// A missing file is written with the defaults. Failing to write it is
    /// logged and the defaults are still returned.
    pub fn load_from(path: &Path) -> Result<ScribeConfig> {
        let mut storage = Self::open_storage(path)?;

        let configs: Vec<ScribeConfig> = storage
            .query(CONFIG_ENTITY)
            .map_err(|e| ScribeError::config(format!("{}: {}", path.display(), e)))?;

        match configs.into_iter().next() {
            Some(config) => Ok(config),
            None => {
                let default_config = ScribeConfig::default();
                if let Err(err) = Self::save_defaults(&mut storage, path, &default_config) {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "Could not write default config"
                    );
                }
                Ok(default_config)
            }
        }
    }

    fn open_storage(path: &Path) -> Result<FileStorage> {
        let migrator = create_config_migrator()?;
        let strategy = FileStorageStrategy::new()
            .with_format(FormatStrategy::Toml)
            .with_load_behavior(LoadBehavior::CreateIfMissing);

        FileStorage::new(path.to_path_buf(), migrator, strategy)
            .map_err(|e| ScribeError::config(format!("{}: {}", path.display(), e)))
    }

    fn save_defaults(
        storage: &mut FileStorage,
        path: &Path,
        config: &ScribeConfig,
    ) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        storage
            .update_and_save(CONFIG_ENTITY, vec![config.clone()])
            .map_err(|e| ScribeError::config(format!("{}: {}", path.display(), e)))
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}
