//! Config file DTOs and migrations.
//!
//! - V1.0.0: `store` and `logging` sections

use scribe_core::config::{LoggingConfig, ScribeConfig, StoreConfig};
use scribe_core::error::{Result, ScribeError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use version_migrate::{FromDomain, IntoDomain, Migrator, Versioned};

/// Entity name of the configuration inside `config.toml`.
pub const CONFIG_ENTITY: &str = "config";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSectionV1_0_0 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_flush_window_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSectionV1_0_0 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

/// Config file V1.0.0 (current).
///
/// Every field is optional on disk; missing ones take the domain defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Versioned)]
#[versioned(version = "1.0.0")]
pub struct ConfigV1_0_0 {
    #[serde(default)]
    pub store: StoreSectionV1_0_0,
    #[serde(default)]
    pub logging: LoggingSectionV1_0_0,
}

impl IntoDomain<ScribeConfig> for ConfigV1_0_0 {
    fn into_domain(self) -> ScribeConfig {
        let store = StoreConfig::default();
        let logging = LoggingConfig::default();
        ScribeConfig {
            store: StoreConfig {
                data_dir: self.store.data_dir,
                index_flush_window_ms: self
                    .store
                    .index_flush_window_ms
                    .unwrap_or(store.index_flush_window_ms),
            },
            logging: LoggingConfig {
                level: self.logging.level.unwrap_or(logging.level),
            },
        }
    }
}

impl FromDomain<ScribeConfig> for ConfigV1_0_0 {
    fn from_domain(config: ScribeConfig) -> Self {
        ConfigV1_0_0 {
            store: StoreSectionV1_0_0 {
                data_dir: config.store.data_dir,
                index_flush_window_ms: Some(config.store.index_flush_window_ms),
            },
            logging: LoggingSectionV1_0_0 {
                level: Some(config.logging.level),
            },
        }
    }
}

/// Creates the Migrator for the config file.
///
/// # Migration Path
///
/// - V1.0.0 → ScribeConfig
pub fn create_config_migrator() -> Result<Migrator> {
    let mut migrator = Migrator::builder().build();

    let config_path = Migrator::define(CONFIG_ENTITY)
        .from::<ConfigV1_0_0>()
        .into_with_save::<ScribeConfig>();

    migrator
        .register(config_path)
        .map_err(|e| ScribeError::internal(format!("config migration path: {e}")))?;

    Ok(migrator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_domain_defaults() {
        let config = ConfigV1_0_0 {
            store: StoreSectionV1_0_0 {
                data_dir: Some(PathBuf::from("/tmp/scribe")),
                index_flush_window_ms: None,
            },
            logging: LoggingSectionV1_0_0::default(),
        }
        .into_domain();

        assert_eq!(config.store.data_dir, Some(PathBuf::from("/tmp/scribe")));
        assert_eq!(config.store.index_flush_window_ms, 500);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_domain_values_are_written_out() {
        let mut config = ScribeConfig::default();
        config.store.index_flush_window_ms = 0;
        config.logging.level = "debug".to_string();

        let dto = ConfigV1_0_0::from_domain(config.clone());
        assert_eq!(dto.store.index_flush_window_ms, Some(0));
        assert_eq!(dto.into_domain(), config);
    }

    #[test]
    fn test_migrator_builds() {
        assert!(create_config_migrator().is_ok());
    }
}
