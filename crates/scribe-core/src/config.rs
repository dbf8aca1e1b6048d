use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use version_migrate::DeriveQueryable as Queryable;

/// Default coalescing window for index writes, in milliseconds.
pub const DEFAULT_INDEX_FLUSH_WINDOW_MS: u64 = 500;

/// Application configuration.
///
/// This is a version-agnostic domain model; `config.toml` stores it as a
/// versioned `config` entity.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq, Queryable)]
#[queryable(entity = "config")]
pub struct ScribeConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Storage root. `None` means the per-user application-data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Index upserts arriving within this window collapse into one write.
    /// `0` writes through on every upsert.
    #[serde(default = "default_flush_window_ms")]
    pub index_flush_window_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            index_flush_window_ms: DEFAULT_INDEX_FLUSH_WINDOW_MS,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_flush_window_ms() -> u64 {
    DEFAULT_INDEX_FLUSH_WINDOW_MS
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config: ScribeConfig = toml::from_str("").unwrap();
        assert_eq!(config, ScribeConfig::default());
        assert_eq!(config.store.index_flush_window_ms, 500);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_store_section() {
        let config: ScribeConfig = toml::from_str(
            r#"
            [store]
            data_dir = "/tmp/scribe"
            "#,
        )
        .unwrap();
        assert_eq!(config.store.data_dir, Some(PathBuf::from("/tmp/scribe")));
        assert_eq!(config.store.index_flush_window_ms, 500);
    }
}
