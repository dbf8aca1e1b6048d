//! Linear migration registry.
//!
//! Every version migrates through all intermediate versions; no step is
//! ever skipped.

use super::traits::{MigrationChain, TypedMigration};
use anyhow::{Context, Result};
use semver::Version;
use std::sync::Arc;

/// Ordered chain of migrations: V1.0.0 → V2.0.0 → ...
///
/// [`register`](Self::register) checks that each step starts where the
/// previous one ended.
#[derive(Debug)]
pub struct MigrationRegistry<T> {
    migrations: Vec<Arc<dyn TypedMigration<T, T>>>,
    latest_version: Version,
}

impl<T> MigrationRegistry<T> {
    pub fn new(latest_version: Version) -> Self {
        Self {
            migrations: Vec::new(),
            latest_version,
        }
    }

    /// Registers a step.
    ///
    /// # Panics
    ///
    /// Panics if the step does not connect to the chain or overshoots the
    /// latest version. Registries are built from static code, so this is a
    /// programming error.
    pub fn register(&mut self, migration: Arc<dyn TypedMigration<T, T>>) {
        if let Some(last) = self.migrations.last() {
            assert_eq!(
                last.to_version(),
                migration.from_version(),
                "Migration chain broken: '{}' ends at {} but '{}' starts at {}",
                last.description(),
                last.to_version(),
                migration.description(),
                migration.from_version()
            );
        }

        assert!(
            migration.to_version() <= self.latest_version,
            "Migration target version {} exceeds registry's latest version {}",
            migration.to_version(),
            self.latest_version
        );

        self.migrations.push(migration);
    }

    fn find_start_index(&self, from_version: &Version) -> Option<usize> {
        self.migrations.iter().position(|m| m.can_migrate(from_version))
    }
}

impl<T> MigrationChain<T> for MigrationRegistry<T> {
    fn migrate_to_latest(&self, mut data: T, current_version: &Version) -> Result<T> {
        if current_version == &self.latest_version {
            tracing::debug!("Index already at schema {}, no migration needed", current_version);
            return Ok(data);
        }

        if current_version > &self.latest_version {
            anyhow::bail!(
                "Data version ({}) is newer than the latest supported version ({})",
                current_version,
                self.latest_version
            );
        }

        let start_idx = self.find_start_index(current_version).ok_or_else(|| {
            anyhow::anyhow!("No migration found starting from version {}", current_version)
        })?;
        let steps = self.migrations.len() - start_idx;

        tracing::info!(
            "Starting migration from {} to {} ({} steps)",
            current_version,
            self.latest_version,
            steps
        );

        for (i, migration) in self.migrations[start_idx..].iter().enumerate() {
            tracing::info!(
                "Migration step {}/{}: {} -> {} ({})",
                i + 1,
                steps,
                migration.from_version(),
                migration.to_version(),
                migration.description()
            );

            data = migration.migrate(data).with_context(|| {
                format!(
                    "Migration failed at step {}: {} -> {}",
                    i + 1,
                    migration.from_version(),
                    migration.to_version()
                )
            })?;
        }

        Ok(data)
    }
}
