//! Core traits for the schema migration framework.

use anyhow::Result;
use semver::Version;

/// Version metadata of one migration step.
pub trait Migration: Send + Sync {
    /// Schema version this step reads.
    fn from_version(&self) -> Version;

    /// Schema version this step produces.
    fn to_version(&self) -> Version;

    fn can_migrate(&self, version: &Version) -> bool {
        version == &self.from_version()
    }

    /// Human-readable description, used in logs.
    fn description(&self) -> &str;
}

/// A migration step that transforms data in memory.
///
/// Steps are pure: all I/O happens before and after the chain runs.
pub trait TypedMigration<From, To>: Migration + std::fmt::Debug {
    fn migrate(&self, from: From) -> Result<To>;
}

/// Upgrades data to the latest schema version, one step at a time.
pub trait MigrationChain<T> {
    /// Applies every step from `current_version` up to the latest version.
    ///
    /// # Errors
    ///
    /// Fails if no path starts at `current_version`, if the data is newer
    /// than the latest known version, or if any step fails.
    fn migrate_to_latest(&self, data: T, current_version: &Version) -> Result<T>;
}
