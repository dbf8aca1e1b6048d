//! Schema migration for the store index.
//!
//! A small linear migration framework (semver-tagged steps chained through
//! a [`MigrationRegistry`]) plus the one index upgrade that exists today:
//!
//! ```text
//! 1.0.0 (untagged legacy array) ──LegacyIndexMigration──▶ 2.0.0 (segmented)
//! ```
//!
//! Steps are pure transformations; [`IndexMigrator`] performs the I/O
//! around them.

mod index_migrator;
mod legacy_index;
mod registry;
mod traits;

pub use index_migrator::{IndexMigrator, MigrationReport, create_index_registry};
pub use legacy_index::{IndexDocument, LegacyIndexMigration, MigratedIndex};
pub use registry::MigrationRegistry;
pub use traits::{Migration, MigrationChain, TypedMigration};
