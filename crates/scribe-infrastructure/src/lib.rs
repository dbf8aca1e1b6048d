pub mod async_dir_conversation_repository;
pub mod config_service;
pub mod conversation_file;
pub mod crypto;
pub mod dto;
pub mod migration;
pub mod paths;
pub mod storage;

pub use crate::async_dir_conversation_repository::AsyncDirConversationRepository;
pub use crate::config_service::ConfigService;
pub use crate::crypto::{EnvelopeCodec, KdfParams};
pub use crate::migration::{IndexMigrator, MigrationReport};
pub use crate::paths::{ScribePaths, StoreLayout};
