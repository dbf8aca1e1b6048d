//! File-backed ConversationRepository implementation.
//!
//! Every conversation lives in its own file; a separate index file carries
//! the lightweight entries used for listing. Both are encrypted when the
//! passphrase session is unlocked at write time and plaintext otherwise.
//!
//! Directory structure:
//! ```text
//! root/
//! ├── index.json
//! ├── index.v1.bak            # only after a legacy migration
//! └── conversations/
//!     ├── s_k2j3h4g5.json
//!     └── 0b5c7c4e-....json
//! ```
//!
//! Each operation snapshots the passphrase once when it starts. The index
//! is kept in memory after the first access; its read-modify-write cycle is
//! the only thing serialized by the repository. Conversation files for
//! different ids are written concurrently.

use crate::conversation_file::{read_conversation, write_conversation};
use crate::crypto::EnvelopeCodec;
use crate::dto::IndexFileV2_0_0;
use crate::migration::{IndexMigrator, MigrationReport};
use crate::paths::{ScribePaths, StoreLayout};
use crate::storage::{IndexView, IndexWriter, atomic_file};
use async_trait::async_trait;
use scribe_core::config::{DEFAULT_INDEX_FLUSH_WINDOW_MS, StoreConfig};
use scribe_core::conversation::{
    Conversation, ConversationRepository, IndexEntry, render_transcript,
};
use scribe_core::error::{Result, ScribeError};
use scribe_core::{Passphrase, PassphraseSession};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::Mutex;

#[derive(Default)]
struct IndexState {
    /// Latest index document. Ahead of the disk while a write is pending.
    file: Option<IndexFileV2_0_0>,
    /// Decrypted view for the passphrase it was opened with.
    view: Option<IndexView>,
    report: Option<MigrationReport>,
}

pub struct AsyncDirConversationRepository {
    layout: StoreLayout,
    session: Arc<PassphraseSession>,
    codec: EnvelopeCodec,
    index: Mutex<IndexState>,
    writer: IndexWriter,
}

impl AsyncDirConversationRepository {
    /// Opens the store described by `config`.
    pub async fn from_config(
        config: &StoreConfig,
        session: Arc<PassphraseSession>,
    ) -> Result<Self> {
        let root = match &config.data_dir {
            Some(dir) => dir.clone(),
            None => ScribePaths::data_dir()?,
        };
        Self::with_settings(
            root,
            session,
            Duration::from_millis(config.index_flush_window_ms),
            EnvelopeCodec::new(),
        )
        .await
    }

    /// Opens the store at `root` with default settings.
    pub async fn new(root: impl AsRef<Path>, session: Arc<PassphraseSession>) -> Result<Self> {
        Self::with_settings(
            root,
            session,
            Duration::from_millis(DEFAULT_INDEX_FLUSH_WINDOW_MS),
            EnvelopeCodec::new(),
        )
        .await
    }

    /// Opens the store at `root`.
    ///
    /// # Arguments
    ///
    /// * `flush_window` - Index coalescing window; zero writes through
    /// * `codec` - Envelope codec used for new envelopes
    ///
    /// # Errors
    ///
    /// Returns an error if the store directories cannot be created.
    pub async fn with_settings(
        root: impl AsRef<Path>,
        session: Arc<PassphraseSession>,
        flush_window: Duration,
        codec: EnvelopeCodec,
    ) -> Result<Self> {
        let layout = StoreLayout::new(root.as_ref());
        fs::create_dir_all(layout.conversations_dir()).await?;

        let writer = IndexWriter::spawn(layout.index_file(), flush_window);
        tracing::debug!(
            root = %layout.root().display(),
            ?flush_window,
            "conversation store opened"
        );

        Ok(Self {
            layout,
            session,
            codec,
            index: Mutex::new(IndexState::default()),
            writer,
        })
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn session(&self) -> &Arc<PassphraseSession> {
        &self.session
    }

    /// Path of the file backing conversation `id`.
    pub fn conversation_path(&self, id: &str) -> Result<PathBuf> {
        self.layout.conversation_file(id)
    }

    /// Loads the index, migrating a legacy layout if needed, and reports
    /// what the load did. Later calls return the first report.
    pub async fn migrate(&self) -> Result<MigrationReport> {
        let passphrase = self.session.snapshot();
        let mut state = self.index.lock().await;
        self.ensure_loaded(&mut state, passphrase.as_ref()).await?;
        Ok(state.report.clone().unwrap_or_default())
    }

    async fn ensure_loaded(
        &self,
        state: &mut IndexState,
        passphrase: Option<&Passphrase>,
    ) -> Result<()> {
        if state.file.is_some() {
            return Ok(());
        }
        let (file, report) = IndexMigrator::new(&self.layout, &self.codec)
            .load_or_migrate(passphrase)
            .await?;
        state.file = Some(file);
        state.view = None;
        state.report = Some(report);
        Ok(())
    }

    /// Returns the index view for `passphrase`, opening it if the cached
    /// view belongs to another passphrase.
    async fn index_view<'a>(
        &self,
        state: &'a mut IndexState,
        passphrase: Option<&Passphrase>,
    ) -> Result<&'a mut IndexView> {
        self.ensure_loaded(state, passphrase).await?;

        let cached = state.view.as_ref().is_some_and(|v| v.is_for(passphrase));
        if !cached {
            let file = state
                .file
                .as_ref()
                .ok_or_else(|| ScribeError::internal("index not loaded"))?;
            let view = IndexView::open(file, &self.codec, passphrase.cloned()).await?;
            tracing::debug!(
                entries = view.len(),
                sealed = view.sealed_segments(),
                "index view opened"
            );
            state.view = Some(view);
        }

        state
            .view
            .as_mut()
            .ok_or_else(|| ScribeError::internal("index view missing"))
    }

    /// Opens the index for `passphrase` without holding the lock afterwards.
    ///
    /// Writers call this before touching a conversation file: nothing on
    /// disk changes while the index cannot be opened.
    async fn ready_index(&self, passphrase: Option<&Passphrase>) -> Result<()> {
        let mut state = self.index.lock().await;
        self.index_view(&mut state, passphrase).await.map(|_| ())
    }

    /// Re-serializes the current view and hands it to the writer.
    async fn commit(&self, state: &mut IndexState) -> Result<()> {
        let view = state
            .view
            .as_ref()
            .ok_or_else(|| ScribeError::internal("index view missing"))?;
        let file = view.to_file(&self.codec).await?;
        let bytes = serde_json::to_vec_pretty(&file)?;
        state.file = Some(file);
        self.writer.submit(bytes).await
    }
}

#[async_trait]
impl ConversationRepository for AsyncDirConversationRepository {
    async fn save(&self, conversation: &Conversation) -> Result<()> {
        let passphrase = self.session.snapshot();
        self.ready_index(passphrase.as_ref()).await?;
        write_conversation(&self.layout, &self.codec, conversation, passphrase.as_ref()).await?;

        let mut state = self.index.lock().await;
        let view = self.index_view(&mut state, passphrase.as_ref()).await?;
        view.upsert(conversation.index_entry());
        self.commit(&mut state).await?;

        tracing::debug!(
            id = %conversation.id,
            encrypted = passphrase.is_some(),
            "conversation saved"
        );
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Conversation>> {
        let passphrase = self.session.snapshot();
        read_conversation(&self.layout, &self.codec, id, passphrase.as_ref()).await
    }

    async fn list(&self) -> Result<Vec<IndexEntry>> {
        let passphrase = self.session.snapshot();
        let mut state = self.index.lock().await;

        match self.index_view(&mut state, passphrase.as_ref()).await {
            Ok(view) => Ok(view.entries_newest_first()),
            Err(err) if err.is_unreadable() => {
                // An encrypted legacy index stays untouched until it can be opened.
                tracing::debug!(reason = %err, "index not readable yet");
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let passphrase = self.session.snapshot();
        let path = self.layout.conversation_file(id)?;
        self.ready_index(passphrase.as_ref()).await?;
        let removed_file = atomic_file::remove_if_exists(&path).await?;

        let mut state = self.index.lock().await;
        let view = self.index_view(&mut state, passphrase.as_ref()).await?;
        if view.remove(id) {
            self.commit(&mut state).await?;
        }

        tracing::debug!(id, removed_file, "conversation deleted");
        Ok(())
    }

    async fn export_as_text(&self, id: &str) -> Result<Option<String>> {
        Ok(self.load(id).await?.as_ref().map(render_transcript))
    }

    async fn flush(&self) -> Result<()> {
        self.writer.flush().await
    }

    async fn shutdown(&self) -> Result<()> {
        self.writer.shutdown().await
    }
}
