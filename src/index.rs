//! Similarity index over corpus chunks.
//!
//! Three layers:
//!
//! - [`VectorIndex`] — an immutable, in-memory list of `(chunk, embedding)`
//!   entries in insertion order, with brute-force cosine search.
//! - [`IndexStore`] — a directory holding a SQLite file that persists one
//!   index. A directory that exists and is non-empty is the signal to load
//!   instead of rebuilding. Saving replaces every row inside a single
//!   transaction, so a failed build never clobbers the previous copy.
//! - [`KnowledgeBase`] — the `Unloaded → Ready` lifecycle. Queries share an
//!   `Arc<VectorIndex>` and run in parallel; building or rebuilding happens
//!   off to the side and swaps the new index in atomically.
//!
//! ```text
//!  Unloaded ──ensure_ready()──▶ persisted copy usable? ──yes──▶ Ready(loaded)
//!                                        │ no
//!                                        ▼
//!                               load corpus → chunk → embed → save ──▶ Ready(built)
//!                                        │ empty corpus
//!                                        ▼
//!                               Configuration error (state stays Unloaded)
//! ```

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::chunk::chunk_units;
use crate::config::{ChunkingConfig, Config, CorpusConfig};
use crate::corpus;
use crate::db;
use crate::embedding::{self, blob_to_vec, cosine_similarity, vec_to_blob, Embedder};
use crate::error::{AshaError, Stage};
use crate::models::{Chunk, RetrievedChunk, SourceUnit};

/// File name of the SQLite database inside the index directory.
pub const INDEX_FILE: &str = "index.sqlite";

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Immutable in-memory similarity index.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    model: String,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Assemble an index from entries. Entries repeating an earlier chunk id
    /// are dropped, so there is exactly one entry per chunk.
    pub fn from_entries(model: impl Into<String>, entries: Vec<IndexEntry>) -> Self {
        let mut seen = HashSet::new();
        let entries = entries
            .into_iter()
            .filter(|e| seen.insert(e.chunk.id.clone()))
            .collect();
        Self {
            model: model.into(),
            entries,
        }
    }

    /// Embed every chunk and assemble the index.
    pub async fn build(
        embedder: &dyn Embedder,
        chunks: Vec<Chunk>,
        batch_size: usize,
    ) -> Result<Self, AshaError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedding::embed_batched(embedder, &texts, batch_size)
            .await
            .map_err(|e| e.at_stage(Stage::IndexBuild))?;

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect();
        Ok(Self::from_entries(embedder.model_name(), entries))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// The `k` entries most similar to `query_vec`, best first. Equal scores
    /// keep insertion order.
    pub fn nearest(&self, query_vec: &[f32], k: usize) -> Vec<RetrievedChunk> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query_vec, &e.vector)))
            .collect();

        // NaN (e.g. from an overflowed vector) ranks below every real score.
        for (_, score) in scored.iter_mut() {
            if score.is_nan() {
                *score = f32::NEG_INFINITY;
            }
        }
        // Stable sort: ties stay in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| RetrievedChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect()
    }

    /// Embed `text` and return the `k` nearest chunks.
    pub async fn query(
        &self,
        embedder: &dyn Embedder,
        text: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, AshaError> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = embedding::embed_query(embedder, text)
            .await
            .map_err(|e| e.at_stage(Stage::Retrieval))?;
        Ok(self.nearest(&query_vec, k))
    }
}

/// Directory-backed persistence for a [`VectorIndex`].
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn db_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    /// True when the index directory exists and contains anything.
    pub fn has_persisted(&self) -> bool {
        self.dir.is_dir()
            && std::fs::read_dir(&self.dir)
                .map(|mut entries| entries.next().is_some())
                .unwrap_or(false)
    }

    async fn open(&self) -> Result<SqlitePool, AshaError> {
        let pool = db::connect(&self.db_path()).await?;
        migrate(&pool).await?;
        Ok(pool)
    }

    /// Read the persisted index without recomputing any embeddings.
    ///
    /// `Ok(None)` means there is nothing usable to load.
    pub async fn load(&self) -> Result<Option<VectorIndex>, AshaError> {
        if !self.has_persisted() {
            return Ok(None);
        }

        let pool = self.open().await?;

        let model: Option<String> =
            sqlx::query_scalar("SELECT value FROM index_meta WHERE key = 'model'")
                .fetch_optional(&pool)
                .await?;

        let rows = sqlx::query(
            "SELECT id, origin, unit, seq, text, hash, embedding FROM index_entries ORDER BY position",
        )
        .fetch_all(&pool)
        .await?;
        pool.close().await;

        let Some(model) = model else {
            return Ok(None);
        };
        if rows.is_empty() {
            return Ok(None);
        }

        let entries = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                IndexEntry {
                    chunk: Chunk {
                        id: row.get("id"),
                        origin: row.get("origin"),
                        unit: row.get("unit"),
                        seq: row.get("seq"),
                        text: row.get("text"),
                        hash: row.get("hash"),
                    },
                    vector: blob_to_vec(&blob),
                }
            })
            .collect();

        Ok(Some(VectorIndex::from_entries(model, entries)))
    }

    /// Replace the persisted index with `index`, all-or-nothing.
    pub async fn save(&self, index: &VectorIndex) -> Result<(), AshaError> {
        let pool = self.open().await?;
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM index_entries")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM index_meta")
            .execute(&mut *tx)
            .await?;

        for (position, entry) in index.entries().iter().enumerate() {
            sqlx::query(
                "INSERT INTO index_entries (position, id, origin, unit, seq, text, hash, embedding) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(position as i64)
            .bind(&entry.chunk.id)
            .bind(&entry.chunk.origin)
            .bind(entry.chunk.unit)
            .bind(entry.chunk.seq)
            .bind(&entry.chunk.text)
            .bind(&entry.chunk.hash)
            .bind(vec_to_blob(&entry.vector))
            .execute(&mut *tx)
            .await?;
        }

        let dims = index
            .entries()
            .first()
            .map(|e| e.vector.len())
            .unwrap_or(0);
        for (key, value) in [
            ("model", index.model().to_string()),
            ("dims", dims.to_string()),
            ("built_at", Utc::now().to_rfc3339()),
        ] {
            sqlx::query("INSERT INTO index_meta (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        pool.close().await;
        Ok(())
    }
}

async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_entries (
            position INTEGER PRIMARY KEY,
            id TEXT NOT NULL UNIQUE,
            origin TEXT NOT NULL,
            unit INTEGER NOT NULL,
            seq INTEGER NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn no_documents() -> AshaError {
    AshaError::configuration("no existing database and no documents provided to create one")
}

/// Chunk and embed `units` into a fresh index and persist it.
///
/// Fails with [`AshaError::Configuration`] when `units` is empty, so an
/// empty index is never built.
pub async fn build_index(
    store: &IndexStore,
    embedder: &dyn Embedder,
    units: &[SourceUnit],
    chunking: &ChunkingConfig,
    batch_size: usize,
) -> Result<VectorIndex, AshaError> {
    if units.is_empty() {
        return Err(no_documents());
    }

    let chunks = chunk_units(units, chunking.max_chars, chunking.overlap_chars);
    tracing::info!(units = units.len(), chunks = chunks.len(), "building index");

    let index = VectorIndex::build(embedder, chunks, batch_size).await?;
    store.save(&index).await?;
    tracing::info!(entries = index.len(), dir = %store.dir().display(), "index persisted");
    Ok(index)
}

/// The persisted index, if there is one built with `embedder`'s model.
///
/// A persisted index that fails to load, or was built with a different
/// embedding model, is reported and treated as absent so it gets rebuilt.
async fn load_usable(store: &IndexStore, embedder: &dyn Embedder) -> Option<VectorIndex> {
    match store.load().await {
        Ok(Some(index)) if index.model() == embedder.model_name() => {
            tracing::info!(entries = index.len(), "loaded existing index");
            Some(index)
        }
        Ok(Some(index)) => {
            tracing::warn!(
                persisted = index.model(),
                configured = embedder.model_name(),
                "persisted index was built with a different embedding model; rebuilding"
            );
            None
        }
        Ok(None) => None,
        Err(e) => {
            tracing::error!(error = %e, "error loading existing index; will create a new one");
            None
        }
    }
}

/// Lifecycle state of the shared index.
#[derive(Debug, Clone)]
pub enum IndexState {
    Unloaded,
    Ready(Arc<VectorIndex>),
}

/// Snapshot reported by [`KnowledgeBase::status`].
#[derive(Debug, Clone)]
pub struct IndexStatus {
    pub ready: bool,
    pub entries: usize,
    pub model: Option<String>,
    pub persisted: bool,
}

/// Owns the shared index and its `Unloaded → Ready` transition.
pub struct KnowledgeBase {
    store: IndexStore,
    corpus: CorpusConfig,
    chunking: ChunkingConfig,
    batch_size: usize,
    embedder: Arc<dyn Embedder>,
    state: RwLock<IndexState>,
    /// Serializes builds so two callers never embed the corpus at once.
    build_lock: Mutex<()>,
}

impl KnowledgeBase {
    pub fn new(config: &Config, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store: IndexStore::new(&config.index.dir),
            corpus: config.corpus.clone(),
            chunking: config.chunking.clone(),
            batch_size: config.embedding.batch_size,
            embedder,
            state: RwLock::new(IndexState::Unloaded),
            build_lock: Mutex::new(()),
        }
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub async fn is_ready(&self) -> bool {
        matches!(*self.state.read().await, IndexState::Ready(_))
    }

    /// Return the ready index, loading or building it on first use.
    ///
    /// On failure the state stays `Unloaded` and the next call retries.
    pub async fn ensure_ready(&self) -> Result<Arc<VectorIndex>, AshaError> {
        if let IndexState::Ready(index) = &*self.state.read().await {
            return Ok(index.clone());
        }

        let _guard = self.build_lock.lock().await;
        if let IndexState::Ready(index) = &*self.state.read().await {
            return Ok(index.clone());
        }

        let index = match load_usable(&self.store, self.embedder()).await {
            Some(index) => index,
            None => {
                let units = self.load_corpus().await?;
                build_index(
                    &self.store,
                    self.embedder(),
                    &units,
                    &self.chunking,
                    self.batch_size,
                )
                .await?
            }
        };

        let index = Arc::new(index);
        *self.state.write().await = IndexState::Ready(index.clone());
        Ok(index)
    }

    /// Reprocess the full corpus into a new index and swap it in.
    ///
    /// Queries keep using the previous index until the swap; if the build
    /// fails, the previous index (in memory and on disk) stays in place.
    pub async fn rebuild(&self) -> Result<Arc<VectorIndex>, AshaError> {
        let _guard = self.build_lock.lock().await;

        let units = self.load_corpus().await?;
        let index = build_index(
            &self.store,
            self.embedder(),
            &units,
            &self.chunking,
            self.batch_size,
        )
        .await?;

        let index = Arc::new(index);
        *self.state.write().await = IndexState::Ready(index.clone());
        Ok(index)
    }

    /// Read the corpus on the blocking pool; file and PDF parsing is
    /// synchronous.
    async fn load_corpus(&self) -> Result<Vec<SourceUnit>, AshaError> {
        let config = self.corpus.clone();
        tokio::task::spawn_blocking(move || corpus::load_corpus(&config))
            .await
            .map_err(|e| AshaError::SourceUnavailable {
                path: self.corpus.root.clone(),
                reason: format!("corpus loading aborted: {}", e),
            })
    }

    /// Query the index, readying it first if needed.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedChunk>, AshaError> {
        let index = self.ensure_ready().await?;
        index.query(self.embedder(), text, k).await
    }

    pub async fn status(&self) -> IndexStatus {
        let state = self.state.read().await.clone();
        match state {
            IndexState::Ready(index) => IndexStatus {
                ready: true,
                entries: index.len(),
                model: Some(index.model().to_string()),
                persisted: self.store.has_persisted(),
            },
            IndexState::Unloaded => IndexStatus {
                ready: false,
                entries: 0,
                model: None,
                persisted: self.store.has_persisted(),
            },
        }
    }
}
