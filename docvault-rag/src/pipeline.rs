//! Ingestion and retrieval pipeline orchestrator.
//!
//! The [`RagPipeline`] composes a [`DocumentLoader`], a [`Chunker`], an
//! [`EmbeddingProvider`], and a [`VectorStore`]. It holds no mutable state of
//! its own: one instance is built at startup, shared behind an `Arc`, and
//! every call is independent.
//!
//! # Example
//!
//! ```rust,ignore
//! use docvault_rag::{HashEmbeddingProvider, InMemoryVectorStore, RagConfig, RagPipeline, SourceFile};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashEmbeddingProvider::default()))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .build()?;
//!
//! let report = pipeline.ingest("docs", vec![SourceFile::borrowed("notes.txt", bytes)]).await?;
//! let answer = pipeline.retrieve("docs", "search query").await?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::chunking::{Chunker, chunker_for};
use crate::config::{LoadPolicy, RagConfig};
use crate::document::{
    Chunk, CollectionHandle, IndexedItem, SearchQuery, SearchResult, SourceFile,
};
use crate::embedding::{EmbeddingProvider, check_batch};
use crate::error::{RagError, Result};
use crate::loader::{DocumentLoader, TextLoader};
use crate::vectorstore::VectorStore;

/// Outcome of a successful [`RagPipeline::ingest`] call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestReport {
    /// Number of files decoded into documents.
    pub documents: usize,
    /// Number of chunks added to the collection by this call.
    pub chunks_added: usize,
    /// Item count of the collection, read back after ingestion.
    pub collection_count: usize,
}

/// Aggregated answer for one question.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Answer {
    /// Text of every match, concatenated in the order returned.
    pub matched_text: String,
    /// Source file names (last path segment), deduplicated, in order of first appearance.
    pub sources: Vec<String>,
}

impl Answer {
    /// Aggregate search results into an answer.
    pub fn from_results(results: &[SearchResult]) -> Self {
        let mut answer = Answer::default();
        for result in results {
            answer.matched_text.push_str(&result.text);
            if let Some(source) = result.source_name() {
                if !answer.sources.iter().any(|s| s == source) {
                    answer.sources.push(source.to_string());
                }
            }
        }
        answer
    }

    /// Whether nothing matched.
    pub fn is_empty(&self) -> bool {
        self.matched_text.is_empty() && self.sources.is_empty()
    }
}

/// The pipeline orchestrator.
///
/// Ingestion runs load → chunk → (embed) → add → cleanup → count; retrieval
/// runs validate → (embed) → search → aggregate. Construct one via
/// [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    loader: Arc<dyn DocumentLoader>,
    chunker: Arc<dyn Chunker>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("config", &self.config)
            .field("embedding_provider", &self.embedding_provider.name())
            .field("vector_store", &self.vector_store.name())
            .finish_non_exhaustive()
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RagError::Validation(format!("'{field}' must not be empty")));
    }
    Ok(())
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Index a batch of files into `collection`.
    ///
    /// Every file is decoded before anything is written, so an unreadable file
    /// aborts the batch with nothing added (under [`LoadPolicy::Abort`]).
    /// Chunks are added in batches of `add_batch_size`. Staged files are
    /// deleted only after every chunk was added.
    ///
    /// # Errors
    ///
    /// - [`RagError::Validation`] for an empty collection name or file list.
    /// - [`RagError::DocumentLoad`] for an unreadable file.
    /// - [`RagError::Embedding`], [`RagError::StoreUnavailable`] or
    ///   [`RagError::VectorStore`] when the first batch fails.
    /// - [`RagError::PartialCommit`] when a later batch fails. Earlier batches
    ///   stay in the store; there is no rollback.
    /// - [`RagError::Cleanup`] when chunks were indexed but staged files could
    ///   not be removed.
    pub async fn ingest(&self, collection: &str, files: Vec<SourceFile>) -> Result<IngestReport> {
        require_non_empty("collection", collection)?;
        if files.is_empty() {
            return Err(RagError::Validation("no files supplied".to_string()));
        }

        let mut documents = Vec::with_capacity(files.len());
        for file in &files {
            match self.loader.load(file) {
                Ok(document) => documents.push(document),
                Err(e) if self.config.load_policy == LoadPolicy::Skip => {
                    warn!(collection, path = %file.display_path(), error = %e, "skipping unreadable file");
                }
                Err(e) => {
                    error!(collection, path = %file.display_path(), error = %e, "document load failed");
                    return Err(e);
                }
            }
        }

        let chunks: Vec<Chunk> = documents.iter().flat_map(|d| self.chunker.chunk(d)).collect();
        let attempted = chunks.len();

        let handle = self.vector_store.get_or_create_collection(collection).await.map_err(|e| {
            error!(collection, error = %e, "failed to open collection");
            e
        })?;

        let mut committed = 0;
        for batch in chunks.chunks(self.config.add_batch_size) {
            if let Err(e) = self.add_batch(&handle, batch).await {
                error!(collection, committed, attempted, error = %e, "add failed during ingestion");
                return Err(self.commit_failure(collection, committed, attempted, e).await);
            }
            committed += batch.len();
        }

        if let Err(failures) = self.cleanup(&files).await {
            let collection_count = self.count_after_failure(collection).await;
            return Err(RagError::Cleanup { indexed: committed, collection_count, failures });
        }

        let collection_count = self.vector_store.count(collection).await?;
        info!(
            collection,
            documents = documents.len(),
            chunk_count = committed,
            collection_count,
            "ingested documents"
        );

        Ok(IngestReport { documents: documents.len(), chunks_added: committed, collection_count })
    }

    async fn add_batch(&self, handle: &CollectionHandle, batch: &[Chunk]) -> Result<()> {
        let mut items: Vec<IndexedItem> = batch.iter().cloned().map(IndexedItem::from).collect();

        if !self.vector_store.embeds_documents() {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self.embedding_provider.embed_batch(&texts).await?;
            check_batch(self.embedding_provider.as_ref(), texts.len(), &embeddings)?;
            for (item, embedding) in items.iter_mut().zip(embeddings) {
                item.embedding = Some(embedding);
            }
        }

        self.vector_store.add(handle, &items).await
    }

    async fn commit_failure(
        &self,
        collection: &str,
        committed: usize,
        attempted: usize,
        cause: RagError,
    ) -> RagError {
        if committed == 0 {
            return cause;
        }
        let collection_count = self.count_after_failure(collection).await;
        RagError::PartialCommit { committed, attempted, collection_count, message: cause.to_string() }
    }

    async fn count_after_failure(&self, collection: &str) -> Option<usize> {
        match self.vector_store.count(collection).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(collection, error = %e, "could not read collection count after failure");
                None
            }
        }
    }

    /// Remove staged files, returning one message per file that could not be removed.
    async fn cleanup(&self, files: &[SourceFile]) -> std::result::Result<(), Vec<String>> {
        let mut failures = Vec::new();
        for file in files.iter().filter(|f| f.staged) {
            if let Err(e) = tokio::fs::remove_file(&file.path).await {
                warn!(path = %file.display_path(), error = %e, "failed to remove staged file");
                failures.push(format!("{}: {e}", file.display_path()));
            }
        }
        if failures.is_empty() { Ok(()) } else { Err(failures) }
    }

    /// Answer a question from `collection`.
    ///
    /// A missing or empty collection yields an empty [`Answer`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Validation`] before any external call when either
    /// argument is empty; otherwise propagates embedding and store errors.
    pub async fn retrieve(&self, collection: &str, query: &str) -> Result<Answer> {
        let results = self.search(collection, query, self.config.top_k).await?;
        let answer = Answer::from_results(&results);
        info!(
            collection,
            result_count = results.len(),
            source_count = answer.sources.len(),
            "retrieval completed"
        );
        Ok(answer)
    }

    /// Return the raw top-`k` matches for `query`.
    ///
    /// # Errors
    ///
    /// Same as [`retrieve`](RagPipeline::retrieve).
    pub async fn search(&self, collection: &str, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        require_non_empty("collection", collection)?;
        require_non_empty("query", query)?;
        if k == 0 {
            return Err(RagError::Validation("'k' must be greater than zero".to_string()));
        }

        let embedding = if self.vector_store.embeds_documents() {
            None
        } else {
            let embedding = self.embedding_provider.embed(query).await.map_err(|e| {
                error!(error = %e, "embedding failed during query");
                e
            })?;
            check_batch(self.embedding_provider.as_ref(), 1, std::slice::from_ref(&embedding))?;
            Some(embedding)
        };

        let search_query = SearchQuery { text: query.to_string(), embedding };
        self.vector_store.similarity_search(collection, &search_query, k).await.map_err(|e| {
            error!(collection, error = %e, "vector store search failed");
            e
        })
    }

    /// Number of items in `collection`.
    pub async fn count(&self, collection: &str) -> Result<usize> {
        require_non_empty("collection", collection)?;
        self.vector_store.count(collection).await
    }

    /// Destroy every collection in the store.
    pub async fn reset(&self) -> Result<()> {
        self.vector_store.reset().await.map_err(|e| {
            error!(error = %e, "reset failed");
            e
        })?;
        info!(backend = self.vector_store.name(), "vector store reset");
        Ok(())
    }

    /// Probe the store; returns its nanosecond heartbeat.
    pub async fn heartbeat(&self) -> Result<u64> {
        self.vector_store.heartbeat().await
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `embedding_provider` and `vector_store` are required. The config defaults
/// to [`RagConfig::default()`], the loader to [`TextLoader`], and the chunker
/// to the one described by the config.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .vector_store(Arc::new(store))
///     .chunker(Arc::new(chunker))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    loader: Option<Arc<dyn DocumentLoader>>,
    chunker: Option<Arc<dyn Chunker>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the document loader.
    pub fn loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Set the document chunker, overriding the config's strategy.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Build the [`RagPipeline`], validating the config and required fields.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required field is missing or the
    /// config is inconsistent.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::Config("vector_store is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| chunker_for(&config));
        let loader = self.loader.unwrap_or_else(|| Arc::new(TextLoader));

        Ok(RagPipeline { config, loader, chunker, embedding_provider, vector_store })
    }
}
