//! In-memory vector store using cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], a vector store backed by a
//! `HashMap` protected by a `tokio::sync::RwLock`. It is suitable for
//! development, testing, and single-process deployments.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{CollectionHandle, IndexedItem, SearchQuery, SearchResult};
use crate::embedding::{EmbeddingProvider, check_batch};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

const BACKEND: &str = "in-memory";

#[derive(Debug, Default)]
struct Collection {
    items: Vec<IndexedItem>,
    ids: HashSet<String>,
}

/// An in-memory vector store using cosine similarity for search.
///
/// Items keep insertion order. When built with
/// [`with_embedder`](InMemoryVectorStore::with_embedder) the store embeds
/// item text and query text itself, mirroring databases that own their
/// embedding function.
///
/// # Example
///
/// ```rust,ignore
/// use docvault_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.get_or_create_collection("docs").await?;
/// ```
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl std::fmt::Debug for InMemoryVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVectorStore")
            .field("embeds_documents", &self.embedder.is_some())
            .finish_non_exhaustive()
    }
}

impl InMemoryVectorStore {
    /// Create a new empty store that expects callers to supply embeddings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty store that embeds text with the given provider.
    pub fn with_embedder(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { collections: RwLock::default(), embedder: Some(embedder) }
    }

    async fn resolve_embeddings(&self, items: &[IndexedItem]) -> Result<Vec<Vec<f32>>> {
        if let Some(embedder) = &self.embedder {
            let missing: Vec<&str> =
                items.iter().filter(|i| i.embedding.is_none()).map(|i| i.text.as_str()).collect();
            let computed = embedder.embed_batch(&missing).await?;
            check_batch(embedder.as_ref(), missing.len(), &computed)?;
            let mut computed = computed.into_iter();
            return Ok(items
                .iter()
                .map(|item| match &item.embedding {
                    Some(embedding) => embedding.clone(),
                    None => computed.next().unwrap_or_default(),
                })
                .collect());
        }

        items
            .iter()
            .map(|item| {
                item.embedding.clone().ok_or_else(|| {
                    RagError::vector_store(
                        BACKEND,
                        format!("item '{}' has no embedding and the store has no embedder", item.id),
                    )
                })
            })
            .collect()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &str {
        BACKEND
    }

    fn embeds_documents(&self) -> bool {
        self.embedder.is_some()
    }

    async fn get_or_create_collection(&self, name: &str) -> Result<CollectionHandle> {
        let mut collections = self.collections.write().await;
        collections.entry(name.to_string()).or_default();
        Ok(CollectionHandle { name: name.to_string(), id: name.to_string() })
    }

    async fn add(&self, collection: &CollectionHandle, items: &[IndexedItem]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        // Embed before taking the write lock; embedding may be slow.
        let embeddings = self.resolve_embeddings(items).await?;

        let mut collections = self.collections.write().await;
        let store = collections.get_mut(&collection.id).ok_or_else(|| {
            RagError::vector_store(BACKEND, format!("collection '{}' does not exist", collection.name))
        })?;

        let mut seen = HashSet::with_capacity(items.len());
        for item in items {
            if store.ids.contains(&item.id) || !seen.insert(item.id.as_str()) {
                return Err(RagError::vector_store(
                    BACKEND,
                    format!("duplicate id '{}'; 0 of {} items added", item.id, items.len()),
                ));
            }
        }

        for (item, embedding) in items.iter().zip(embeddings) {
            store.ids.insert(item.id.clone());
            store.items.push(IndexedItem { embedding: Some(embedding), ..item.clone() });
        }

        debug!(collection = %collection.name, count = items.len(), "added items");
        Ok(())
    }

    async fn similarity_search(
        &self,
        collection: &str,
        query: &SearchQuery,
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        {
            let collections = self.collections.read().await;
            if collections.get(collection).is_none_or(|c| c.items.is_empty()) {
                return Ok(Vec::new());
            }
        }

        let query_embedding = match (&query.embedding, &self.embedder) {
            (Some(embedding), _) => embedding.clone(),
            (None, Some(embedder)) => embedder.embed(&query.text).await?,
            (None, None) => {
                return Err(RagError::vector_store(
                    BACKEND,
                    "query has no embedding and the store has no embedder",
                ));
            }
        };

        let collections = self.collections.read().await;
        let Some(store) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<SearchResult> = store
            .items
            .iter()
            .map(|item| SearchResult {
                id: item.id.clone(),
                text: item.text.clone(),
                metadata: item.metadata.clone(),
                score: cosine_similarity(item.embedding.as_deref().unwrap_or_default(), &query_embedding),
            })
            .collect();

        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map_or(0, |c| c.items.len()))
    }

    async fn reset(&self) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.clear();
        debug!("reset in-memory store");
        Ok(())
    }

    async fn heartbeat(&self) -> Result<u64> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| RagError::store_unavailable(BACKEND, format!("clock error: {e}")))?
            .as_nanos();
        Ok(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Metadata;
    use crate::hashing::HashEmbeddingProvider;

    fn item(id: &str, text: &str, embedding: Option<Vec<f32>>) -> IndexedItem {
        IndexedItem { id: id.into(), text: text.into(), metadata: Metadata::new(), embedding }
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let store = InMemoryVectorStore::new();
        let a = store.get_or_create_collection("docs").await.unwrap();
        store.add(&a, &[item("1", "x", Some(vec![1.0, 0.0]))]).await.unwrap();
        let b = store.get_or_create_collection("docs").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.count("docs").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_ids_reject_whole_batch() {
        let store = InMemoryVectorStore::new();
        let handle = store.get_or_create_collection("docs").await.unwrap();
        store.add(&handle, &[item("1", "x", Some(vec![1.0]))]).await.unwrap();

        let batch = [item("2", "y", Some(vec![1.0])), item("1", "z", Some(vec![1.0]))];
        assert!(matches!(store.add(&handle, &batch).await, Err(RagError::VectorStore { .. })));
        assert_eq!(store.count("docs").await.unwrap(), 1);

        let repeated = [item("3", "y", Some(vec![1.0])), item("3", "z", Some(vec![1.0]))];
        assert!(store.add(&handle, &repeated).await.is_err());
        assert_eq!(store.count("docs").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn requires_embeddings_without_embedder() {
        let store = InMemoryVectorStore::new();
        let handle = store.get_or_create_collection("docs").await.unwrap();
        assert!(store.add(&handle, &[item("1", "x", None)]).await.is_err());
    }

    #[tokio::test]
    async fn embeds_text_with_embedder() {
        let store = InMemoryVectorStore::with_embedder(Arc::new(HashEmbeddingProvider::new(32)));
        assert!(store.embeds_documents());
        let handle = store.get_or_create_collection("docs").await.unwrap();
        store
            .add(&handle, &[item("1", "hello world", None), item("2", "goodbye moon", None)])
            .await
            .unwrap();

        let query = SearchQuery { text: "hello".into(), embedding: None };
        let results = store.similarity_search("docs", &query, 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "1");
    }

    #[tokio::test]
    async fn missing_collection_searches_empty() {
        let store = InMemoryVectorStore::new();
        let query = SearchQuery { text: "anything".into(), embedding: None };
        assert!(store.similarity_search("nope", &query, 4).await.unwrap().is_empty());
        assert_eq!(store.count("nope").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reset_drops_everything() {
        let store = InMemoryVectorStore::new();
        let handle = store.get_or_create_collection("docs").await.unwrap();
        store.add(&handle, &[item("1", "x", Some(vec![1.0]))]).await.unwrap();
        store.reset().await.unwrap();
        assert_eq!(store.count("docs").await.unwrap(), 0);
        assert!(store.heartbeat().await.unwrap() > 0);
    }
}
