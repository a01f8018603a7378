//! Vector store trait: the capability surface of an external vector database.

use async_trait::async_trait;

use crate::document::{CollectionHandle, IndexedItem, SearchQuery, SearchResult};
use crate::error::Result;

/// A storage backend holding named collections of [`IndexedItem`]s.
///
/// Every method is one call to the external collaborator. Consistency under
/// concurrent writers is the backend's business; callers add no locking.
///
/// # Example
///
/// ```rust,ignore
/// use docvault_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// let handle = store.get_or_create_collection("docs").await?;
/// store.add(&handle, &items).await?;
/// let results = store.similarity_search("docs", &query, 4).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend label used in logs and errors.
    fn name(&self) -> &str;

    /// Whether the store embeds text itself.
    ///
    /// When `true`, callers may pass items and queries without embeddings.
    /// When `false`, every item and query must carry one.
    fn embeds_documents(&self) -> bool {
        false
    }

    /// Return a handle to the named collection, creating it if needed. Idempotent.
    async fn get_or_create_collection(&self, name: &str) -> Result<CollectionHandle>;

    /// Add items to a collection.
    ///
    /// Ids must be unique within the call and not already present. A rejected
    /// call writes nothing.
    async fn add(&self, collection: &CollectionHandle, items: &[IndexedItem]) -> Result<()>;

    /// Return at most `k` items ordered by decreasing relevance.
    ///
    /// A missing or empty collection yields an empty `Vec`, not an error.
    async fn similarity_search(
        &self,
        collection: &str,
        query: &SearchQuery,
        k: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Number of items in the collection; `0` if it does not exist.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Destroy every collection and its contents. Irreversible.
    async fn reset(&self) -> Result<()>;

    /// Liveness check; returns the store's nanosecond heartbeat.
    async fn heartbeat(&self) -> Result<u64>;
}
