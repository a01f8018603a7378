//! Chroma vector store backend.
//!
//! Provides [`ChromaVectorStore`] which implements [`VectorStore`] over the
//! Chroma server's REST API (`/api/v1`). Chroma stores the vectors it is given,
//! so the pipeline embeds text before calling `add` and `similarity_search`.
//!
//! # Example
//!
//! ```rust,ignore
//! use docvault_rag::chroma::ChromaVectorStore;
//!
//! let store = ChromaVectorStore::new("http://localhost:8000")?;
//! let handle = store.get_or_create_collection("docs").await?;
//! store.add(&handle, &items).await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::document::{CollectionHandle, IndexedItem, Metadata, SearchQuery, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

const BACKEND: &str = "chroma";

/// The default Chroma server address.
pub const DEFAULT_URL: &str = "http://localhost:8000";

/// A [`VectorStore`] backed by a [Chroma](https://www.trychroma.com/) server.
#[derive(Debug, Clone)]
pub struct ChromaVectorStore {
    client: reqwest::Client,
    api: Url,
}

#[derive(Debug, Deserialize)]
struct ChromaCollection {
    id: String,
    name: String,
}

#[derive(Serialize)]
struct CreateCollectionRequest<'a> {
    name: &'a str,
    get_or_create: bool,
}

#[derive(Serialize)]
struct AddRequest<'a> {
    ids: Vec<&'a str>,
    embeddings: Vec<&'a [f32]>,
    metadatas: Vec<Map<String, Value>>,
    documents: Vec<&'a str>,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query_embeddings: [&'a [f32]; 1],
    n_results: usize,
    include: [&'static str; 3],
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Map<String, Value>>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

#[derive(Deserialize)]
struct Heartbeat {
    #[serde(rename = "nanosecond heartbeat")]
    nanos: u64,
}

impl ChromaVectorStore {
    /// Create a store talking to the Chroma server at `base_url`.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::from_client(reqwest::Client::new(), base_url)
    }

    /// Create a store whose requests time out after `timeout`.
    pub fn with_timeout(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::Config(format!("failed to build Chroma HTTP client: {e}")))?;
        Self::from_client(client, base_url)
    }

    /// Create a store from an existing HTTP client.
    pub fn from_client(client: reqwest::Client, base_url: impl AsRef<str>) -> Result<Self> {
        let base_url = base_url.as_ref().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(RagError::Config("Chroma URL must not be empty".to_string()));
        }
        let api = Url::parse(&format!("{base_url}/api/v1"))
            .map_err(|e| RagError::Config(format!("invalid Chroma URL '{base_url}': {e}")))?;
        if api.cannot_be_a_base() {
            return Err(RagError::Config(format!("Chroma URL '{base_url}' cannot carry a path")));
        }
        Ok(Self { client, api })
    }

    /// Build an API URL from path segments. Each segment is percent-encoded on
    /// its own, so a collection name can never add segments, a query or a fragment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.api.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn map_send_err(e: reqwest::Error) -> RagError {
        RagError::store_unavailable(BACKEND, e.to_string())
    }

    async fn status_error(response: Response) -> RagError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = format!("server returned {status}: {body}");
        match status {
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
                RagError::store_unavailable(BACKEND, message)
            }
            _ => RagError::vector_store(BACKEND, message),
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| RagError::vector_store(BACKEND, format!("failed to parse response: {e}")))
    }

    /// Look a collection up by name; `None` when Chroma says it does not exist.
    async fn find_collection(&self, name: &str) -> Result<Option<ChromaCollection>> {
        let response = self
            .client
            .get(self.url(&["collections", name]))
            .send()
            .await
            .map_err(Self::map_send_err)?;

        let status = response.status();
        if status.is_success() {
            return Self::read_json(response).await.map(Some);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND || body.contains("does not exist") {
            debug!(collection = name, "chroma collection not found");
            return Ok(None);
        }
        Err(RagError::vector_store(BACKEND, format!("server returned {status}: {body}")))
    }

    async fn count_by_id(&self, id: &str) -> Result<usize> {
        let response = self
            .client
            .get(self.url(&["collections", id, "count"]))
            .send()
            .await
            .map_err(Self::map_send_err)?;
        Self::read_json(response).await
    }
}

fn metadata_to_json(metadata: &Metadata) -> Map<String, Value> {
    metadata.iter().map(|(k, v)| (k.clone(), Value::String(v.clone()))).collect()
}

fn metadata_from_json(map: Map<String, Value>) -> Metadata {
    map.into_iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k, s)),
            Value::Null => None,
            other => Some((k, other.to_string())),
        })
        .collect()
}

/// Chroma returns distances (lower is closer); map them to a higher-is-better score.
fn distance_to_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Flatten the single-query response Chroma returns into ordered results.
fn into_results(response: QueryResponse) -> Vec<SearchResult> {
    let ids = response.ids.into_iter().next().unwrap_or_default();
    let mut documents =
        response.documents.and_then(|d| d.into_iter().next()).unwrap_or_default().into_iter();
    let mut metadatas =
        response.metadatas.and_then(|m| m.into_iter().next()).unwrap_or_default().into_iter();
    let mut distances =
        response.distances.and_then(|d| d.into_iter().next()).unwrap_or_default().into_iter();

    ids.into_iter()
        .map(|id| SearchResult {
            id,
            text: documents.next().flatten().unwrap_or_default(),
            metadata: metadatas.next().flatten().map(metadata_from_json).unwrap_or_default(),
            score: distances.next().flatten().map_or(0.0, distance_to_score),
        })
        .collect()
}

#[async_trait]
impl VectorStore for ChromaVectorStore {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn get_or_create_collection(&self, name: &str) -> Result<CollectionHandle> {
        let response = self
            .client
            .post(self.url(&["collections"]))
            .json(&CreateCollectionRequest { name, get_or_create: true })
            .send()
            .await
            .map_err(Self::map_send_err)?;
        let collection: ChromaCollection = Self::read_json(response).await?;
        debug!(collection = %collection.name, id = %collection.id, "resolved chroma collection");
        Ok(CollectionHandle { name: collection.name, id: collection.id })
    }

    async fn add(&self, collection: &CollectionHandle, items: &[IndexedItem]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        let mut embeddings = Vec::with_capacity(items.len());
        for item in items {
            let embedding = item.embedding.as_deref().ok_or_else(|| {
                RagError::vector_store(BACKEND, format!("item '{}' has no embedding", item.id))
            })?;
            embeddings.push(embedding);
        }

        let request = AddRequest {
            ids: items.iter().map(|i| i.id.as_str()).collect(),
            embeddings,
            metadatas: items.iter().map(|i| metadata_to_json(&i.metadata)).collect(),
            documents: items.iter().map(|i| i.text.as_str()).collect(),
        };

        let response = self
            .client
            .post(self.url(&["collections", collection.id.as_str(), "add"]))
            .json(&request)
            .send()
            .await
            .map_err(Self::map_send_err)?;
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        debug!(collection = %collection.name, count = items.len(), "added items to chroma");
        Ok(())
    }

    async fn similarity_search(
        &self,
        collection: &str,
        query: &SearchQuery,
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        let Some(found) = self.find_collection(collection).await? else {
            return Ok(Vec::new());
        };
        let embedding = query
            .embedding
            .as_deref()
            .ok_or_else(|| RagError::vector_store(BACKEND, "query has no embedding"))?;

        // Chroma rejects n_results larger than the collection.
        let available = self.count_by_id(&found.id).await?;
        let n_results = k.min(available);
        if n_results == 0 {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(self.url(&["collections", found.id.as_str(), "query"]))
            .json(&QueryRequest {
                query_embeddings: [embedding],
                n_results,
                include: ["documents", "metadatas", "distances"],
            })
            .send()
            .await
            .map_err(Self::map_send_err)?;
        let parsed: QueryResponse = Self::read_json(response).await?;
        let results = into_results(parsed);
        debug!(collection, result_count = results.len(), "chroma query completed");
        Ok(results)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        match self.find_collection(collection).await? {
            Some(found) => self.count_by_id(&found.id).await,
            None => Ok(0),
        }
    }

    async fn reset(&self) -> Result<()> {
        let response =
            self.client.post(self.url(&["reset"])).send().await.map_err(Self::map_send_err)?;
        let reset: bool = Self::read_json(response).await?;
        if !reset {
            return Err(RagError::vector_store(BACKEND, "server declined to reset"));
        }
        debug!("reset chroma server");
        Ok(())
    }

    async fn heartbeat(&self) -> Result<u64> {
        let response =
            self.client.get(self.url(&["heartbeat"])).send().await.map_err(Self::map_send_err)?;
        let heartbeat: Heartbeat = Self::read_json(response).await?;
        Ok(heartbeat.nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trims_base_url() {
        let store = ChromaVectorStore::new("http://localhost:8000/").unwrap();
        assert_eq!(store.url(&["heartbeat"]).as_str(), "http://localhost:8000/api/v1/heartbeat");
    }

    #[test]
    fn collection_names_stay_one_path_segment() {
        let store = ChromaVectorStore::new(DEFAULT_URL).unwrap();
        let url = store.url(&["collections", "docs#secret?x=1/../other", "count"]);
        assert_eq!(url.path_segments().unwrap().count(), 5);
        assert!(url.path().starts_with("/api/v1/collections/docs%23secret%3F"));
        assert!(url.path().ends_with("/count"));
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }

    #[test]
    fn rejects_urls_without_a_path() {
        assert!(matches!(ChromaVectorStore::new("mailto:chroma"), Err(RagError::Config(_))));
        assert!(matches!(ChromaVectorStore::new("not a url"), Err(RagError::Config(_))));
    }

    #[test]
    fn parses_query_response_in_order() {
        let response: QueryResponse = serde_json::from_value(json!({
            "ids": [["a", "b"]],
            "documents": [["hello world", null]],
            "metadatas": [[{"source": "/tmp/upload/notes.txt", "page": 3}, null]],
            "distances": [[0.0, 1.0]],
            "embeddings": null
        }))
        .unwrap();

        let results = into_results(response);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert_eq!(results[0].text, "hello world");
        assert_eq!(results[0].metadata.get("source").unwrap(), "/tmp/upload/notes.txt");
        assert_eq!(results[0].metadata.get("page").unwrap(), "3");
        assert_eq!(results[0].score, 1.0);
        assert_eq!(results[1].text, "");
        assert!(results[1].metadata.is_empty());
        assert_eq!(results[1].score, 0.5);
    }

    #[test]
    fn empty_query_response_is_empty() {
        assert!(into_results(QueryResponse::default()).is_empty());
    }

    #[test]
    fn parses_heartbeat() {
        let hb: Heartbeat =
            serde_json::from_value(json!({"nanosecond heartbeat": 1_700_000_000_000_000_000u64}))
                .unwrap();
        assert_eq!(hb.nanos, 1_700_000_000_000_000_000);
    }

    #[tokio::test]
    async fn unreachable_server_is_store_unavailable() {
        let store =
            ChromaVectorStore::with_timeout("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        assert!(matches!(store.heartbeat().await, Err(RagError::StoreUnavailable { .. })));
    }
}
