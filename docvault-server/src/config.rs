//! Service configuration read from `DOCVAULT_*` environment variables.

use std::{path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use anyhow::{Context, bail};
use docvault_rag::{
    ChromaVectorStore, ChunkStrategy, EmbeddingProvider, HashEmbeddingProvider,
    InMemoryVectorStore, OpenAiCompatibleEmbedder, RagConfig, RagPipeline, VectorStore,
    chroma, openai,
};

/// Which vector store backs the pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StoreKind {
    #[default]
    Chroma,
    Memory,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chroma" | "chromadb" => Ok(StoreKind::Chroma),
            "memory" | "in-memory" | "inmemory" => Ok(StoreKind::Memory),
            other => bail!("unknown vector store '{other}' (expected 'chroma' or 'memory')"),
        }
    }
}

/// Which embedder turns text into vectors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmbeddingKind {
    #[default]
    Hash,
    OpenAi,
}

impl FromStr for EmbeddingKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hash" => Ok(EmbeddingKind::Hash),
            "openai" | "http" => Ok(EmbeddingKind::OpenAi),
            other => bail!("unknown embedding provider '{other}' (expected 'hash' or 'openai')"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Root of the upload staging area; each request gets its own subdirectory.
    pub upload_dir: PathBuf,
    pub store: StoreKind,
    pub chroma_url: String,
    /// Per-request timeout for the vector store and embedding endpoint.
    pub request_timeout: Duration,
    pub embedding: EmbeddingKind,
    pub embedding_model: String,
    pub embedding_url: String,
    pub embedding_dimensions: usize,
    pub embedding_api_key: Option<String>,
    pub rag: RagConfig,
    /// Collection answered by `/message` when the request names none.
    pub default_collection: String,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5002,
            upload_dir: PathBuf::from("upload"),
            store: StoreKind::default(),
            chroma_url: chroma::DEFAULT_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            embedding: EmbeddingKind::default(),
            embedding_model: openai::DEFAULT_MODEL.to_string(),
            embedding_url: openai::OPENAI_BASE_URL.to_string(),
            embedding_dimensions: openai::DEFAULT_DIMENSIONS,
            embedding_api_key: None,
            rag: RagConfig::default(),
            default_collection: "general".to_string(),
            max_upload_bytes: 32 * 1024 * 1024,
        }
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("invalid value for {key}: '{raw}': {e}")),
        _ => Ok(None),
    }
}

impl ServerConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, falling back to defaults for unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup("DOCVAULT_HOST").filter(|h| !h.trim().is_empty()) {
            config.host = host;
        }
        if let Some(port) = parsed(&lookup, "DOCVAULT_PORT")? {
            config.port = port;
        }
        if let Some(dir) = lookup("DOCVAULT_UPLOAD_DIR").filter(|d| !d.trim().is_empty()) {
            config.upload_dir = PathBuf::from(dir);
        }
        if let Some(store) = parsed(&lookup, "DOCVAULT_STORE")? {
            config.store = store;
        }
        if let Some(url) = lookup("DOCVAULT_CHROMA_URL").filter(|u| !u.trim().is_empty()) {
            config.chroma_url = url;
        }
        if let Some(secs) = parsed::<u64>(&lookup, "DOCVAULT_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(embedding) = parsed(&lookup, "DOCVAULT_EMBEDDING_PROVIDER")? {
            config.embedding = embedding;
        }
        if let Some(model) = lookup("DOCVAULT_EMBEDDING_MODEL").filter(|m| !m.trim().is_empty()) {
            config.embedding_model = model;
        }
        if let Some(url) = lookup("DOCVAULT_EMBEDDING_URL").filter(|u| !u.trim().is_empty()) {
            config.embedding_url = url;
        }
        if let Some(dims) = parsed(&lookup, "DOCVAULT_EMBEDDING_DIMENSIONS")? {
            config.embedding_dimensions = dims;
        }
        config.embedding_api_key = lookup("DOCVAULT_EMBEDDING_API_KEY")
            .or_else(|| lookup("OPENAI_API_KEY"))
            .filter(|k| !k.trim().is_empty());

        if let Some(size) = parsed(&lookup, "DOCVAULT_CHUNK_SIZE")? {
            config.rag.chunk_size = size;
        }
        if let Some(overlap) = parsed(&lookup, "DOCVAULT_CHUNK_OVERLAP")? {
            config.rag.chunk_overlap = overlap;
        }
        if let Some(strategy) = parsed::<ChunkStrategy>(&lookup, "DOCVAULT_CHUNK_STRATEGY")? {
            config.rag.chunk_strategy = strategy;
        }
        if let Some(k) = parsed(&lookup, "DOCVAULT_TOP_K")? {
            config.rag.top_k = k;
        }
        if let Some(collection) = lookup("DOCVAULT_DEFAULT_COLLECTION").filter(|c| !c.trim().is_empty()) {
            config.default_collection = collection;
        }
        if let Some(bytes) = parsed(&lookup, "DOCVAULT_MAX_UPLOAD_BYTES")? {
            config.max_upload_bytes = bytes;
        }

        config.rag.validate().context("invalid pipeline settings")?;
        if config.embedding_dimensions == 0 {
            bail!("DOCVAULT_EMBEDDING_DIMENSIONS must be greater than zero");
        }
        Ok(config)
    }

    pub fn embedding_provider(&self) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
        let provider: Arc<dyn EmbeddingProvider> = match self.embedding {
            EmbeddingKind::Hash => Arc::new(HashEmbeddingProvider::new(self.embedding_dimensions)),
            EmbeddingKind::OpenAi => {
                let mut embedder = OpenAiCompatibleEmbedder::new(&self.embedding_url)?
                    .with_model(self.embedding_model.clone())
                    .with_dimensions(self.embedding_dimensions)
                    .with_timeout(self.request_timeout)?;
                if let Some(key) = &self.embedding_api_key {
                    embedder = embedder.with_api_key(key.clone());
                }
                Arc::new(embedder)
            }
        };
        Ok(provider)
    }

    pub fn vector_store(&self) -> anyhow::Result<Arc<dyn VectorStore>> {
        let store: Arc<dyn VectorStore> = match self.store {
            StoreKind::Chroma => {
                Arc::new(ChromaVectorStore::with_timeout(&self.chroma_url, self.request_timeout)?)
            }
            StoreKind::Memory => Arc::new(InMemoryVectorStore::new()),
        };
        Ok(store)
    }

    /// Build the process-wide pipeline from this configuration.
    pub fn build_pipeline(&self) -> anyhow::Result<RagPipeline> {
        let pipeline = RagPipeline::builder()
            .config(self.rag.clone())
            .embedding_provider(self.embedding_provider()?)
            .vector_store(self.vector_store()?)
            .build()?;
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 5002);
        assert_eq!(config.store, StoreKind::Chroma);
        assert_eq!(config.embedding, EmbeddingKind::Hash);
        assert_eq!(config.rag.chunk_size, 1000);
        assert_eq!(config.rag.top_k, 4);
        assert_eq!(config.chroma_url, "http://localhost:8000");
    }

    #[test]
    fn reads_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("DOCVAULT_PORT", "8099"),
            ("DOCVAULT_STORE", "memory"),
            ("DOCVAULT_CHUNK_SIZE", "500"),
            ("DOCVAULT_CHUNK_OVERLAP", "50"),
            ("DOCVAULT_CHUNK_STRATEGY", "paragraph"),
            ("DOCVAULT_TOP_K", "8"),
            ("OPENAI_API_KEY", "sk-test"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8099);
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.rag.chunk_size, 500);
        assert_eq!(config.rag.chunk_overlap, 50);
        assert_eq!(config.rag.chunk_strategy, ChunkStrategy::Separator);
        assert_eq!(config.rag.top_k, 8);
        assert_eq!(config.embedding_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(ServerConfig::from_lookup(lookup(&[("DOCVAULT_PORT", "http")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("DOCVAULT_STORE", "redis")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("DOCVAULT_CHUNK_OVERLAP", "1000")])).is_err());
    }

    #[test]
    fn builds_an_in_memory_pipeline() {
        let config = ServerConfig::from_lookup(lookup(&[("DOCVAULT_STORE", "memory")])).unwrap();
        let pipeline = config.build_pipeline().unwrap();
        assert_eq!(pipeline.vector_store().name(), "in-memory");
    }
}
