//! Document ingestion and retrieval.
//!
//! Uploaded files are decoded by a [`DocumentLoader`], split by a [`Chunker`],
//! embedded by an [`EmbeddingProvider`], and stored in a named collection of a
//! [`VectorStore`]. Questions are answered by nearest-neighbour search over
//! the same collection. [`RagPipeline`] orchestrates both directions and
//! [`PipelineHandler`] exposes them to any transport.
//!
//! Backends:
//!
//! - [`InMemoryVectorStore`]: process-local, for development and tests
//! - [`ChromaVectorStore`]: a Chroma server over its REST API
//!
//! Embedders:
//!
//! - [`HashEmbeddingProvider`]: deterministic, offline
//! - [`OpenAiCompatibleEmbedder`]: any `/embeddings` endpoint

pub mod chroma;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod handler;
pub mod hashing;
pub mod inmemory;
pub mod loader;
pub mod openai;
pub mod pipeline;
pub mod response;
pub mod vectorstore;

pub use chroma::ChromaVectorStore;
pub use chunking::{Chunker, FixedSizeChunker, SeparatorChunker, chunker_for, split};
pub use config::{ChunkStrategy, LoadPolicy, RagConfig, RagConfigBuilder};
pub use document::{
    Chunk, CollectionHandle, Document, IndexedItem, Metadata, SOURCE_KEY, SearchQuery,
    SearchResult, SourceFile,
};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use handler::{ChatMessage, ChatReply, EventHandler, PipelineHandler};
pub use hashing::HashEmbeddingProvider;
pub use inmemory::InMemoryVectorStore;
pub use loader::{DocumentLoader, TextLoader};
pub use openai::OpenAiCompatibleEmbedder;
pub use pipeline::{Answer, IngestReport, RagPipeline, RagPipelineBuilder};
pub use response::{ErrorResponse, HealthResponse, IngestResponse, ResetResponse, SearchResponse};
pub use vectorstore::VectorStore;
