//! Error types for the `docvault-rag` crate.

use thiserror::Error;

/// Errors that can occur while ingesting or retrieving documents.
#[derive(Debug, Error)]
pub enum RagError {
    /// A request field was missing or malformed. Raised before any external call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An uploaded file could not be decoded into text.
    #[error("Failed to load document '{path}': {message}")]
    DocumentLoad {
        /// The path (or name) of the offending file.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding model was unavailable or produced malformed output.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector store could not be reached.
    #[error("Vector store unavailable ({backend}): {message}")]
    StoreUnavailable {
        /// The vector store backend that could not be reached.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector store was reachable but rejected the request.
    #[error("Vector store error ({backend}): {message}")]
    VectorStore {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// Some batches of an ingestion were committed before a later batch failed.
    ///
    /// Items already committed are not rolled back.
    #[error("Partial commit: {committed} of {attempted} chunks were added before failure: {message}")]
    PartialCommit {
        /// Number of chunks known to be committed.
        committed: usize,
        /// Number of chunks the ingestion attempted to add.
        attempted: usize,
        /// Collection count read back after the failure, if the store answered.
        collection_count: Option<usize>,
        /// The underlying failure.
        message: String,
    },

    /// Every chunk was indexed but the staged source files could not all be removed.
    #[error("Indexed {indexed} chunks but failed to remove staged files: {}", failures.join("; "))]
    Cleanup {
        /// Number of chunks added before cleanup ran.
        indexed: usize,
        /// Collection count read back after the failure, if the store answered.
        collection_count: Option<usize>,
        /// One entry per file that could not be removed.
        failures: Vec<String>,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// Whether some of the requested work may already be persisted in the store.
    ///
    /// `false` means nothing usable was added by the failing call.
    pub fn may_be_partial(&self) -> bool {
        matches!(self, RagError::PartialCommit { .. } | RagError::Cleanup { .. })
    }

    /// The collection count captured when the error was raised, if any.
    pub fn collection_count(&self) -> Option<usize> {
        match self {
            RagError::PartialCommit { collection_count, .. }
            | RagError::Cleanup { collection_count, .. } => *collection_count,
            _ => None,
        }
    }

    /// Whether the error was caused by the caller rather than a collaborator.
    pub fn is_validation(&self) -> bool {
        matches!(self, RagError::Validation(_))
    }

    pub(crate) fn store_unavailable(backend: &str, message: impl Into<String>) -> Self {
        RagError::StoreUnavailable { backend: backend.to_string(), message: message.into() }
    }

    pub(crate) fn vector_store(backend: &str, message: impl Into<String>) -> Self {
        RagError::VectorStore { backend: backend.to_string(), message: message.into() }
    }

    pub(crate) fn embedding(provider: &str, message: impl Into<String>) -> Self {
        RagError::Embedding { provider: provider.to_string(), message: message.into() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
