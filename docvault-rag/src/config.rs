//! Configuration for the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// How document text is split into chunks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// Fixed character windows.
    #[default]
    Fixed,
    /// Prefer paragraph (`"\n\n"`) boundaries, falling back to fixed windows.
    Separator,
}

impl std::str::FromStr for ChunkStrategy {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(ChunkStrategy::Fixed),
            "separator" | "paragraph" => Ok(ChunkStrategy::Separator),
            other => Err(RagError::Config(format!("unknown chunk strategy '{other}'"))),
        }
    }
}

/// What to do with an uploaded file that cannot be decoded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadPolicy {
    /// Abort the whole batch before anything is indexed.
    #[default]
    Abort,
    /// Log and skip the file, indexing the rest.
    Skip,
}

/// Configuration parameters for the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Chunking strategy used when the pipeline builds its own chunker.
    pub chunk_strategy: ChunkStrategy,
    /// Number of results requested from the vector store per query.
    pub top_k: usize,
    /// Number of chunks sent to the vector store per `add` call.
    pub add_batch_size: usize,
    /// Policy for undecodable uploads.
    pub load_policy: LoadPolicy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 0,
            chunk_strategy: ChunkStrategy::Fixed,
            top_k: 4,
            add_batch_size: 64,
            load_policy: LoadPolicy::Abort,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `add_batch_size == 0`
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than zero".to_string()));
        }
        if self.add_batch_size == 0 {
            return Err(RagError::Config("add_batch_size must be greater than zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the chunking strategy.
    pub fn chunk_strategy(mut self, strategy: ChunkStrategy) -> Self {
        self.config.chunk_strategy = strategy;
        self
    }

    /// Set the number of results requested per query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the number of chunks per vector store `add` call.
    pub fn add_batch_size(mut self, size: usize) -> Self {
        self.config.add_batch_size = size;
        self
    }

    /// Set the policy for undecodable uploads.
    pub fn load_policy(mut self, policy: LoadPolicy) -> Self {
        self.config.load_policy = policy;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
