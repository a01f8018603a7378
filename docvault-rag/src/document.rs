//! Data types for source files, documents, chunks, and search results.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Metadata attached to documents, chunks, and indexed items.
pub type Metadata = HashMap<String, String>;

/// Metadata key holding the source identifier (the original file path).
pub const SOURCE_KEY: &str = "source";

/// Metadata key holding a chunk's position within its document.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";

/// A raw file handed to the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Where the file lives, or the name it was uploaded under.
    pub path: PathBuf,
    /// The raw file contents.
    pub bytes: Vec<u8>,
    /// Whether the file sits in the transient upload area and should be
    /// deleted once it has been indexed.
    pub staged: bool,
}

impl SourceFile {
    /// A file written to the upload staging area; removed after a successful ingest.
    pub fn staged(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self { path: path.into(), bytes, staged: true }
    }

    /// A file owned by the caller; never removed by the pipeline.
    pub fn borrowed(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self { path: path.into(), bytes, staged: false }
    }

    /// The path rendered as a string for metadata and error messages.
    pub fn display_path(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// A decoded document: text plus metadata. Lives only for one ingestion call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata; always carries [`SOURCE_KEY`] when produced by a loader.
    pub metadata: Metadata,
}

impl Document {
    /// Create a document whose `source` metadata is the given identifier.
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), source.into());
        Self { text: text.into(), metadata }
    }

    /// The source identifier, if present.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}

/// A contiguous, size-bounded segment of a [`Document`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// Metadata inherited from the parent document plus [`CHUNK_INDEX_KEY`].
    pub metadata: Metadata,
}

/// The unit persisted inside a collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedItem {
    /// Unique identifier within the collection.
    pub id: String,
    /// The stored document text.
    pub text: String,
    /// Metadata copied from the chunk.
    pub metadata: Metadata,
    /// The embedding, or `None` when the store computes it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl From<Chunk> for IndexedItem {
    fn from(chunk: Chunk) -> Self {
        Self { id: chunk.id, text: chunk.text, metadata: chunk.metadata, embedding: None }
    }
}

/// Handle to a named collection returned by get-or-create.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionHandle {
    /// Caller-supplied collection name.
    pub name: String,
    /// Store-assigned identifier; equal to `name` for stores without one.
    pub id: String,
}

/// A similarity query: the raw text and, when the pipeline embeds, its vector.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// The query text.
    pub text: String,
    /// The query embedding, or `None` when the store embeds the text itself.
    pub embedding: Option<Vec<f32>>,
}

/// A matched item with its relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The id of the matched item.
    pub id: String,
    /// The matched text.
    pub text: String,
    /// The matched item's metadata.
    pub metadata: Metadata,
    /// Relevance score (higher is more relevant).
    pub score: f32,
}

impl SearchResult {
    /// The last path segment of the `source` metadata, if present.
    pub fn source_name(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(|source| file_name_of(source))
    }
}

/// Return the last `/`- or `\`-separated segment of a path string.
pub fn file_name_of(source: &str) -> &str {
    source.rsplit(['/', '\\']).next().unwrap_or(source)
}

/// Return the file name of a path, falling back to the whole path.
pub(crate) fn path_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
