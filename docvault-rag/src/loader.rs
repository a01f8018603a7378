//! Decoding uploaded files into [`Document`]s.

use tracing::debug;

use crate::document::{Document, SourceFile, path_file_name};
use crate::error::{RagError, Result};

/// Metadata key holding the bare file name of the source.
pub const FILE_NAME_KEY: &str = "file_name";

/// Turns raw file bytes into a [`Document`].
pub trait DocumentLoader: Send + Sync {
    /// Decode one file.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DocumentLoad`] naming the file when it cannot be read as text.
    fn load(&self, file: &SourceFile) -> Result<Document>;
}

/// Loads UTF-8 text files. Binary content is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLoader;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

impl DocumentLoader for TextLoader {
    fn load(&self, file: &SourceFile) -> Result<Document> {
        let path = file.display_path();
        let bytes = file.bytes.strip_prefix(UTF8_BOM).unwrap_or(file.bytes.as_slice());

        if bytes.contains(&0) {
            return Err(RagError::DocumentLoad {
                path,
                message: "file looks binary (contains NUL bytes)".to_string(),
            });
        }

        let text = std::str::from_utf8(bytes).map_err(|e| RagError::DocumentLoad {
            path: path.clone(),
            message: format!("file is not valid UTF-8: {e}"),
        })?;

        debug!(path = %path, chars = text.chars().count(), "loaded document");

        let mut document = Document::new(text, path);
        document.metadata.insert(FILE_NAME_KEY.to_string(), path_file_name(&file.path));
        Ok(document)
    }
}
