//! Upload staging area.
//!
//! Each request writes its files under `{root}/{request id}/` so concurrent
//! uploads never see each other's files. The pipeline deletes staged files
//! after a successful ingest; [`UploadBatch::finish`] then removes the empty
//! request directory, and [`UploadBatch::discard`] removes whatever is left
//! after a failure.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use anyhow::Context;
use docvault_rag::SourceFile;
use tracing::{debug, warn};
use uuid::Uuid;

/// Reduce an uploaded file name to a safe single path component.
///
/// Directory parts are dropped, anything outside `[A-Za-z0-9._-]` becomes
/// `_`, and leading dots are stripped so the result can never escape the
/// staging directory or be hidden. Falls back to `upload` when nothing is left.
pub fn secure_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches(['.', '_']).trim_end_matches('_');
    if cleaned.is_empty() { "upload".to_string() } else { cleaned.to_string() }
}

/// Root of the upload staging area.
#[derive(Clone, Debug)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it does not exist.
    pub async fn ensure(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("failed to create upload folder {}", self.root.display()))
    }

    /// Start a new per-request batch.
    pub fn batch(&self) -> UploadBatch {
        UploadBatch { dir: self.root.join(Uuid::new_v4().to_string()), names: HashSet::new() }
    }
}

/// The files staged for one request.
#[derive(Debug)]
pub struct UploadBatch {
    dir: PathBuf,
    names: HashSet<String>,
}

impl UploadBatch {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write one uploaded file and return it as a staged [`SourceFile`].
    ///
    /// Repeated names within a batch go into numbered subdirectories so the
    /// file name (and therefore the reported source) is preserved.
    pub async fn save(&mut self, file_name: &str, bytes: Vec<u8>) -> anyhow::Result<SourceFile> {
        let name = secure_filename(file_name);
        let mut dir = self.dir.clone();
        let mut n = 0;
        while !self.names.insert(dir.join(&name).to_string_lossy().into_owned()) {
            n += 1;
            dir = self.dir.join(n.to_string());
        }

        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create staging directory {}", dir.display()))?;
        let path = dir.join(&name);
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("failed to save upload {}", path.display()))?;

        debug!(path = %path.display(), bytes = bytes.len(), "staged upload");
        Ok(SourceFile::staged(path, bytes))
    }

    /// Remove the request directory after a successful ingest.
    ///
    /// A directory that is already gone counts as removed.
    pub async fn finish(self) -> anyhow::Result<()> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("failed to remove staging directory {}", self.dir.display()))),
        }
    }

    /// Remove everything staged by this request after a failure.
    ///
    /// The request has already failed, so a removal error is only logged.
    pub async fn discard(self) {
        let dir = self.dir.clone();
        if let Err(e) = self.finish().await {
            warn!(dir = %dir.display(), error = %format!("{e:#}"), "failed to discard staged upload");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_filename_keeps_plain_names() {
        assert_eq!(secure_filename("notes.txt"), "notes.txt");
        assert_eq!(secure_filename("my-file_v2.md"), "my-file_v2.md");
    }

    #[test]
    fn secure_filename_strips_directories_and_odd_characters() {
        assert_eq!(secure_filename("../../etc/passwd"), "passwd");
        assert_eq!(secure_filename("C:\\Users\\me\\report final.txt"), "report_final.txt");
        assert_eq!(secure_filename(".bashrc"), "bashrc");
        assert_eq!(secure_filename("résumé.txt"), "r_sum_.txt");
        assert_eq!(secure_filename(".."), "upload");
        assert_eq!(secure_filename(""), "upload");
    }

    #[tokio::test]
    async fn batches_are_isolated_and_removable() {
        let root = tempfile::tempdir().unwrap();
        let area = StagingArea::new(root.path());
        area.ensure().await.unwrap();

        let mut first = area.batch();
        let mut second = area.batch();
        assert_ne!(first.dir(), second.dir());

        let a = first.save("notes.txt", b"one".to_vec()).await.unwrap();
        let b = first.save("notes.txt", b"two".to_vec()).await.unwrap();
        let c = second.save("notes.txt", b"three".to_vec()).await.unwrap();
        assert!(a.staged);
        assert_ne!(a.path, b.path);
        assert_eq!(b.path.file_name(), a.path.file_name());
        assert_eq!(std::fs::read(&c.path).unwrap(), b"three");

        let first_dir = first.dir().to_path_buf();
        first.discard().await;
        assert!(!first_dir.exists());
        assert!(c.path.exists());

        std::fs::remove_dir_all(second.dir()).unwrap();
        second.finish().await.unwrap();
    }

    #[tokio::test]
    async fn finish_reports_a_directory_it_cannot_remove() {
        let root = tempfile::tempdir().unwrap();
        let area = StagingArea::new(root.path());
        let batch = area.batch();
        // A plain file where the request directory should be.
        std::fs::write(batch.dir(), b"not a directory").unwrap();
        let dir = batch.dir().to_path_buf();

        let err = batch.finish().await.unwrap_err();
        assert!(format!("{err:#}").contains("failed to remove staging directory"));
        assert!(dir.exists());
    }
}
