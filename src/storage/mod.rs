//! Staging of uploaded documents.
//!
//! A [`StagedDocument`] owns a stored file until it is committed. Dropping it
//! uncommitted discards the file, so a submission that fails anywhere leaves
//! no orphaned documents behind.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Opaque handle to a stored document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef(pub String);

impl DocumentRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait DocumentStore: Send + Sync {
    fn stage(&self, filename: &str, content: &[u8]) -> Result<DocumentRef>;

    fn discard(&self, document: &DocumentRef) -> Result<()>;
}

pub fn generate_document_name(filename: &str) -> String {
    format!(
        "{}_{}_{}",
        Utc::now().format("%Y%m%d"),
        &Uuid::new_v4().simple().to_string()[..8],
        filename
    )
}

pub fn ensure_dirs(upload_folder: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(upload_folder)
}

/// Only PDFs with a plain file name are accepted.
pub fn validate_upload(filename: &str, content: &[u8]) -> Result<()> {
    if filename.is_empty()
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
    {
        return Err(Error::Validation(format!("invalid file name '{}'", filename)));
    }
    if content.is_empty() {
        return Err(Error::Validation(format!("'{}' is empty", filename)));
    }
    let mime = mime_guess::from_path(filename).first_raw();
    if mime != Some("application/pdf") {
        return Err(Error::Validation(format!("'{}' is not a PDF", filename)));
    }
    Ok(())
}

/// Stores documents as files under one folder.
pub struct LocalDocumentStore {
    root: PathBuf,
}

impl LocalDocumentStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn path_for(&self, document: &DocumentRef) -> Result<PathBuf> {
        let name = document.as_str();
        if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
            return Err(Error::Validation(format!("invalid document reference '{}'", name)));
        }
        Ok(self.root.join(name))
    }
}

impl DocumentStore for LocalDocumentStore {
    fn stage(&self, filename: &str, content: &[u8]) -> Result<DocumentRef> {
        validate_upload(filename, content)?;
        let document = DocumentRef(generate_document_name(filename));
        std::fs::write(self.path_for(&document)?, content)?;
        debug!(document = %document, bytes = content.len(), "staged document");
        Ok(document)
    }

    fn discard(&self, document: &DocumentRef) -> Result<()> {
        match std::fs::remove_file(self.path_for(document)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// A stored document that is removed again unless [`commit`](Self::commit) is called.
pub struct StagedDocument {
    store: Arc<dyn DocumentStore>,
    document: DocumentRef,
    committed: bool,
}

impl StagedDocument {
    pub fn stage(store: Arc<dyn DocumentStore>, filename: &str, content: &[u8]) -> Result<Self> {
        let document = store.stage(filename, content)?;
        Ok(Self {
            store,
            document,
            committed: false,
        })
    }

    pub fn reference(&self) -> &DocumentRef {
        &self.document
    }

    pub fn commit(mut self) -> DocumentRef {
        self.committed = true;
        self.document.clone()
    }
}

impl Drop for StagedDocument {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match self.store.discard(&self.document) {
            Ok(()) => debug!(document = %self.document, "discarded staged document"),
            Err(e) => warn!(document = %self.document, "failed to discard staged document: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> Arc<dyn DocumentStore> {
        Arc::new(LocalDocumentStore::new(dir.path().to_path_buf()))
    }

    #[test]
    fn dropped_documents_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedDocument::stage(store(&dir), "thesis.pdf", b"%PDF-1.4").unwrap();
        let path = dir.path().join(staged.reference().as_str());
        assert!(path.exists());

        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn committed_documents_stay() {
        let dir = tempfile::tempdir().unwrap();
        let staged = StagedDocument::stage(store(&dir), "letter.pdf", b"%PDF-1.4").unwrap();
        let document = staged.commit();
        assert!(dir.path().join(document.as_str()).exists());
        assert!(document.as_str().ends_with("_letter.pdf"));
    }

    #[test]
    fn rejects_non_pdf_and_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        assert!(matches!(
            store.stage("thesis.docx", b"data"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            store.stage("../thesis.pdf", b"data"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(store.stage("thesis.pdf", b""), Err(Error::Validation(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn discarding_twice_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let document = store.stage("thesis.pdf", b"%PDF").unwrap();
        store.discard(&document).unwrap();
        store.discard(&document).unwrap();
    }
}
