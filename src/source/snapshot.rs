//! On-disk snapshot source
//!
//! A directory holding one `<collection>.json` file per collection, in any
//! payload shape [`decode_records`] accepts. Used for offline regeneration
//! and as a record of what the server returned on the last fetch.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use super::payload::decode_records;
use super::MetadataSource;
use crate::error::SourceError;
use crate::model::{Collection, RawRecord};

pub struct SnapshotSource {
    dir: PathBuf,
}

impl SnapshotSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding one collection (`<dir>/document_types.json`, ...).
    pub fn path_for(dir: &Path, collection: Collection) -> PathBuf {
        dir.join(format!("{}.json", collection))
    }

    /// Write records so that a later [`SnapshotSource`] reads them back.
    pub async fn save(
        dir: &Path,
        collection: Collection,
        records: &[RawRecord],
    ) -> Result<PathBuf, SourceError> {
        let path = Self::path_for(dir, collection);
        let io_err = |source| SourceError::Io {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
        let mut bytes = serde_json::to_vec_pretty(records)?;
        bytes.push(b'\n');
        tokio::fs::write(&path, bytes).await.map_err(io_err)?;

        debug!(collection = %collection, path = %path.display(), "Saved snapshot");
        Ok(path)
    }
}

#[async_trait]
impl MetadataSource for SnapshotSource {
    fn describe(&self) -> String {
        format!("snapshot {}", self.dir.display())
    }

    async fn fetch_collection(&self, collection: Collection) -> Result<Vec<RawRecord>, SourceError> {
        let path = Self::path_for(&self.dir, collection);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| SourceError::Io {
                path: path.clone(),
                source,
            })?;

        let payload: serde_json::Value = serde_json::from_slice(&bytes)?;
        let records = decode_records(collection, &payload)?;

        info!(
            collection = %collection,
            records = records.len(),
            path = %path.display(),
            "Loaded snapshot collection"
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            RawRecord::new("Blob.Attach")
                .with_label("Attach File")
                .with_category("Files")
                .with_aliases(["Blob.AttachCurrentDocument"]),
            RawRecord::new("Document.Create").with_description("Create a document."),
        ];

        let path = SnapshotSource::save(dir.path(), Collection::Operations, &records)
            .await
            .unwrap();
        assert!(path.ends_with("operations.json"));

        let source = SnapshotSource::new(dir.path());
        let loaded = source
            .fetch_collection(Collection::Operations)
            .await
            .unwrap();
        assert_eq!(loaded, records);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = SnapshotSource::new(dir.path());

        let err = source
            .fetch_collection(Collection::Facets)
            .await
            .unwrap_err();
        match err {
            SourceError::Io { path, .. } => assert!(path.ends_with("facets.json")),
            other => panic!("expected Io error, got {other:?}"),
        }
    }
}
