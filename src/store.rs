//! Storage collaborators: blob storage for source files and artifacts, and
//! the document-metadata store that holds artifact links.
//!
//! The pipeline only depends on the two traits. The in-memory stores back the
//! tests and embedders that keep everything in one process; [`FsBlobStore`]
//! backs the CLI and can also pull sources from `http(s)://` URLs, which is how
//! hosted object stores hand out readable references.

use crate::error::StoreError;
use crate::model::{BlobRef, ConversionArtifact, SourceDocument};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info};

/// Object storage for source documents and conversion artifacts.
///
/// `put` is all-or-nothing: either the full blob is readable under the
/// returned reference or the call fails and nothing is visible.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, bytes: Vec<u8>, key: &str) -> Result<BlobRef, StoreError>;
    async fn get(&self, blob: &BlobRef) -> Result<Vec<u8>, StoreError>;
    async fn delete(&self, blob: &BlobRef) -> Result<(), StoreError>;
}

/// Metadata store for [`SourceDocument`] records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, id: &str) -> Result<Option<SourceDocument>, StoreError>;

    /// Replace the document's current artifact of `artifact.kind` in one step.
    async fn update(&self, id: &str, artifact: ConversionArtifact) -> Result<(), StoreError>;

    async fn insert(&self, document: SourceDocument) -> Result<(), StoreError>;

    /// Every document of `owner_id`, newest upload first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<SourceDocument>, StoreError>;
}

// ── In-memory blob store ─────────────────────────────────────────────────

/// Blob store held in process memory.
///
/// Every `put` creates a new version (`mem://{key}#v{n}`); earlier versions
/// stay readable until deleted explicitly.
#[derive(Default)]
pub struct MemoryBlobStore {
    inner: RwLock<MemoryBlobs>,
}

#[derive(Default)]
struct MemoryBlobs {
    blobs: HashMap<String, Vec<u8>>,
    versions: HashMap<String, u64>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently stored, across all versions.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the blob behind `blob` is still stored.
    pub fn contains(&self, blob: &BlobRef) -> bool {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .blobs
            .contains_key(&blob.url)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bytes: Vec<u8>, key: &str) -> Result<BlobRef, StoreError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let version = inner.versions.entry(key.to_string()).or_insert(0);
        *version += 1;
        let url = format!("mem://{key}#v{version}");
        debug!("Stored {} bytes at {}", bytes.len(), url);
        inner.blobs.insert(url.clone(), bytes);
        Ok(BlobRef::new(key, url))
    }

    async fn get(&self, blob: &BlobRef) -> Result<Vec<u8>, StoreError> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .blobs
            .get(&blob.url)
            .cloned()
            .ok_or_else(|| StoreError::Missing {
                key: blob.url.clone(),
            })
    }

    async fn delete(&self, blob: &BlobRef) -> Result<(), StoreError> {
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .blobs
            .remove(&blob.url)
            .map(|_| ())
            .ok_or_else(|| StoreError::Missing {
                key: blob.url.clone(),
            })
    }
}

// ── File-system blob store ───────────────────────────────────────────────

/// Blob store rooted at a local directory.
///
/// Keys map to relative paths under the root. Writes go to a sibling temp
/// file that is renamed into place, so readers never observe a partial blob.
/// `get` also accepts `http(s)://` references and downloads them.
pub struct FsBlobStore {
    root: PathBuf,
    client: reqwest::Client,
    download_timeout_secs: u64,
}

impl FsBlobStore {
    /// Create a store rooted at `root` (created lazily on first write).
    pub fn new(root: impl Into<PathBuf>, download_timeout_secs: u64) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(download_timeout_secs))
            .build()
            .map_err(|e| StoreError::Transfer {
                url: String::new(),
                reason: format!("HTTP client setup failed: {e}"),
            })?;
        Ok(Self {
            root: root.into(),
            client,
            download_timeout_secs,
        })
    }

    /// Map a key onto a path under the root, rejecting escapes.
    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(key);
        let valid = !key.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
                reason: "keys must be relative paths without '..'".into(),
            });
        }
        Ok(self.root.join(rel))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, StoreError> {
        info!("Downloading blob from: {}", url);

        let response = self.client.get(url).send().await.map_err(|e| StoreError::Transfer {
            url: url.to_string(),
            reason: if e.is_timeout() {
                format!("timed out after {}s", self.download_timeout_secs)
            } else {
                e.to_string()
            },
        })?;

        if !response.status().is_success() {
            return Err(StoreError::Transfer {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response.bytes().await.map_err(|e| StoreError::Transfer {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        debug!("Downloaded {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }
}

/// Check if a blob reference points at a remote HTTP resource.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, bytes: Vec<u8>, key: &str) -> Result<BlobRef, StoreError> {
        let path = self.path_for(key)?;
        let io_err = |source| StoreError::Io {
            key: key.to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        // Atomic write: write to temp, then rename
        let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        tmp_name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        let tmp_path = path.with_file_name(tmp_name);

        if let Err(e) = tokio::fs::write(&tmp_path, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(io_err(e));
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(io_err(e));
        }

        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(BlobRef::new(key, path.to_string_lossy()))
    }

    async fn get(&self, blob: &BlobRef) -> Result<Vec<u8>, StoreError> {
        if is_url(&blob.url) {
            return self.download(&blob.url).await;
        }
        let path = PathBuf::from(blob.url.strip_prefix("file://").unwrap_or(&blob.url));
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::Missing {
                    key: blob.url.clone(),
                }
            } else {
                StoreError::Io {
                    key: blob.key.clone(),
                    source: e,
                }
            }
        })
    }

    async fn delete(&self, blob: &BlobRef) -> Result<(), StoreError> {
        let path = self.path_for(&blob.key)?;
        tokio::fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::Missing {
                    key: blob.key.clone(),
                }
            } else {
                StoreError::Io {
                    key: blob.key.clone(),
                    source: e,
                }
            }
        })
    }
}

// ── In-memory document store ─────────────────────────────────────────────

/// Document store held in process memory.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<String, SourceDocument>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find(&self, id: &str) -> Result<Option<SourceDocument>, StoreError> {
        Ok(self
            .documents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned())
    }

    async fn update(&self, id: &str, artifact: ConversionArtifact) -> Result<(), StoreError> {
        let mut documents = self.documents.write().unwrap_or_else(|e| e.into_inner());
        let document = documents.get_mut(id).ok_or_else(|| StoreError::Missing {
            key: id.to_string(),
        })?;
        document.link_artifact(artifact);
        Ok(())
    }

    async fn insert(&self, document: SourceDocument) -> Result<(), StoreError> {
        self.documents
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(document.id.clone(), document);
        Ok(())
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<SourceDocument>, StoreError> {
        let mut owned: Vec<SourceDocument> = self
            .documents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|d| d.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ArtifactKind;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://res.example.com/raw/upload/doc.pdf"));
        assert!(is_url("http://localhost/doc.txt"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("mem://key#v1"));
    }

    #[tokio::test]
    async fn memory_store_versions_each_put() {
        let store = MemoryBlobStore::new();
        let first = store.put(b"one".to_vec(), "a/b.txt").await.unwrap();
        let second = store.put(b"two".to_vec(), "a/b.txt").await.unwrap();

        assert_eq!(first.key, second.key);
        assert_ne!(first.url, second.url);
        assert_eq!(store.get(&first).await.unwrap(), b"one");
        assert_eq!(store.get(&second).await.unwrap(), b"two");
        assert_eq!(store.len(), 2);

        store.delete(&first).await.unwrap();
        assert!(!store.contains(&first));
        assert!(matches!(
            store.get(&first).await,
            Err(StoreError::Missing { .. })
        ));
    }

    #[tokio::test]
    async fn fs_store_round_trip_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), 5).unwrap();

        let blob = store
            .put("⠓⠑⠇⠇⠕".as_bytes().to_vec(), "converted/braille/u1/d1-g2.brf")
            .await
            .unwrap();
        assert!(dir.path().join("converted/braille/u1/d1-g2.brf").exists());
        assert_eq!(store.get(&blob).await.unwrap(), "⠓⠑⠇⠇⠕".as_bytes());

        // No temp files left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("converted/braille/u1"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        store.delete(&blob).await.unwrap();
        assert!(matches!(store.get(&blob).await, Err(StoreError::Missing { .. })));
    }

    #[tokio::test]
    async fn fs_store_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), 5).unwrap();
        for key in ["../outside.txt", "/etc/passwd", ""] {
            assert!(
                matches!(store.put(vec![1], key).await, Err(StoreError::InvalidKey { .. })),
                "key {key:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn document_store_update_swaps_artifact() {
        let store = MemoryDocumentStore::new();
        let doc =
            SourceDocument::new("u1", "a.txt", 3, BlobRef::new("k", "mem://k#v1")).with_id("d1");
        store.insert(doc).await.unwrap();

        let speech = vec![BlobRef::new("s", "mem://s#v1")];
        let artifact = ConversionArtifact::new(ArtifactKind::Speech, speech);
        store.update("d1", artifact.clone()).await.unwrap();

        let found = store.find("d1").await.unwrap().unwrap();
        assert_eq!(found.speech, Some(artifact));
        assert!(found.braille.is_none());
    }

    #[tokio::test]
    async fn documents_list_newest_first_per_owner() {
        let store = MemoryDocumentStore::new();
        let source = BlobRef::new("k", "mem://k#v1");
        let base = chrono::Utc::now();
        for (id, owner, age_secs) in [("old", "u1", 60), ("new", "u1", 0), ("other", "u2", 30)] {
            let mut doc = SourceDocument::new(owner, "a.txt", 1, source.clone()).with_id(id);
            doc.created_at = base - chrono::Duration::seconds(age_secs);
            store.insert(doc).await.unwrap();
        }

        let ids: Vec<String> = store
            .list_by_owner("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
        assert!(store.list_by_owner("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn document_store_update_missing_document() {
        let store = MemoryDocumentStore::new();
        let artifact = ConversionArtifact::new(ArtifactKind::Braille, vec![]);
        assert!(matches!(
            store.update("nope", artifact).await,
            Err(StoreError::Missing { .. })
        ));
        assert!(store.find("nope").await.unwrap().is_none());
    }
}
