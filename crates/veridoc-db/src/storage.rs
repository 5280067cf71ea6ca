//! Content-addressable blob storage with a filesystem backend.
//!
//! Raw document bytes live outside the database; the `documents` row keeps
//! the storage path, SHA-256 content hash, size, and sniffed MIME type.
//! Paths shard on the blob id so a busy intake directory never collapses
//! into one huge flat folder.

use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use veridoc_core::{new_v7, Error, Result, StorageBackend, StoredObject};

/// Compute the SHA-256 content hash of data, hex encoded.
pub fn compute_content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Generate a sharded storage path for a blob id.
///
/// Path format: `blobs/{first-2-hex}/{next-2-hex}/{uuid}.bin`
pub fn generate_storage_path(blob_id: Uuid) -> String {
    let hex = blob_id.simple().to_string();
    format!("blobs/{}/{}/{}.bin", &hex[0..2], &hex[2..4], hex)
}

/// Persist raw bytes through a backend and return the stored metadata.
///
/// MIME type is sniffed from magic bytes; unrecognizable content falls
/// back to `application/octet-stream`.
pub async fn upload_blob(backend: &dyn StorageBackend, data: &[u8]) -> Result<StoredObject> {
    if data.is_empty() {
        return Err(Error::InvalidInput("cannot store an empty upload".into()));
    }

    let id = new_v7();
    let path = generate_storage_path(id);
    let content_hash = compute_content_hash(data);
    let mime_type = infer::get(data)
        .map(|k| k.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    backend.write(&path, data).await?;

    Ok(StoredObject {
        id,
        path,
        size_bytes: data.len() as i64,
        content_hash,
        mime_type,
    })
}

/// Filesystem storage backend.
pub struct FilesystemBackend {
    base_path: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend with the given base directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }

    /// Validate that the storage backend can write, read, and delete files.
    ///
    /// Performs a full round-trip test at startup to catch filesystem issues
    /// (overlayfs quirks, permission errors, missing directories) early.
    pub async fn validate(&self) -> std::result::Result<(), String> {
        let test_dir = self.base_path.join("blobs/.health-check");
        let test_file = test_dir.join("test.bin");

        fs::create_dir_all(&test_dir)
            .await
            .map_err(|e| format!("create_dir_all({:?}): {}", test_dir, e))?;

        let data = b"storage-health-check";
        fs::write(&test_file, data)
            .await
            .map_err(|e| format!("write({:?}): {}", test_file, e))?;

        let read_data = fs::read(&test_file)
            .await
            .map_err(|e| format!("read({:?}): {}", test_file, e))?;
        if read_data != data {
            return Err("read-back mismatch".to_string());
        }

        fs::remove_file(&test_file)
            .await
            .map_err(|e| format!("remove_file({:?}): {}", test_file, e))?;
        let _ = fs::remove_dir(&test_dir).await; // Best-effort cleanup

        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);
        debug!(
            subsystem = "storage",
            storage_path = %path,
            size = data.len(),
            "blob write"
        );

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "storage: create_dir_all failed");
                e
            })?;
        }

        // Atomic write: temp file + rename
        let temp_path = full_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(
                from = %temp_path.display(),
                to = %full_path.display(),
                error = %e,
                "storage: rename failed"
            );
            e
        })?;

        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(path);
        fs::read(&full_path)
            .await
            .map_err(|e| Error::Storage(format!("read {}: {}", path, e)))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.full_path(path);
        fs::remove_file(&full_path)
            .await
            .map_err(|e| Error::Storage(format!("delete {}: {}", path, e)))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(fs::try_exists(self.full_path(path)).await?)
    }
}
