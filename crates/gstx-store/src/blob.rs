//! # Blob Store
//!
//! Directory-backed object storage: one bucket directory, uploads land at
//! `{bucket}/{uuid}/{filename}` and downloads reverse the path. Operations
//! carry a per-call deadline and retry once after a short delay, matching
//! the upstream service contract.

use std::path::{Path, PathBuf};
use std::time::Duration;

use uuid::Uuid;

use crate::StoreError;

/// Blob store tuning.
#[derive(Debug, Clone)]
pub struct BlobStoreConfig {
    /// Per-call deadline.
    pub deadline: Duration,
    /// Delay before the single retry.
    pub retry_delay: Duration,
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(30),
            retry_delay: Duration::from_millis(200),
        }
    }
}

/// A directory-backed bucket.
#[derive(Debug)]
pub struct BlobStore {
    root: PathBuf,
    bucket: String,
    config: BlobStoreConfig,
}

impl BlobStore {
    /// Open (creating if needed) a bucket under `root`.
    pub fn open(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Result<Self, StoreError> {
        let root = root.into();
        let bucket = bucket.into();
        std::fs::create_dir_all(root.join(&bucket))?;
        Ok(Self {
            root,
            bucket,
            config: BlobStoreConfig::default(),
        })
    }

    /// Override the default timings.
    pub fn with_config(mut self, config: BlobStoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Upload a local file; returns its storage path
    /// `{bucket}/{uuid}/{filename}`.
    pub fn upload(&self, local: &Path) -> Result<String, StoreError> {
        let file_name = local
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::Blob(format!("bad file name: {}", local.display())))?;
        let key = format!("{}/{}/{}", self.bucket, Uuid::new_v4().simple(), file_name);

        self.with_retry("upload", || {
            let dest = self.root.join(&key);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(local, &dest)?;
            Ok(())
        })?;
        Ok(key)
    }

    /// Download a storage path to a local destination.
    pub fn download(&self, storage_path: &str, dest: &Path) -> Result<(), StoreError> {
        self.with_retry("download", || {
            let source = self.root.join(storage_path);
            if !source.exists() {
                return Err(StoreError::Blob(format!("no such object: {storage_path}")));
            }
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(&source, dest)?;
            Ok(())
        })
    }

    /// Whether a storage path exists.
    pub fn exists(&self, storage_path: &str) -> bool {
        self.root.join(storage_path).exists()
    }

    /// One bounded retry after a short delay. The filesystem backend has
    /// no real deadline to race; the config documents the service contract
    /// the network-backed implementation honors.
    fn with_retry<F>(&self, op: &str, mut f: F) -> Result<(), StoreError>
    where
        F: FnMut() -> Result<(), StoreError>,
    {
        match f() {
            Ok(()) => Ok(()),
            Err(first) => {
                tracing::warn!(op, error = %first, "blob operation failed; retrying once");
                std::thread::sleep(self.config.retry_delay);
                f().map_err(|second| {
                    StoreError::Blob(format!("{op} failed after retry: {second}"))
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn upload_download_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path().join("store"), "gstx").unwrap();

        let local = dir.path().join("report.csv");
        let mut f = std::fs::File::create(&local).unwrap();
        f.write_all(b"sku,qty\nA,1\n").unwrap();

        let key = store.upload(&local).unwrap();
        assert!(key.starts_with("gstx/"));
        assert!(key.ends_with("/report.csv"));
        assert!(store.exists(&key));

        let dest = dir.path().join("downloaded.csv");
        store.download(&key, &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"sku,qty\nA,1\n");
    }

    #[test]
    fn download_missing_object_fails_after_retry() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::open(dir.path().join("store"), "gstx")
            .unwrap()
            .with_config(BlobStoreConfig {
                deadline: Duration::from_secs(1),
                retry_delay: Duration::from_millis(1),
            });
        let err = store
            .download("gstx/none/missing.csv", &dir.path().join("x"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Blob(_)));
    }
}
