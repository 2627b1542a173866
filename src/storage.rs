//! Opaque byte-blob storage, keyed by filename. The abstraction lets
//! `NodeService` be tested against an in-memory fake; the `LocalStorageBackend`
//! here is the one concrete, on-disk binding this crate ships.

use crate::error::{Error, Result};
use crate::identifier::{self, Id};
use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn save(&self, name: &str, bytes: Bytes) -> Result<()>;
    async fn get(&self, name: &str) -> Result<Option<Bytes>>;
    async fn delete(&self, name: &str) -> Result<bool>;
    async fn list(&self) -> Result<Vec<String>>;

    /// Filenames (with bytes) whose `hash(name)` falls in the half-open
    /// circular range `(pred_id, self_id]`.
    async fn scan_range(&self, pred_id: Id, self_id: Id, bits: u32) -> Result<Vec<(String, Bytes)>>;
}

/// Flat-directory filesystem backend: `<root>/<sanitized_filename>`.
pub struct LocalStorageBackend {
    root: PathBuf,
}

impl LocalStorageBackend {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(LocalStorageBackend { root })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[async_trait]
impl StorageBackend for LocalStorageBackend {
    async fn save(&self, name: &str, bytes: Bytes) -> Result<()> {
        let path = self.path_for(name);
        // Random suffix so concurrent saves of the same name never share a
        // tmp path (two racing writers would otherwise clobber each other's
        // partial write before either rename lands).
        let jitter: u32 = rand::thread_rng().gen();
        let tmp = path.with_extension(format!("{jitter:08x}.tmp"));
        fs::write(&tmp, &bytes).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Bytes>> {
        match fs::read(self.path_for(name)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::from(e)),
        }
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        match fs::remove_file(self.path_for(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::from(e)),
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    if !name.ends_with(".tmp") {
                        names.push(name.to_string());
                    }
                }
            }
        }
        Ok(names)
    }

    async fn scan_range(&self, pred_id: Id, self_id: Id, bits: u32) -> Result<Vec<(String, Bytes)>> {
        let mut out = Vec::new();
        for name in self.list().await? {
            let key = identifier::hash(name.as_bytes(), bits);
            if identifier::in_half_open(pred_id, key, self_id) {
                if let Some(bytes) = self.get(&name).await? {
                    out.push((name, bytes));
                }
            }
        }
        Ok(out)
    }
}

/// An in-memory backend used by unit and integration tests; never touches
/// the filesystem.
#[derive(Default)]
pub struct MemoryStorageBackend {
    files: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStorageBackend {
    pub fn new() -> Self {
        MemoryStorageBackend::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorageBackend {
    async fn save(&self, name: &str, bytes: Bytes) -> Result<()> {
        self.files.write().await.insert(name.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Bytes>> {
        Ok(self.files.read().await.get(name).cloned())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.files.write().await.remove(name).is_some())
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.files.read().await.keys().cloned().collect())
    }

    async fn scan_range(&self, pred_id: Id, self_id: Id, bits: u32) -> Result<Vec<(String, Bytes)>> {
        let files = self.files.read().await;
        Ok(files
            .iter()
            .filter(|(name, _)| {
                let key = identifier::hash(name.as_bytes(), bits);
                identifier::in_half_open(pred_id, key, self_id)
            })
            .map(|(name, bytes)| (name.clone(), bytes.clone()))
            .collect())
    }
}

/// Rejects empty names, path separators, and `..` components — the
/// sanitization the boundary adapter owes the storage backend (spec §4.5).
pub fn sanitize_filename(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidArgument("filename is empty".into()));
    }
    if name == "." || name == ".." {
        return Err(Error::InvalidArgument("filename is a path component".into()));
    }
    let path = Path::new(name);
    if path.components().count() != 1 {
        return Err(Error::InvalidArgument(format!(
            "filename must not contain path separators: {name}"
        )));
    }
    if name.contains("..") {
        return Err(Error::InvalidArgument(format!(
            "filename must not contain '..': {name}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn memory_backend_round_trips() {
        let backend = MemoryStorageBackend::new();
        backend.save("a.txt", Bytes::from_static(b"hi")).await.unwrap();
        assert_eq!(backend.get("a.txt").await.unwrap().unwrap(), Bytes::from_static(b"hi"));
        assert!(backend.delete("a.txt").await.unwrap());
        assert!(backend.get("a.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn scan_range_filters_by_hashed_key() {
        let backend = MemoryStorageBackend::new();
        backend.save("x", Bytes::from_static(b"1")).await.unwrap();
        backend.save("y", Bytes::from_static(b"2")).await.unwrap();
        let x_id = identifier::hash(b"x", 10);
        let results = backend.scan_range(x_id.wrapping_sub(1) % 1024, x_id, 10).await.unwrap();
        assert!(results.iter().any(|(n, _)| n == "x"));
    }

    #[tokio::test]
    async fn local_backend_round_trips_through_a_real_directory() {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalStorageBackend::new(dir.path()).await.unwrap();
        backend.save("a.txt", Bytes::from_static(b"hi")).await.unwrap();
        assert_eq!(backend.get("a.txt").await.unwrap().unwrap(), Bytes::from_static(b"hi"));
        assert_eq!(backend.list().await.unwrap(), vec!["a.txt".to_string()]);
        assert!(backend.delete("a.txt").await.unwrap());
        assert!(backend.get("a.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn local_backend_concurrent_saves_of_the_same_name_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(LocalStorageBackend::new(dir.path()).await.unwrap());
        let writers: Vec<_> = (0..8)
            .map(|i| {
                let backend = backend.clone();
                tokio::spawn(async move {
                    backend
                        .save("shared.bin", Bytes::from(vec![i as u8; 16]))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for w in writers {
            w.await.unwrap();
        }
        assert!(backend.get("shared.bin").await.unwrap().is_some());
        assert_eq!(backend.list().await.unwrap(), vec!["shared.bin".to_string()]);
    }

    #[test]
    fn sanitize_rejects_traversal() {
        assert!(sanitize_filename("../etc/passwd").is_err());
        assert!(sanitize_filename("a/b").is_err());
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename("foo.txt").is_ok());
    }
}
