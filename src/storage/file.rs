//! File-backed storage: one file per key under a data directory

use super::{Result, StorageBackend};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Stores each key as a file in `root`. Writes go through a temp file and a
/// rename so a crash mid-write never truncates the previous blob.
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Open the backend, creating the data directory if needed
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        let tmp = self.root.join(format!("{}.tmp", key));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_absent_key() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();
        assert!(backend.read("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();

        backend.write("blob", b"hello").await.unwrap();
        assert_eq!(backend.read("blob").await.unwrap(), Some(b"hello".to_vec()));

        // Overwrite replaces the previous value
        backend.write("blob", b"world").await.unwrap();
        assert_eq!(backend.read("blob").await.unwrap(), Some(b"world".to_vec()));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();

        backend.write("blob", b"x").await.unwrap();
        backend.remove("blob").await.unwrap();
        backend.remove("blob").await.unwrap();
        assert!(backend.read("blob").await.unwrap().is_none());
    }
}
