//! Filesystem storage backend (spec.md §4.A).
//!
//! `dir` is a directory path; `name` is a file name within it. `list` walks
//! the directory; `stat` decodes the image header since the filesystem
//! carries no side-channel metadata for dimensions.

use super::{decode_dimensions, File, ObjectStore, Size};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stores every folder's objects under `root/<dir>/<name>`.
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dir_path(&self, dir: &str) -> PathBuf {
        self.root.join(dir)
    }

    fn object_path(&self, dir: &str, name: &str) -> PathBuf {
        self.dir_path(dir).join(name)
    }

    fn map_io_err(name: &str, e: std::io::Error) -> Error {
        match e.kind() {
            std::io::ErrorKind::NotFound => Error::not_found(name),
            std::io::ErrorKind::PermissionDenied => Error::Permanent(e.to_string()),
            _ => Error::Transient(e.to_string()),
        }
    }
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    async fn put(&self, dir: &str, name: &str, bytes: Vec<u8>, _size_hint: Option<Size>) -> Result<()> {
        let dir_path = self.dir_path(dir);
        tokio::fs::create_dir_all(&dir_path)
            .await
            .map_err(|e| Self::map_io_err(name, e))?;

        // Write-then-rename for atomic replacement, as the teacher's
        // ChunkCache::store_chunk does.
        let final_path = self.object_path(dir, name);
        let mut tmp_name = final_path.clone().into_os_string();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| Self::map_io_err(name, e))?;
        tokio::fs::rename(&tmp_path, &final_path)
            .await
            .map_err(|e| Self::map_io_err(name, e))?;
        Ok(())
    }

    async fn get(&self, dir: &str, name: &str) -> Result<Vec<u8>> {
        tokio::fs::read(self.object_path(dir, name))
            .await
            .map_err(|e| Self::map_io_err(name, e))
    }

    async fn list(&self, dir: &str, prefix: Option<&str>) -> Result<Vec<File>> {
        let dir_path = self.dir_path(dir);
        if !dir_path.exists() {
            return Ok(Vec::new());
        }
        let prefix = prefix.unwrap_or("");
        let mut out = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir_path)
            .await
            .map_err(|e| Self::map_io_err(dir, e))?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| Self::map_io_err(dir, e))? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(n) => n.to_string(),
                None => continue,
            };
            if !name.starts_with(prefix) {
                continue;
            }
            let metadata = entry.metadata().await.map_err(|e| Self::map_io_err(&name, e))?;
            out.push(File::new(dir, name, metadata.len()));
        }
        Ok(out)
    }

    async fn stat(&self, dir: &str, name: &str) -> Result<Size> {
        let bytes = self.get(dir, name).await?;
        decode_dimensions(&bytes)
    }

    async fn delete(&self, dir: &str, name: &str) -> Result<()> {
        let path = self.object_path(dir, name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::map_io_err(name, e)),
        }
    }

    async fn exists(&self, dir: &str, name: &str) -> bool {
        tokio::fs::metadata(self.object_path(dir, name)).await.is_ok()
    }
}

/// Ensures a folder's directory exists under the store root, for folders
/// constructed from config at process start.
pub async fn ensure_dir(root: &Path, dir: &str) -> Result<()> {
    let path = root.join(dir);
    tokio::fs::create_dir_all(&path).await.map_err(|e| {
        debug!("failed to create folder directory {:?}: {}", path, e);
        Error::Transient(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::new_rgb8(width, height);
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Jpeg)
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = FilesystemStore::new(tmp.path());
        store.put("img", "a.jpg", b"hello".to_vec(), None).await.unwrap();
        assert_eq!(store.get("img", "a.jpg").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = FilesystemStore::new(tmp.path());
        let err = store.get("img", "missing.jpg").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_missing_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = FilesystemStore::new(tmp.path());
        store.delete("img", "missing.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let tmp = TempDir::new().unwrap();
        let store = FilesystemStore::new(tmp.path());
        store.put("img", "abc.jpg", b"1".to_vec(), None).await.unwrap();
        store.put("img", "abc_thumb.jpg", b"2".to_vec(), None).await.unwrap();
        store.put("img", "xyz.jpg", b"3".to_vec(), None).await.unwrap();

        let all = store.list("img", None).await.unwrap();
        assert_eq!(all.len(), 3);

        let prefixed = store.list("img", Some("abc")).await.unwrap();
        assert_eq!(prefixed.len(), 2);
    }

    #[tokio::test]
    async fn stat_decodes_jpeg_dimensions() {
        let tmp = TempDir::new().unwrap();
        let store = FilesystemStore::new(tmp.path());
        store
            .put("img", "photo.jpg", make_jpeg(1200, 800), None)
            .await
            .unwrap();
        let size = store.stat("img", "photo.jpg").await.unwrap();
        assert_eq!(size, Size::new(1200, 800));
    }

    #[tokio::test]
    async fn exists_reflects_store_state() {
        let tmp = TempDir::new().unwrap();
        let store = FilesystemStore::new(tmp.path());
        assert!(!store.exists("img", "a.jpg").await);
        store.put("img", "a.jpg", b"1".to_vec(), None).await.unwrap();
        assert!(store.exists("img", "a.jpg").await);
    }
}
