//! Storage backend abstraction (spec.md §4.A).
//!
//! Every backend exposes the same flat key namespace scoped by a `dir`
//! prefix: `put`, `get`, `list`, `stat`, `delete`, `exists`. This mirrors the
//! `StorageBackend` trait shape used throughout the pack for object-store
//! abstractions (local filesystem vs. S3), and the async chunk-fetcher trait
//! in the teacher's `repository/chunk_fetcher.rs`.

pub mod filesystem;
pub mod s3;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A width/height pair. Zero or negative on either axis is invalid input to
/// the resizer (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// A listed or stat'd object, as returned by `list` / `read_one`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    /// Owning folder's directory key.
    pub dir: String,
    /// Object name within the folder.
    pub name: String,
    /// MIME type, derived from the filename extension.
    pub content_type: String,
    /// Object byte length.
    pub content_length: u64,
    /// Derivative names, populated for source files during listing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<String>>,
}

impl File {
    pub fn new(dir: impl Into<String>, name: impl Into<String>, content_length: u64) -> Self {
        let name = name.into();
        let content_type = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            dir: dir.into(),
            name,
            content_type,
            content_length,
            children: None,
        }
    }
}

/// Uniform object-store interface over a bucket-like namespace.
///
/// Implementations must be safe for concurrent use: the storage backend is
/// shared across folders and across the upload / backup / sync paths
/// (spec.md §5).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Overwrites on conflict. `size_hint` is an optional side channel some
    /// backends persist as metadata; it must never be trusted for
    /// correctness — `stat` is the only authority (spec.md Open Question 1).
    async fn put(&self, dir: &str, name: &str, bytes: Vec<u8>, size_hint: Option<Size>) -> Result<()>;

    /// Fails with `Error::NotFound` if the object does not exist.
    async fn get(&self, dir: &str, name: &str) -> Result<Vec<u8>>;

    /// Returns all objects whose key starts with `dir + prefix.unwrap_or("")`.
    /// Order is unspecified.
    async fn list(&self, dir: &str, prefix: Option<&str>) -> Result<Vec<File>>;

    /// Returns the authoritative decoded dimensions of the stored image.
    /// Implementations read metadata when present and fall back to decoding
    /// the image header otherwise — never trusting stale/absent metadata.
    async fn stat(&self, dir: &str, name: &str) -> Result<Size>;

    /// Idempotent: deleting a missing key succeeds.
    async fn delete(&self, dir: &str, name: &str) -> Result<()>;

    /// Cheap existence check.
    async fn exists(&self, dir: &str, name: &str) -> bool;
}

/// Decodes an image's pixel dimensions from its header without a full pixel
/// decode where the underlying crate supports it. Shared by both backends
/// so `stat` stays authoritative (spec.md Open Question 1).
pub(crate) fn decode_dimensions(bytes: &[u8]) -> Result<Size> {
    let reader = ::image::ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| crate::error::Error::DecodeError(e.to_string()))?;
    let (w, h) = reader
        .into_dimensions()
        .map_err(|e| crate::error::Error::DecodeError(e.to_string()))?;
    Ok(Size::new(w as i32, h as i32))
}
