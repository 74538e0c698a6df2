//! S3-compatible storage backend (spec.md §4.A).
//!
//! `dir` is a key prefix inside a configured bucket; `name` is the key
//! suffix. `list` uses a prefix query; `stat` reads object metadata when the
//! backend exposes it, falling back to decoding the object itself.
//!
//! Built on `rust-s3`, the same crate the teacher depends on for its
//! Cloudflare-R2-backed chunk store (`conary-server`'s `Cargo.toml`).

use super::{decode_dimensions, File, ObjectStore, Size};
use crate::error::{Error, Result};
use async_trait::async_trait;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::region::Region;
use std::sync::Arc;

/// Configuration for an S3-like backend, built from the YAML `storage-config`
/// tagged union (spec.md §6).
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

/// Builder mirroring `repository/chunk_fetcher.rs`'s
/// `HttpChunkFetcherBuilder`: a small fluent constructor rather than a long
/// positional one.
pub struct S3StoreBuilder {
    config: S3Config,
}

impl S3StoreBuilder {
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            config: S3Config {
                bucket: bucket.into(),
                region: region.into(),
                endpoint: None,
                access_key: None,
                secret_key: None,
            },
        }
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = Some(endpoint.into());
        self
    }

    pub fn credentials(mut self, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.config.access_key = Some(access_key.into());
        self.config.secret_key = Some(secret_key.into());
        self
    }

    pub fn build(self) -> Result<S3Store> {
        S3Store::new(self.config)
    }
}

/// S3-like object store. Keys are `{dir}/{name}` inside one bucket.
#[derive(Clone)]
pub struct S3Store {
    bucket: Arc<Bucket>,
}

impl S3Store {
    pub fn new(config: S3Config) -> Result<Self> {
        let region = match config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region,
                endpoint,
            },
            None => config
                .region
                .parse()
                .map_err(|e: s3::error::S3Error| Error::config(e.to_string()))?,
        };

        let credentials = match (config.access_key, config.secret_key) {
            (Some(key), Some(secret)) => Credentials::new(Some(&key), Some(&secret), None, None, None)
                .map_err(|e| Error::config(e.to_string()))?,
            _ => Credentials::anonymous().map_err(|e| Error::config(e.to_string()))?,
        };

        let bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| Error::config(e.to_string()))?
            .with_path_style();

        Ok(Self { bucket: Arc::new(*bucket) })
    }

    fn key(dir: &str, name: &str) -> String {
        format!("{}/{}", dir.trim_matches('/'), name)
    }

    fn map_s3_err(e: s3::error::S3Error) -> Error {
        match e {
            s3::error::S3Error::Http(code, msg) if code == 404 => Error::NotFound(msg),
            s3::error::S3Error::Http(401, msg) | s3::error::S3Error::Http(403, msg) => {
                Error::Permanent(msg)
            }
            s3::error::S3Error::Http(code, msg) if (500..600).contains(&code) => {
                Error::Transient(msg)
            }
            other => Error::Permanent(other.to_string()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, dir: &str, name: &str, bytes: Vec<u8>, _size_hint: Option<Size>) -> Result<()> {
        let key = Self::key(dir, name);
        self.bucket
            .put_object(&key, &bytes)
            .await
            .map_err(Self::map_s3_err)?;
        Ok(())
    }

    async fn get(&self, dir: &str, name: &str) -> Result<Vec<u8>> {
        let key = Self::key(dir, name);
        let response = self.bucket.get_object(&key).await.map_err(Self::map_s3_err)?;
        if response.status_code() == 404 {
            return Err(Error::not_found(name));
        }
        Ok(response.bytes().to_vec())
    }

    async fn list(&self, dir: &str, prefix: Option<&str>) -> Result<Vec<File>> {
        let dir = dir.trim_matches('/');
        let full_prefix = match prefix {
            Some(p) => format!("{dir}/{p}"),
            None => format!("{dir}/"),
        };
        let pages = self
            .bucket
            .list(full_prefix.clone(), None)
            .await
            .map_err(Self::map_s3_err)?;

        let mut out = Vec::new();
        for page in pages {
            for obj in page.contents {
                let name = match obj.key.strip_prefix(&format!("{dir}/")) {
                    Some(n) if !n.is_empty() => n.to_string(),
                    _ => continue,
                };
                out.push(File::new(dir, name, obj.size as u64));
            }
        }
        Ok(out)
    }

    async fn stat(&self, dir: &str, name: &str) -> Result<Size> {
        // rust-s3's basic API does not expose custom object metadata; decode
        // is always authoritative here (spec.md Open Question 1).
        let bytes = self.get(dir, name).await?;
        decode_dimensions(&bytes)
    }

    async fn delete(&self, dir: &str, name: &str) -> Result<()> {
        let key = Self::key(dir, name);
        match self.bucket.delete_object(&key).await {
            Ok(_) => Ok(()),
            Err(e) => match Self::map_s3_err(e) {
                Error::NotFound(_) => Ok(()),
                other => Err(other),
            },
        }
    }

    async fn exists(&self, dir: &str, name: &str) -> bool {
        let key = Self::key(dir, name);
        matches!(self.bucket.head_object(&key).await, Ok((_, 200)))
    }
}
