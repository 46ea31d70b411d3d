//! Local pluggable content-addressed blob storage.
//!
//! A [`BlobStore`] is a KV of `digest -> bytes`. Drivers register under a
//! name; configuration selects exactly one via [`from_config`].

use async_trait::async_trait;
use bytes::Bytes;
use kavka_digest::Digest;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncRead;

mod filesystem;
mod memory;

pub use filesystem::FsBlobStore;
pub use memory::MemoryBlobStore;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown blob: {0}")]
    BlobUnknown(Digest),
    #[error("bad digest: {0}")]
    BadDigest(#[from] kavka_digest::Error),
    #[error("storage driver {0:?} not registered")]
    UnknownDriver(String),
    #[error("storage driver {driver:?} missing required parameter {param:?}")]
    MissingParameter { driver: String, param: String },
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value.to_string())
    }
}

pub type Reader = Box<dyn AsyncRead + Send + Unpin>;

/// The base trait all storage drivers implement.
///
/// Implementations must be safe for concurrent reads, writes, deletes, and
/// iteration; iteration is a snapshot over whatever existed at the moment
/// it was requested.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Existence check, without reading the blob's contents.
    async fn has(&self, digest: &Digest) -> Result<bool, Error>;

    /// Reads a blob fully into memory.
    async fn read(&self, digest: &Digest) -> Result<Bytes, Error>;

    /// Opens a streaming reader over a blob. The caller is responsible for
    /// dropping it; no explicit release call is required in this
    /// implementation (unlike the Go original's `io.ReadCloser`), since
    /// Rust's ownership model releases the underlying handle on drop.
    async fn open_reader(&self, digest: &Digest) -> Result<Reader, Error>;

    /// Writes a blob, returning its digest. Idempotent: writing bytes that
    /// already exist under their digest is not an error.
    async fn write(&self, data: Bytes) -> Result<Digest, Error>;

    /// Deletes a blob. Idempotent: deleting an absent blob is not an error.
    async fn delete(&self, digest: &Digest) -> Result<(), Error>;

    /// Snapshot iteration over every locally stored digest.
    async fn iterate(&self) -> Result<Vec<Digest>, Error>;

    /// Releases any resources held by the driver (file handles, pools).
    async fn close(&self) -> Result<(), Error>;
}

/// Parameters for a storage driver, as they appear under `storage.driver.<name>`
/// in the YAML configuration.
pub type DriverParameters = HashMap<String, String>;

/// Builds a [`BlobStore`] for the named driver.
///
/// This is an explicit constructor table keyed by driver name, built once
/// at startup -- no init-time side effects, no process-wide registration.
pub fn from_config(name: &str, params: &DriverParameters) -> Result<Arc<dyn BlobStore>, Error> {
    match name {
        "memory" => Ok(Arc::new(MemoryBlobStore::default())),
        "filesystem" => {
            let path = params.get("path").ok_or_else(|| Error::MissingParameter {
                driver: name.to_string(),
                param: "path".to_string(),
            })?;
            Ok(Arc::new(FsBlobStore::new(path)))
        }
        other => Err(Error::UnknownDriver(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_driver_rejected() {
        let err = from_config("nope", &DriverParameters::new()).unwrap_err();
        assert!(matches!(err, Error::UnknownDriver(_)));
    }

    #[test]
    fn filesystem_requires_path() {
        let err = from_config("filesystem", &DriverParameters::new()).unwrap_err();
        assert!(matches!(err, Error::MissingParameter { .. }));
    }
}
