use crate::{BlobStore, Error, Reader};
use async_trait::async_trait;
use bytes::Bytes;
use kavka_digest::Digest;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::Cursor;

/// In-process storage driver backed by a `HashMap`. Nothing is persisted;
/// restarting the process loses every blob.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<Digest, Bytes>>,
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn has(&self, digest: &Digest) -> Result<bool, Error> {
        Ok(self.blobs.read().contains_key(digest))
    }

    async fn read(&self, digest: &Digest) -> Result<Bytes, Error> {
        self.blobs
            .read()
            .get(digest)
            .cloned()
            .ok_or_else(|| Error::BlobUnknown(digest.clone()))
    }

    async fn open_reader(&self, digest: &Digest) -> Result<Reader, Error> {
        let bytes = self.read(digest).await?;
        Ok(Box::new(Cursor::new(bytes.to_vec())))
    }

    async fn write(&self, data: Bytes) -> Result<Digest, Error> {
        let digest = kavka_digest::hash(&data);
        self.blobs.write().entry(digest.clone()).or_insert(data);
        Ok(digest)
    }

    async fn delete(&self, digest: &Digest) -> Result<(), Error> {
        self.blobs.write().remove(digest);
        Ok(())
    }

    async fn iterate(&self) -> Result<Vec<Digest>, Error> {
        Ok(self.blobs.read().keys().cloned().collect())
    }

    async fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read() {
        let store = MemoryBlobStore::default();
        let digest = store.write(Bytes::from_static(b"hello")).await.unwrap();
        assert_eq!(store.read(&digest).await.unwrap(), Bytes::from_static(b"hello"));
        assert!(store.has(&digest).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_write_is_not_an_error() {
        let store = MemoryBlobStore::default();
        let first = store.write(Bytes::from_static(b"hello")).await.unwrap();
        let second = store.write(Bytes::from_static(b"hello")).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn read_missing_is_blob_unknown() {
        let store = MemoryBlobStore::default();
        let digest = kavka_digest::hash(b"missing");
        assert!(matches!(
            store.read(&digest).await,
            Err(Error::BlobUnknown(_))
        ));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryBlobStore::default();
        let digest = store.write(Bytes::from_static(b"hello")).await.unwrap();
        store.delete(&digest).await.unwrap();
        store.delete(&digest).await.unwrap();
        assert!(!store.has(&digest).await.unwrap());
    }

    #[tokio::test]
    async fn iterate_reflects_contents() {
        let store = MemoryBlobStore::default();
        let a = store.write(Bytes::from_static(b"a")).await.unwrap();
        let b = store.write(Bytes::from_static(b"b")).await.unwrap();
        let mut got = store.iterate().await.unwrap();
        got.sort();
        let mut want = vec![a, b];
        want.sort();
        assert_eq!(got, want);
    }
}
