use crate::{BlobStore, Error, Reader};
use async_trait::async_trait;
use bytes::Bytes;
use kavka_digest::Digest;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Storage driver backed by one file per digest under a root directory.
/// Writes go to a temp file in the same directory and are fsynced before
/// being renamed into place, so a crash mid-write never leaves a partial
/// blob visible under its final name.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, digest: &Digest) -> PathBuf {
        self.root.join(format!("{}_{}", digest.algorithm(), digest.hex()))
    }

    async fn ensure_root(&self) -> Result<(), Error> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn has(&self, digest: &Digest) -> Result<bool, Error> {
        Ok(fs::try_exists(self.path_for(digest)).await?)
    }

    async fn read(&self, digest: &Digest) -> Result<Bytes, Error> {
        match fs::read(self.path_for(digest)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::BlobUnknown(digest.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn open_reader(&self, digest: &Digest) -> Result<Reader, Error> {
        match fs::File::open(self.path_for(digest)).await {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::BlobUnknown(digest.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, data: Bytes) -> Result<Digest, Error> {
        self.ensure_root().await?;
        let digest = kavka_digest::hash(&data);
        let dest = self.path_for(&digest);

        if fs::try_exists(&dest).await? {
            return Ok(digest);
        }

        let tmp = self.root.join(format!(".tmp-{}", uuid::Uuid::new_v4()));
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        fs::rename(&tmp, &dest).await?;

        Ok(digest)
    }

    async fn delete(&self, digest: &Digest) -> Result<(), Error> {
        match fs::remove_file(self.path_for(digest)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn iterate(&self) -> Result<Vec<Digest>, Error> {
        self.ensure_root().await?;
        let mut entries = fs::read_dir(&self.root).await?;
        let mut digests = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some((algo, hex)) = name.split_once('_') {
                if let Ok(digest) = format!("{algo}:{hex}").parse() {
                    digests.push(digest);
                }
            }
        }

        Ok(digests)
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
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        let digest = store.write(Bytes::from_static(b"hello")).await.unwrap();
        assert_eq!(store.read(&digest).await.unwrap(), Bytes::from_static(b"hello"));
        assert!(store.has(&digest).await.unwrap());
    }

    #[tokio::test]
    async fn missing_blob_is_blob_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        let digest = kavka_digest::hash(b"missing");
        assert!(matches!(
            store.read(&digest).await,
            Err(Error::BlobUnknown(_))
        ));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        let digest = store.write(Bytes::from_static(b"hello")).await.unwrap();
        store.delete(&digest).await.unwrap();
        store.delete(&digest).await.unwrap();
        assert!(!store.has(&digest).await.unwrap());
    }

    #[tokio::test]
    async fn iterate_reflects_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        let a = store.write(Bytes::from_static(b"a")).await.unwrap();
        let b = store.write(Bytes::from_static(b"b")).await.unwrap();
        let mut got = store.iterate().await.unwrap();
        got.sort();
        let mut want = vec![a, b];
        want.sort();
        assert_eq!(got, want);
    }
}
