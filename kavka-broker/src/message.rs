//! A message's envelope: its id, creation time, and the ordered list of
//! chunks its body was split into. This is what actually gets stored as
//! the value under a queue key.

use crate::{Broker, Error};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use kavka_digest::Digest;
use kavka_meta::keys::{BlobKey, RefKey};
use kavka_observer::quorum::QuorumWaiter;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

/// A single stored chunk: its digest and size in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub digest: Digest,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageInfo {
    pub id: Uuid,
    #[serde(rename = "creation-time")]
    pub creation_time: DateTime<Utc>,
    #[serde(default)]
    pub blobs: Vec<Descriptor>,
}

impl MessageInfo {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            creation_time: Utc::now(),
            blobs: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(data)?)
    }

    /// Splits `reader` into chunks no larger than the topic's configured
    /// chunk size, writing any chunk this node doesn't already have and
    /// advertising it, then blocking until the configured write concern
    /// is satisfied for every chunk this call actually wrote. Chunks
    /// already present locally (because some other message referenced
    /// the same bytes) are not rewritten or re-advertised.
    ///
    /// Not idempotent: retrying a failed or cancelled call re-chunks and
    /// re-advertises from scratch; a cancellation partway through leaves
    /// already-written chunks and their advertisements in place.
    pub async fn copy_in<R: AsyncRead + Unpin>(
        &mut self,
        broker: &Broker,
        mut reader: R,
    ) -> Result<(), Error> {
        let waiter = QuorumWaiter::new(broker.observer.clone());
        let mut pending = Vec::new();
        let now = Utc::now().to_rfc3339();

        loop {
            let mut buf = vec![0u8; broker.topic.max_chunk_size];
            let mut filled = 0;
            while filled < buf.len() {
                let n = reader.read(&mut buf[filled..]).await?;
                if n == 0 {
                    break;
                }
                filled += n;
            }

            if filled == 0 {
                break;
            }
            buf.truncate(filled);
            let data = Bytes::from(buf);
            let digest = kavka_digest::hash(&data);
            let already_local = broker.store.has(&digest).await?;

            if !already_local {
                broker.store.write(data.clone()).await?;

                let handle = waiter.register(digest.clone(), broker.topic.write_concern).await;
                pending.push(handle);

                let key = BlobKey::with_host(digest.clone(), broker.group.clone(), broker.hostname.clone());
                broker.meta.create(&key.to_string(), &now)?;
            }

            self.blobs.push(Descriptor {
                digest,
                size: data.len() as u64,
            });

            if filled < broker.topic.max_chunk_size {
                break;
            }
        }

        for handle in pending {
            handle.wait().await;
        }

        Ok(())
    }

    /// Streams every chunk's bytes to `writer`, in order, ensuring any
    /// chunk missing locally is pulled from a peer first.
    pub async fn copy_out<W: AsyncWrite + Unpin>(
        &self,
        broker: &Broker,
        writer: &mut W,
    ) -> Result<(), Error> {
        let digests: Vec<Digest> = self.blobs.iter().map(|d| d.digest.clone()).collect();
        crate::syncer::ensure_series(broker, &digests).await?;

        for chunk in &self.blobs {
            let mut reader = broker
                .store
                .open_reader(&chunk.digest)
                .await
                .map_err(|e| match e {
                    kavka_store::Error::BlobUnknown(d) => Error::BlobNotFound(d.to_string()),
                    other => other.into(),
                })?;
            tokio::io::copy(&mut reader, writer).await?;
        }

        Ok(())
    }

    /// Records one ordered ref per chunk under `/refs/<digest>/<topic>/<partition>/<offset>/<order>`.
    pub fn make_refs(&self, broker: &Broker, topic: &str, partition: i64, offset: i64) -> Result<(), Error> {
        let now = Utc::now().to_rfc3339();

        for (order, chunk) in self.blobs.iter().enumerate() {
            let key = RefKey::full(chunk.digest.to_string(), topic, partition, offset, order as i64);
            broker.meta.create(&key.to_string(), &now)?;
        }
        Ok(())
    }

    /// Removes every ref this message holds for `topic`/`partition`/`offset`.
    /// Used by GC once a message is expired or the partition is over
    /// size; safe to call even if some refs were already removed. Scoped
    /// to this message's own offset so other live messages in the same
    /// partition sharing a digest keep their refs.
    pub fn remove_refs(&self, broker: &Broker, topic: &str, partition: i64, offset: i64) -> Result<(), Error> {
        for chunk in &self.blobs {
            let prefix = RefKey::full(chunk.digest.to_string(), topic, partition, offset, -1);
            for entry in broker.meta.list(&prefix.to_string(), kavka_meta::SortOrder::Ascend)? {
                broker.meta.delete(&entry.key)?;
            }
        }
        Ok(())
    }
}

impl Default for MessageInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TopicConfig;
    use kavka_meta::MetaStore;
    use kavka_observer::Observer;
    use kavka_store::MemoryBlobStore;
    use std::io::Cursor;
    use std::sync::Arc;

    fn test_broker(max_chunk_size: usize) -> Broker {
        Broker::new(
            Arc::new(MemoryBlobStore::default()),
            MetaStore::temporary().unwrap(),
            Arc::new(Observer::new(MetaStore::temporary().unwrap())),
            TopicConfig {
                max_chunk_size,
                write_concern: 0,
                ..TopicConfig::default()
            },
            "node-a",
            "group-a",
            9000,
        )
    }

    #[tokio::test]
    async fn copy_in_splits_into_chunks() {
        let broker = test_broker(4);
        let mut msg = MessageInfo::new();
        msg.copy_in(&broker, Cursor::new(b"hello world".to_vec())).await.unwrap();
        assert_eq!(msg.blobs.len(), 3);
        assert_eq!(msg.blobs.iter().map(|d| d.size).sum::<u64>(), 11);
    }

    #[tokio::test]
    async fn copy_in_then_copy_out_roundtrips() {
        let broker = test_broker(4);
        let mut msg = MessageInfo::new();
        msg.copy_in(&broker, Cursor::new(b"hello world".to_vec())).await.unwrap();

        let mut out = Vec::new();
        msg.copy_out(&broker, &mut out).await.unwrap();
        assert_eq!(out, b"hello world");
    }

    #[tokio::test]
    async fn json_roundtrip_preserves_blobs() {
        let broker = test_broker(1024);
        let mut msg = MessageInfo::new();
        msg.copy_in(&broker, Cursor::new(b"hi".to_vec())).await.unwrap();

        let json = msg.to_json().unwrap();
        let parsed = MessageInfo::from_json(&json).unwrap();
        assert_eq!(parsed.blobs, msg.blobs);
    }

    #[tokio::test]
    async fn make_refs_then_remove_refs_clears_them() {
        let broker = test_broker(1024);
        let mut msg = MessageInfo::new();
        msg.copy_in(&broker, Cursor::new(b"hi".to_vec())).await.unwrap();
        msg.make_refs(&broker, "events", 0, 0).unwrap();

        let prefix = RefKey::full(msg.blobs[0].digest.to_string(), "", -1, -1, -1);
        assert!(!broker.meta.list(&prefix.to_string(), kavka_meta::SortOrder::Ascend).unwrap().is_empty());

        msg.remove_refs(&broker, "events", 0, 0).unwrap();
        assert!(broker.meta.list(&prefix.to_string(), kavka_meta::SortOrder::Ascend).unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_refs_is_scoped_to_its_own_offset() {
        // Two messages sharing a digest (identical bytes) each get their own
        // ref at their own offset; removing one must not touch the other's.
        let broker = test_broker(1024);
        let mut first = MessageInfo::new();
        first.copy_in(&broker, Cursor::new(b"same".to_vec())).await.unwrap();
        first.make_refs(&broker, "events", 0, 0).unwrap();

        let mut second = MessageInfo::new();
        second.copy_in(&broker, Cursor::new(b"same".to_vec())).await.unwrap();
        second.make_refs(&broker, "events", 0, 1).unwrap();

        assert_eq!(first.blobs[0].digest, second.blobs[0].digest);

        first.remove_refs(&broker, "events", 0, 0).unwrap();

        let prefix = RefKey::full(second.blobs[0].digest.to_string(), "", -1, -1, -1);
        assert!(!broker.meta.list(&prefix.to_string(), kavka_meta::SortOrder::Ascend).unwrap().is_empty());
    }
}
