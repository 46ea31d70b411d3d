//! Ingest, read, replication, garbage collection, and cluster membership
//! for the broker, built on top of [`kavka_store`] (chunk bodies),
//! [`kavka_meta`] (ordering and bookkeeping), and [`kavka_observer`]
//! (the watch fan-out write-concern waits on).

pub mod cleanup;
pub mod client;
pub mod cluster;
pub mod message;
pub mod queue;
pub mod syncer;

use kavka_meta::MetaStore;
use kavka_observer::Observer;
use kavka_store::BlobStore;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("store error: {0}")]
    Store(#[from] kavka_store::Error),
    #[error("metadata error: {0}")]
    Meta(#[from] kavka_meta::Error),
    #[error("bad key: {0}")]
    BadKey(#[from] kavka_meta::keys::BadKey),
    #[error("bad digest: {0}")]
    BadDigest(#[from] kavka_digest::Error),
    #[error("message not found")]
    MessageNotFound,
    #[error("blob not found: {0}")]
    BlobNotFound(String),
    #[error("topic creation is disallowed and topic/partition does not exist")]
    TopicNotFound,
    #[error("offset out of range ({from}, {to})")]
    OffsetOutOfRange { from: i64, to: i64 },
    #[error("malformed message: {0}")]
    BadMessage(#[from] serde_json::Error),
    #[error("remote sync failed: {0}")]
    Sync(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tunables from the `topic` section of the configuration.
#[derive(Debug, Clone)]
pub struct TopicConfig {
    pub allow_topics_creation: bool,
    pub write_concern: usize,
    pub message_retention_period: Option<Duration>,
    pub max_partition_size: u64,
    pub max_message_size: u64,
    pub max_chunk_size: usize,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            allow_topics_creation: false,
            write_concern: 1,
            message_retention_period: None,
            max_partition_size: 0,
            max_message_size: 0,
            max_chunk_size: 1024,
        }
    }
}

/// Shared handle every broker operation is built from; the explicit
/// equivalent of the context values the original threads through
/// `context.Value`.
#[derive(Clone)]
pub struct Broker {
    pub store: Arc<dyn BlobStore>,
    pub meta: MetaStore,
    pub observer: Arc<Observer>,
    pub topic: Arc<TopicConfig>,
    pub hostname: String,
    pub group: String,
    pub port: u16,
}

impl Broker {
    pub fn new(
        store: Arc<dyn BlobStore>,
        meta: MetaStore,
        observer: Arc<Observer>,
        topic: TopicConfig,
        hostname: impl Into<String>,
        group: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            store,
            meta,
            observer,
            topic: Arc::new(topic),
            hostname: hostname.into(),
            group: group.into(),
            port,
        }
    }
}
