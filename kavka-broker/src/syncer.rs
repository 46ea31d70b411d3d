//! Background replication. Watches blob advertisements from other nodes
//! and pulls any chunk this node doesn't already have, bounded by a
//! worker pool so a burst of advertisements can't open unbounded
//! concurrent downloads.

use crate::{client::Client, Broker, Error};
use async_trait::async_trait;
use kavka_digest::Digest;
use kavka_meta::keys::BlobKey;
use kavka_meta::{SortOrder, WatchEvent};
use kavka_observer::{Filter, Handler};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Pulls `digest` from whichever advertised node answers first.
pub async fn sync_blob(broker: &Broker, digest: &Digest) -> Result<(), Error> {
    let prefix = BlobKey::new(digest.clone());
    let nodes = broker.meta.list(&prefix.to_string(), SortOrder::Ascend)?;

    if nodes.is_empty() {
        return Err(Error::BlobNotFound(digest.to_string()));
    }

    for entry in nodes {
        let key: BlobKey = entry.key.parse()?;
        if key.host.is_empty() || key.host == broker.hostname {
            continue;
        }

        let client = Client::new(&key.host, broker.port);
        let data = match client.get_blob(digest).await {
            Ok(data) => data,
            Err(e) => {
                warn!(host = %key.host, error = %e, "unable to fetch blob from remote");
                continue;
            }
        };

        let got = broker.store.write(data).await?;
        if got != *digest {
            error!(host = %key.host, wanted = %digest, got = %got, "remote returned different digest");
            continue;
        }

        info!(digest = %digest, host = %key.host, "synced blob from remote");
        return Ok(());
    }

    Err(Error::Sync(format!("unable to sync {digest}")))
}

/// Ensures every digest in `digests` is present locally, fetching
/// missing ones concurrently. Used by the read path before streaming a
/// message's chunks back to a client.
pub async fn ensure_series(broker: &Broker, digests: &[Digest]) -> Result<(), Error> {
    let results = futures::future::join_all(digests.iter().map(|digest| async move {
        if broker.store.has(digest).await? {
            return Ok(());
        }
        sync_blob(broker, digest).await
    }))
    .await;

    for result in results {
        result?;
    }
    Ok(())
}

struct SyncHandler {
    broker: Broker,
    pool: Arc<Semaphore>,
}

#[async_trait]
impl Handler for SyncHandler {
    async fn handle(&self, event: &WatchEvent) {
        let entry = match event {
            WatchEvent::Create(entry) | WatchEvent::Update(entry) => entry,
            WatchEvent::Delete { .. } => return,
        };

        let Ok(key) = entry.key.parse::<BlobKey>() else {
            return;
        };
        if key.host == self.broker.hostname {
            return;
        }
        let Some(digest) = key.digest.clone() else {
            return;
        };

        let broker = self.broker.clone();
        let pool = self.pool.clone();

        tokio::spawn(async move {
            let Ok(_permit) = pool.acquire_owned().await else {
                return;
            };

            match broker.store.has(&digest).await {
                Ok(true) => return,
                Ok(false) => {}
                Err(e) => {
                    error!(error = %e, "existence check failed during sync");
                    return;
                }
            }

            if let Err(e) = sync_blob(&broker, &digest).await {
                error!(error = %e, digest = %digest, "background sync failed");
            }
        });
    }
}

/// Builds the syncer's watch registration over `/blobs`. The caller owns
/// the returned [`Filter`]'s lifetime and must call `start()`.
pub fn filter(broker: Broker, pool_capacity: usize) -> Filter {
    let pool = Arc::new(Semaphore::new(pool_capacity.max(1)));
    let handler = Arc::new(SyncHandler { broker: broker.clone(), pool });
    Filter::new(broker.observer.clone(), handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TopicConfig;
    use kavka_meta::MetaStore;
    use kavka_observer::Observer;
    use kavka_store::MemoryBlobStore;

    fn test_broker() -> Broker {
        Broker::new(
            Arc::new(MemoryBlobStore::default()),
            MetaStore::temporary().unwrap(),
            Arc::new(Observer::new(MetaStore::temporary().unwrap())),
            TopicConfig::default(),
            "node-a",
            "group-a",
            9000,
        )
    }

    #[tokio::test]
    async fn sync_blob_fails_with_no_advertisements() {
        let broker = test_broker();
        let digest = kavka_digest::hash(b"hello");
        assert!(matches!(
            sync_blob(&broker, &digest).await,
            Err(Error::BlobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn ensure_series_skips_locally_present_blobs() {
        let broker = test_broker();
        let digest = broker.store.write(bytes::Bytes::from_static(b"hi")).await.unwrap();
        ensure_series(&broker, &[digest]).await.unwrap();
    }
}
