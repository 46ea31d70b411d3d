//! Storage sweeper: reclaims chunks no live reference still points to.

use crate::{Broker, Error};
use kavka_meta::keys::{BlobKey, RefKey};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Spawns the sweeper's timer loop. Dropping or aborting the returned
/// handle stops it.
pub fn spawn(broker: Broker, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(e) = run_once(&broker).await {
                error!(error = %e, "storage cleanup failed");
            }
        }
    })
}

/// Walks every stored chunk once, deleting any whose reference count
/// has dropped to zero along with its blob advertisement on this node.
pub async fn run_once(broker: &Broker) -> Result<(), Error> {
    for digest in broker.store.iterate().await? {
        let prefix = RefKey::new(digest.to_string());
        let count = broker.meta.count(&prefix.to_string())?;

        if count > 0 {
            continue;
        }

        info!(digest = %digest, "storage key is definitely lost");

        let blob_key = BlobKey::with_host(digest.clone(), broker.group.clone(), broker.hostname.clone());
        if let Err(e) = broker.meta.delete(&blob_key.to_string()) {
            error!(key = %blob_key, error = %e, "unable to delete blob advertisement");
        }

        if let Err(e) = broker.store.delete(&digest).await {
            error!(digest = %digest, error = %e, "unable to remove blob from storage");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TopicConfig;
    use bytes::Bytes;
    use kavka_meta::MetaStore;
    use kavka_observer::Observer;
    use kavka_store::MemoryBlobStore;
    use std::sync::Arc;

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
    async fn unreferenced_blobs_are_removed() {
        let broker = test_broker();
        let digest = broker.store.write(Bytes::from_static(b"hi")).await.unwrap();
        let blob_key = BlobKey::with_host(digest.clone(), "group-a", "node-a");
        broker.meta.create(&blob_key.to_string(), "now").unwrap();

        run_once(&broker).await.unwrap();

        assert!(!broker.store.has(&digest).await.unwrap());
        assert!(broker.meta.get(&blob_key.to_string()).unwrap().is_none());
    }

    #[tokio::test]
    async fn referenced_blobs_survive() {
        let broker = test_broker();
        let digest = broker.store.write(Bytes::from_static(b"hi")).await.unwrap();
        let ref_key = RefKey::full(digest.to_string(), "events", 0, 0, 0);
        broker.meta.create(&ref_key.to_string(), "now").unwrap();

        run_once(&broker).await.unwrap();

        assert!(broker.store.has(&digest).await.unwrap());
    }
}
