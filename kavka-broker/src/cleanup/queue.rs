//! Queue sweeper: drops messages once they age past the configured
//! retention period, and drops the oldest messages in a partition once
//! its total chunk size exceeds the configured cap.

use crate::message::MessageInfo;
use crate::{Broker, Error};
use chrono::Utc;
use kavka_meta::keys::{QueueKey, TopicKey};
use kavka_meta::SortOrder;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Spawns the sweeper's timer loop. Dropping or aborting the returned
/// handle stops it.
pub fn spawn(broker: Broker) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = run_once(&broker).await {
                error!(error = %e, "queue cleanup failed");
            }
        }
    })
}

/// Sweeps every known topic/partition once.
pub async fn run_once(broker: &Broker) -> Result<(), Error> {
    let prefix = TopicKey::new("");
    let topics = broker.meta.list(&prefix.to_string(), SortOrder::Ascend)?;

    for entry in topics {
        let key: TopicKey = entry.key.parse()?;
        if let Err(e) = cleanup_expired_messages(broker, &key.topic, key.partition).await {
            error!(topic = %key.topic, partition = key.partition, error = %e, "expired message cleanup failed");
        }
        if let Err(e) = cleanup_oversized_messages(broker, &key.topic, key.partition).await {
            error!(topic = %key.topic, partition = key.partition, error = %e, "oversized message cleanup failed");
        }
    }

    Ok(())
}

/// Deletes every message older than `message_retention_period`, oldest
/// first. A `None` retention period disables this sweep entirely.
pub async fn cleanup_expired_messages(broker: &Broker, topic: &str, partition: i64) -> Result<(), Error> {
    let Some(retention) = broker.topic.message_retention_period else {
        return Ok(());
    };

    let deadline = Utc::now() - retention;
    let prefix = QueueKey::new(topic, partition);
    let records = broker.meta.list(&prefix.to_string(), SortOrder::Ascend)?;

    for entry in records {
        let key: QueueKey = entry.key.parse()?;
        let msg = MessageInfo::from_json(&entry.value)?;

        if msg.creation_time > deadline {
            continue;
        }

        msg.remove_refs(broker, topic, partition, key.offset)?;
        broker.meta.delete(&entry.key)?;
        info!(key = %key, "message expired");
    }

    Ok(())
}

/// Deletes messages starting from the newest until the partition's
/// total chunk size is back under `max_partition_size`. A `0` cap
/// disables this sweep entirely.
pub async fn cleanup_oversized_messages(broker: &Broker, topic: &str, partition: i64) -> Result<(), Error> {
    if broker.topic.max_partition_size == 0 {
        return Ok(());
    }

    let prefix = QueueKey::new(topic, partition);
    let records = broker.meta.list(&prefix.to_string(), SortOrder::Descend)?;

    let mut queue_size: u64 = 0;

    for entry in records {
        let key: QueueKey = entry.key.parse()?;
        let msg = MessageInfo::from_json(&entry.value)?;
        queue_size += msg.blobs.iter().map(|d| d.size).sum::<u64>();

        if queue_size < broker.topic.max_partition_size {
            continue;
        }

        msg.remove_refs(broker, topic, partition, key.offset)?;
        broker.meta.delete(&entry.key)?;
        info!(key = %key, "message evicted for partition size");
    }

    Ok(())
}
