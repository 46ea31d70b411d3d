//! Per-partition message queues: assigning offsets and looking up the
//! oldest/newest offset a partition currently holds.

use crate::{Broker, Error};
use kavka_meta::keys::QueueKey;

/// Assigns the next sequential offset for `topic`/`partition` and stores
/// `value` (a serialized [`crate::message::MessageInfo`]) under it.
/// Returns the key that was created.
pub fn create_queue(broker: &Broker, topic: &str, partition: i64, value: &str) -> Result<QueueKey, Error> {
    let prefix = QueueKey::new(topic, partition);
    let created = broker.meta.create_sequential(&prefix.to_string(), value)?;
    Ok(created.parse()?)
}

/// The oldest and one-past-the-newest offset currently stored for
/// `topic`/`partition`. An empty partition reports `(0, 0)`.
pub fn corner_offsets(broker: &Broker, topic: &str, partition: i64) -> Result<(i64, i64), Error> {
    let prefix = QueueKey::new(topic, partition);
    let prefix_str = prefix.to_string();

    let oldest = match broker.meta.get_first(&prefix_str)? {
        Some(entry) => entry.key.parse::<QueueKey>()?.offset,
        None => return Ok((0, 0)),
    };
    let newest = match broker.meta.get_last(&prefix_str)? {
        Some(entry) => entry.key.parse::<QueueKey>()?.offset,
        None => return Ok((0, 0)),
    };

    Ok((oldest, newest + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TopicConfig;
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

    #[test]
    fn create_queue_assigns_increasing_offsets() {
        let broker = test_broker();
        let first = create_queue(&broker, "events", 0, "a").unwrap();
        let second = create_queue(&broker, "events", 0, "b").unwrap();
        assert_eq!(first.offset, 0);
        assert_eq!(second.offset, 1);
    }

    #[test]
    fn corner_offsets_empty_partition() {
        let broker = test_broker();
        assert_eq!(corner_offsets(&broker, "events", 0).unwrap(), (0, 0));
    }

    #[test]
    fn corner_offsets_reflects_contents() {
        let broker = test_broker();
        create_queue(&broker, "events", 0, "a").unwrap();
        create_queue(&broker, "events", 0, "b").unwrap();
        assert_eq!(corner_offsets(&broker, "events", 0).unwrap(), (0, 2));
    }
}
