//! Cluster membership: the set of nodes known to be participating in a
//! replication group, advertised the same way blob ownership is.

use crate::{Broker, Error};
use chrono::{DateTime, Utc};
use kavka_meta::keys::ClusterKey;
use kavka_meta::SortOrder;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub group: String,
    pub host: String,
    pub advertised_at: DateTime<Utc>,
}

/// Registers this node (or updates its timestamp, if already present).
pub fn register(broker: &Broker) -> Result<NodeRecord, Error> {
    upsert(broker, &broker.group, &broker.hostname)
}

/// Registers an arbitrary node, used by the cluster-membership admin
/// surface to add a peer this node didn't discover on its own.
pub fn upsert(broker: &Broker, group: &str, host: &str) -> Result<NodeRecord, Error> {
    let record = NodeRecord {
        group: group.to_string(),
        host: host.to_string(),
        advertised_at: Utc::now(),
    };
    let key = ClusterKey::with_node(&record.group, &record.host);
    broker.meta.put(&key.to_string(), &record.advertised_at.to_rfc3339())?;
    Ok(record)
}

/// Lists every node known in `group`, or every node in every group when
/// `group` is empty.
pub fn list(broker: &Broker, group: &str) -> Result<Vec<NodeRecord>, Error> {
    let prefix = ClusterKey::new(group);
    let entries = broker.meta.list(&prefix.to_string(), SortOrder::Ascend)?;

    entries
        .into_iter()
        .map(|entry| {
            let key: ClusterKey = entry.key.parse()?;
            let advertised_at = entry
                .value
                .parse::<DateTime<Utc>>()
                .map_err(|_| Error::Sync(format!("bad timestamp in {}", entry.key)))?;
            Ok(NodeRecord {
                group: key.group,
                host: key.node,
                advertised_at,
            })
        })
        .collect()
}

/// Removes a node's membership record.
pub fn remove(broker: &Broker, group: &str, host: &str) -> Result<(), Error> {
    let key = ClusterKey::with_node(group, host);
    broker.meta.delete(&key.to_string())?;
    Ok(())
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
    fn register_then_list() {
        let broker = test_broker();
        register(&broker).unwrap();
        let nodes = list(&broker, "group-a").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].host, "node-a");
    }

    #[test]
    fn remove_drops_the_record() {
        let broker = test_broker();
        register(&broker).unwrap();
        remove(&broker, "group-a", "node-a").unwrap();
        assert!(list(&broker, "group-a").unwrap().is_empty());
    }
}
