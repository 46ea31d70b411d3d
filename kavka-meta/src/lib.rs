//! A typed facade over an embedded, linearizable key-value store.
//!
//! The broker needs a KV with prefix scans, sorted range queries, a
//! compare-and-swap primitive (to hand out monotonically increasing
//! offsets without a central sequencer), and prefix watch streams. This
//! crate resolves that to a concrete, embedded [`sled::Db`]: the
//! consensus protocol a production deployment would run in front of it is
//! an orthogonal concern this crate does not implement.

pub mod keys;

use async_stream::stream;
use futures::Stream;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("key not found")]
    NotFound,
    #[error("key already exists")]
    AlreadyExists,
    #[error("store error: {0}")]
    Store(#[from] sled::Error),
    #[error("bad key: {0}")]
    BadKey(#[from] keys::BadKey),
}

/// A single stored key/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascend,
    Descend,
}

/// A watch notification for a key under an observed prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Create(Entry),
    Update(Entry),
    Delete { key: String },
}

/// One write in an atomic, all-or-nothing batch.
pub enum TxnOp {
    Put(String, String),
    Delete(String),
}

#[derive(Clone)]
pub struct MetaStore {
    db: sled::Db,
}

impl MetaStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let db = sled::Config::default().path(path).open()?;
        Ok(Self { db })
    }

    pub fn temporary() -> Result<Self, Error> {
        let db = sled::Config::default().temporary(true).open()?;
        Ok(Self { db })
    }

    pub fn get(&self, key: &str) -> Result<Option<Entry>, Error> {
        Ok(self.db.get(key)?.map(|v| Entry {
            key: key.to_string(),
            value: ivec_to_string(&v),
        }))
    }

    /// Smallest key under `prefix`, in lexicographic order.
    pub fn get_first(&self, prefix: &str) -> Result<Option<Entry>, Error> {
        let scan_prefix = format!("{prefix}/");
        Ok(self
            .db
            .scan_prefix(&scan_prefix)
            .next()
            .transpose()?
            .map(|(k, v)| Entry {
                key: String::from_utf8_lossy(&k).into_owned(),
                value: ivec_to_string(&v),
            }))
    }

    /// Largest key under `prefix`, in lexicographic order.
    pub fn get_last(&self, prefix: &str) -> Result<Option<Entry>, Error> {
        let scan_prefix = format!("{prefix}/");
        Ok(self
            .db
            .scan_prefix(&scan_prefix)
            .next_back()
            .transpose()?
            .map(|(k, v)| Entry {
                key: String::from_utf8_lossy(&k).into_owned(),
                value: ivec_to_string(&v),
            }))
    }

    pub fn count(&self, prefix: &str) -> Result<u64, Error> {
        let scan_prefix = format!("{prefix}/");
        Ok(self.db.scan_prefix(&scan_prefix).count() as u64)
    }

    pub fn list(&self, prefix: &str, order: SortOrder) -> Result<Vec<Entry>, Error> {
        let scan_prefix = format!("{prefix}/");
        let iter = self.db.scan_prefix(&scan_prefix);
        let mut entries = iter
            .map(|r| {
                r.map(|(k, v)| Entry {
                    key: String::from_utf8_lossy(&k).into_owned(),
                    value: ivec_to_string(&v),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if order == SortOrder::Descend {
            entries.reverse();
        }
        Ok(entries)
    }

    /// Half-open range `[first, last)`, ascending.
    pub fn list_range(&self, first: &str, last: &str) -> Result<Vec<Entry>, Error> {
        let entries = self
            .db
            .range(first.to_string()..last.to_string())
            .map(|r| {
                r.map(|(k, v)| Entry {
                    key: String::from_utf8_lossy(&k).into_owned(),
                    value: ivec_to_string(&v),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if entries.is_empty() {
            return Err(Error::NotFound);
        }
        Ok(entries)
    }

    pub fn put(&self, key: &str, value: &str) -> Result<(), Error> {
        self.db.insert(key, value.as_bytes())?;
        Ok(())
    }

    /// Creates a key that does not already exist. Used where the original
    /// distinguishes a first write (`Create`) from later overwrites
    /// (`Put`).
    pub fn create(&self, key: &str, value: &str) -> Result<(), Error> {
        let prev = self
            .db
            .compare_and_swap(key, None::<&[u8]>, Some(value.as_bytes()))?;
        prev.map_err(|_| Error::AlreadyExists)
    }

    pub fn delete(&self, key: &str) -> Result<(), Error> {
        self.db.remove(key)?;
        Ok(())
    }

    /// Assigns the smallest unused zero-padded sequential suffix under
    /// `prefix`, via a compare-and-swap retry loop, and returns the full
    /// key that was created. Used for offset assignment: two concurrent
    /// producers racing for the same offset never both win.
    pub fn create_sequential(&self, prefix: &str, value: &str) -> Result<String, Error> {
        loop {
            let next = match self.get_last(prefix)? {
                Some(entry) => last_sequence_component(&entry.key)? + 1,
                None => 0,
            };
            let key = format!("{prefix}/{next:020}");
            match self
                .db
                .compare_and_swap(key.as_bytes(), None::<&[u8]>, Some(value.as_bytes()))?
            {
                Ok(()) => return Ok(key),
                Err(_) => continue,
            }
        }
    }

    pub fn txn(&self, ops: Vec<TxnOp>) -> Result<(), Error> {
        self.db
            .transaction(move |tx| {
                for op in &ops {
                    match op {
                        TxnOp::Put(k, v) => {
                            tx.insert(k.as_bytes(), v.as_bytes())?;
                        }
                        TxnOp::Delete(k) => {
                            tx.remove(k.as_bytes())?;
                        }
                    }
                }
                Ok(())
            })
            .map_err(|e: sled::transaction::TransactionError<()>| match e {
                sled::transaction::TransactionError::Storage(e) => Error::Store(e),
                sled::transaction::TransactionError::Abort(()) => Error::Store(
                    sled::Error::Unsupported("transaction aborted".to_string()),
                ),
            })
    }

    /// Streams every create/update/delete under `prefix`, in commit order.
    /// The stream never ends on its own; dropping it unsubscribes.
    pub fn watch(&self, prefix: &str) -> impl Stream<Item = WatchEvent> {
        let mut subscriber = self.db.watch_prefix(prefix.to_string());
        stream! {
            while let Some(event) = (&mut subscriber).await {
                match event {
                    sled::Event::Insert { key, value } => {
                        yield WatchEvent::Update(Entry {
                            key: String::from_utf8_lossy(&key).into_owned(),
                            value: ivec_to_string(&value),
                        });
                    }
                    sled::Event::Remove { key } => {
                        yield WatchEvent::Delete {
                            key: String::from_utf8_lossy(&key).into_owned(),
                        };
                    }
                }
            }
        }
    }
}

fn ivec_to_string(v: &sled::IVec) -> String {
    String::from_utf8_lossy(v).into_owned()
}

fn last_sequence_component(key: &str) -> Result<i64, Error> {
    key.rsplit('/')
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(Error::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn put_then_get() {
        let store = MetaStore::temporary().unwrap();
        store.put("/topics/events", "1").unwrap();
        assert_eq!(
            store.get("/topics/events").unwrap().unwrap().value,
            "1"
        );
    }

    #[test]
    fn create_rejects_existing_key() {
        let store = MetaStore::temporary().unwrap();
        store.create("/topics/events", "1").unwrap();
        assert!(matches!(
            store.create("/topics/events", "2"),
            Err(Error::AlreadyExists)
        ));
    }

    #[test]
    fn list_and_count_scoped_to_prefix() {
        let store = MetaStore::temporary().unwrap();
        store.put("/queues/events/0/00000000000000000000", "a").unwrap();
        store.put("/queues/events/0/00000000000000000001", "b").unwrap();
        store.put("/queues/other/0/00000000000000000000", "c").unwrap();

        assert_eq!(store.count("/queues/events/0").unwrap(), 2);
        let entries = store.list("/queues/events/0", SortOrder::Ascend).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].value, "a");
    }

    #[test]
    fn get_first_and_last() {
        let store = MetaStore::temporary().unwrap();
        store.put("/queues/events/0/00000000000000000000", "a").unwrap();
        store.put("/queues/events/0/00000000000000000005", "b").unwrap();

        assert_eq!(store.get_first("/queues/events/0").unwrap().unwrap().value, "a");
        assert_eq!(store.get_last("/queues/events/0").unwrap().unwrap().value, "b");
    }

    #[test]
    fn create_sequential_assigns_increasing_offsets() {
        let store = MetaStore::temporary().unwrap();
        let first = store.create_sequential("/queues/events/0", "a").unwrap();
        let second = store.create_sequential("/queues/events/0", "b").unwrap();
        assert_eq!(first, "/queues/events/0/00000000000000000000");
        assert_eq!(second, "/queues/events/0/00000000000000000001");
    }

    #[test]
    fn txn_applies_atomically() {
        let store = MetaStore::temporary().unwrap();
        store
            .txn(vec![
                TxnOp::Put("/refs/a".to_string(), "1".to_string()),
                TxnOp::Put("/refs/b".to_string(), "1".to_string()),
            ])
            .unwrap();
        assert!(store.get("/refs/a").unwrap().is_some());
        assert!(store.get("/refs/b").unwrap().is_some());
    }

    #[tokio::test]
    async fn watch_observes_puts() {
        let store = MetaStore::temporary().unwrap();
        let mut events = Box::pin(store.watch("/topics"));
        store.put("/topics/events", "1").unwrap();

        let event = events.next().await.unwrap();
        assert_eq!(
            event,
            WatchEvent::Update(Entry {
                key: "/topics/events".to_string(),
                value: "1".to_string(),
            })
        );
    }
}
