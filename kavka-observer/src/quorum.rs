//! Write-concern quorum waiting.
//!
//! The ingest path needs to block until a blob has been advertised by
//! enough distinct replication groups to satisfy the configured write
//! concern. The original expresses this as a watch handler that counts
//! distinct groups and closes a `sync.WaitGroup` once the threshold is
//! met; here it is a typed abstraction so callers never touch the
//! underlying watch stream directly.

use crate::{Handler, Observer};
use async_trait::async_trait;
use kavka_digest::Digest;
use kavka_meta::keys::BlobKey;
use kavka_meta::WatchEvent;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

struct QuorumState {
    digest: Digest,
    required: usize,
    seen: Mutex<HashSet<String>>,
    notify: Notify,
    satisfied: AtomicBool,
}

#[async_trait]
impl Handler for QuorumState {
    async fn handle(&self, event: &WatchEvent) {
        let entry = match event {
            WatchEvent::Create(entry) | WatchEvent::Update(entry) => entry,
            WatchEvent::Delete { .. } => return,
        };

        let Ok(key) = entry.key.parse::<BlobKey>() else {
            return;
        };
        if key.digest.as_ref() != Some(&self.digest) || key.group.is_empty() {
            return;
        }

        let mut seen = self.seen.lock().await;
        seen.insert(key.group.clone());
        if seen.len() >= self.required {
            self.satisfied.store(true, Ordering::Release);
            self.notify.notify_waiters();
        }
    }
}

/// Tracks blob advertisements for in-flight ingest calls.
pub struct QuorumWaiter {
    observer: Arc<Observer>,
}

impl QuorumWaiter {
    pub fn new(observer: Arc<Observer>) -> Self {
        Self { observer }
    }

    /// Starts tracking advertisements of `digest`, resolving the returned
    /// handle once `required` distinct groups have advertised it. A
    /// `required` of zero or one resolves as soon as this node's own
    /// advertisement (the write-path always advertises locally first)
    /// lands, same as the rest.
    pub async fn register(&self, digest: Digest, required: usize) -> QuorumHandle {
        let state = Arc::new(QuorumState {
            digest,
            required,
            seen: Mutex::new(HashSet::new()),
            notify: Notify::new(),
            satisfied: AtomicBool::new(false),
        });

        if state.required == 0 {
            state.satisfied.store(true, Ordering::Release);
        }

        let id = self.observer.register_handler(state.clone()).await;

        QuorumHandle {
            observer: self.observer.clone(),
            handler_id: id,
            state,
        }
    }
}

pub struct QuorumHandle {
    observer: Arc<Observer>,
    handler_id: Uuid,
    state: Arc<QuorumState>,
}

impl QuorumHandle {
    /// Waits until enough groups have advertised the digest.
    pub async fn wait(self) {
        let notified = self.state.notify.notified();
        if !self.state.satisfied.load(Ordering::Acquire) {
            notified.await;
        }
        self.observer.unregister_handler(self.handler_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kavka_meta::MetaStore;
    use std::time::Duration;

    #[tokio::test]
    async fn resolves_once_required_groups_advertise() {
        let store = MetaStore::temporary().unwrap();
        let observer = Arc::new(Observer::new(store.clone()));
        let join = observer.clone().spawn("/blobs");

        let waiter = QuorumWaiter::new(observer.clone());
        let digest = kavka_digest::hash(b"hello");
        let handle = waiter.register(digest.clone(), 2).await;

        let key_a = BlobKey::with_group(digest.clone(), "a");
        let key_b = BlobKey::with_group(digest.clone(), "b");
        store.put(&key_a.to_string(), "1").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.put(&key_b.to_string(), "1").unwrap();

        tokio::time::timeout(Duration::from_millis(200), handle.wait())
            .await
            .expect("quorum handle should resolve once two distinct groups advertised");

        join.abort();
    }

    #[tokio::test]
    async fn zero_required_resolves_immediately() {
        let store = MetaStore::temporary().unwrap();
        let observer = Arc::new(Observer::new(store));
        let waiter = QuorumWaiter::new(observer);
        let digest = kavka_digest::hash(b"hello");
        let handle = waiter.register(digest, 0).await;

        tokio::time::timeout(Duration::from_millis(50), handle.wait())
            .await
            .expect("zero-group quorum should resolve immediately");
    }

    #[tokio::test]
    async fn repeated_advertisement_from_same_group_does_not_count_twice() {
        let store = MetaStore::temporary().unwrap();
        let observer = Arc::new(Observer::new(store.clone()));
        let join = observer.clone().spawn("/blobs");

        let waiter = QuorumWaiter::new(observer.clone());
        let digest = kavka_digest::hash(b"hello");
        let handle = waiter.register(digest.clone(), 2).await;

        let key_a = BlobKey::with_group(digest.clone(), "a");
        store.put(&key_a.to_string(), "1").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        store.put(&key_a.to_string(), "2").unwrap();

        let result = tokio::time::timeout(Duration::from_millis(100), handle.wait()).await;
        assert!(result.is_err(), "single group re-advertising must not satisfy a two-group quorum");

        join.abort();
    }
}
