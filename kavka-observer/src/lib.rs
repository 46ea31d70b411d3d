//! A single long-lived watch, multiplexed out to many in-process
//! handlers.
//!
//! [`Observer`] owns the one watch stream against a metadata prefix and
//! fans each event out to every registered [`Handler`]. The delivery
//! contract is strict: every handler registered at the time an event is
//! dequeued runs to completion before the next event is dequeued. A slow
//! handler holds up the others for that event, and holds up the next
//! event for everyone -- this mirrors the original's `sync.WaitGroup`
//! fan-out, just with `futures::future::join_all` standing in for it.

pub mod quorum;

use async_trait::async_trait;
use futures::StreamExt;
use kavka_meta::{MetaStore, WatchEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, event: &WatchEvent);
}

type HandlerMap = Arc<RwLock<HashMap<Uuid, Arc<dyn Handler>>>>;

#[derive(Clone)]
pub struct Observer {
    store: MetaStore,
    handlers: HandlerMap,
}

impl Observer {
    pub fn new(store: MetaStore) -> Self {
        Self {
            store,
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register_handler(&self, handler: Arc<dyn Handler>) -> Uuid {
        let id = Uuid::new_v4();
        self.handlers.write().await.insert(id, handler);
        id
    }

    pub async fn unregister_handler(&self, id: Uuid) {
        self.handlers.write().await.remove(&id);
    }

    /// Runs the watch loop over `prefix` until the underlying stream ends.
    /// Intended to be spawned as a background task; reconnecting on
    /// stream end is the caller's responsibility (mirrors the original's
    /// outer `for {}` retry loop, just pushed up a layer since this crate
    /// has no notion of a restartable connection on its own).
    pub async fn run(self: Arc<Self>, prefix: String) {
        let mut events = Box::pin(self.store.watch(&prefix));

        while let Some(event) = events.next().await {
            let snapshot: Vec<Arc<dyn Handler>> =
                self.handlers.read().await.values().cloned().collect();

            debug!(handlers = snapshot.len(), prefix = %prefix, "dispatching watch event");

            futures::future::join_all(
                snapshot.iter().map(|handler| handler.handle(&event)),
            )
            .await;
        }

        warn!(prefix = %prefix, "observer watch stream ended");
    }

    /// Spawns [`Observer::run`] on the current Tokio runtime.
    pub fn spawn(self: Arc<Self>, prefix: impl Into<String>) -> JoinHandle<()> {
        let prefix = prefix.into();
        tokio::spawn(async move { self.run(prefix).await })
    }
}

/// A single handler's registration lifetime, as a value. Registering
/// twice without stopping first is a no-op; stopping twice is a no-op.
pub struct Filter {
    observer: Arc<Observer>,
    handler: Arc<dyn Handler>,
    id: Mutex<Option<Uuid>>,
}

impl Filter {
    pub fn new(observer: Arc<Observer>, handler: Arc<dyn Handler>) -> Self {
        Self {
            observer,
            handler,
            id: Mutex::new(None),
        }
    }

    pub async fn start(&self) {
        let mut id = self.id.lock().await;
        if id.is_some() {
            return;
        }
        *id = Some(self.observer.register_handler(self.handler.clone()).await);
    }

    pub async fn stop(&self) {
        let mut id = self.id.lock().await;
        if let Some(handler_id) = id.take() {
            self.observer.unregister_handler(handler_id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kavka_meta::Entry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl Handler for CountingHandler {
        async fn handle(&self, _event: &WatchEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn dispatches_to_registered_handlers() {
        let store = MetaStore::temporary().unwrap();
        let observer = Arc::new(Observer::new(store.clone()));
        let count = Arc::new(AtomicUsize::new(0));

        let filter = Filter::new(observer.clone(), Arc::new(CountingHandler(count.clone())));
        filter.start().await;

        let join = observer.clone().spawn("/topics");
        store.put("/topics/events", "1").unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        filter.stop().await;
        store.put("/topics/other", "1").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        join.abort();
    }

    #[test]
    fn entry_equality_smoke() {
        assert_eq!(
            Entry {
                key: "a".into(),
                value: "b".into()
            },
            Entry {
                key: "a".into(),
                value: "b".into()
            }
        );
    }
}
