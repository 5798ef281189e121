//! Debounced snapshot writes, keyed by session id.
//!
//! Each `schedule` replaces the pending write of that session and restarts its
//! delay. A pending write only ever targets the session it was scheduled for.

use std::{
    hash::Hasher,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use futures::future;
use twox_hash::XxHash3_64;

use crate::{graph::GraphSnapshot, session::SessionStore, storage::KeyValueStore};

#[derive(Debug)]
struct Pending {
    generation: u64,
    snapshot: GraphSnapshot,
}

#[derive(Debug)]
struct Inner<S> {
    store: Arc<SessionStore<S>>,
    delay: Duration,
    next_generation: AtomicU64,
    pending: DashMap<String, Pending>,
    /// Fingerprint of the last snapshot written per session.
    written: DashMap<String, u64>,
}

#[derive(Debug)]
pub struct Autosave<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for Autosave<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: KeyValueStore> Autosave<S> {
    /// Debounce with the store's configured delay.
    pub fn new(store: Arc<SessionStore<S>>) -> Self {
        let delay = store.config().debounce();
        Self::with_delay(store, delay)
    }

    pub fn with_delay(store: Arc<SessionStore<S>>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                delay,
                next_generation: AtomicU64::new(0),
                pending: DashMap::new(),
                written: DashMap::new(),
            }),
        }
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Write `snapshot` into session `session_id` once no newer schedule for that
    /// session arrives within the delay. Must be called inside a tokio runtime.
    pub fn schedule(&self, session_id: &str, snapshot: GraphSnapshot) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        self.inner.pending.insert(
            session_id.to_owned(),
            Pending {
                generation,
                snapshot,
            },
        );

        let inner = Arc::clone(&self.inner);
        let session_id = session_id.to_owned();
        tokio::spawn(async move {
            tokio::time::sleep(inner.delay).await;
            let latest = inner
                .pending
                .remove_if(&session_id, |_, pending| pending.generation == generation);
            if let Some((_, pending)) = latest {
                inner.write(&session_id, pending.snapshot).await;
            }
        });
    }

    /// Write the pending snapshot of `session_id` now. Returns whether there was one.
    pub async fn flush(&self, session_id: &str) -> bool {
        match self.inner.pending.remove(session_id) {
            Some((_, pending)) => {
                self.inner.write(session_id, pending.snapshot).await;
                true
            }
            None => false,
        }
    }

    pub async fn flush_all(&self) {
        let ids = self
            .inner
            .pending
            .iter()
            .map(|entry| entry.key().clone())
            .collect::<Vec<_>>();
        future::join_all(ids.iter().map(|id| self.flush(id))).await;
    }

    /// Drop the pending snapshot of `session_id` without writing it.
    pub fn cancel(&self, session_id: &str) -> bool {
        self.inner.written.remove(session_id);
        self.inner.pending.remove(session_id).is_some()
    }

    pub fn is_pending(&self, session_id: &str) -> bool {
        self.inner.pending.contains_key(session_id)
    }
}

impl<S: KeyValueStore> Inner<S> {
    async fn write(&self, session_id: &str, snapshot: GraphSnapshot) {
        let fingerprint = match serde_json::to_vec(&snapshot) {
            Ok(bytes) => {
                let mut hasher = XxHash3_64::default();
                hasher.write(&bytes);
                hasher.finish()
            }
            Err(e) => {
                tracing::error!("| autosave | Session: {session_id} | Error: {e}");
                return;
            }
        };
        if self
            .written
            .get(session_id)
            .is_some_and(|last| *last == fingerprint)
        {
            tracing::trace!("| autosave | Session: {session_id} | unchanged, skipped");
            return;
        }

        if self
            .store
            .update_workflow_config(session_id, Some(snapshot))
            .await
        {
            self.written.insert(session_id.to_owned(), fingerprint);
            tracing::debug!("| autosave | Session: {session_id} | snapshot saved");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::{
        config::StoreConfig,
        editor::FlowEditor,
        session::SESSIONS_KEY,
        storage::{MemoryStore, StorageError},
    };

    /// Counts writes of the session list.
    #[derive(Debug, Default)]
    struct CountingStore {
        inner: MemoryStore,
        writes: AtomicUsize,
    }

    impl KeyValueStore for CountingStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
            if key == SESSIONS_KEY {
                self.writes.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.set(key, value).await
        }
    }

    async fn setup() -> (Arc<SessionStore<CountingStore>>, Autosave<CountingStore>) {
        let store = Arc::new(
            SessionStore::open(CountingStore::default(), StoreConfig::default()).await,
        );
        let autosave = Autosave::new(Arc::clone(&store));
        (store, autosave)
    }

    fn writes(store: &SessionStore<CountingStore>) -> usize {
        store.storage().writes.load(Ordering::SeqCst)
    }

    fn example_snapshot(user_input: &str) -> GraphSnapshot {
        let mut editor = FlowEditor::new();
        editor.load_example();
        editor.set_user_input(user_input);
        editor.snapshot()
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_schedules_coalesce() {
        let (store, autosave) = setup().await;
        let id = store.current_id().await;
        let before = writes(&store);

        for text in ["h", "he", "hel", "hell", "hello"] {
            autosave.schedule(&id, example_snapshot(text));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(writes(&store), before);
        assert!(autosave.is_pending(&id));

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(writes(&store), before + 1);
        assert!(!autosave.is_pending(&id));

        let saved = store.session(&id).await.unwrap().workflow_config.unwrap();
        assert_eq!(saved, example_snapshot("hello"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_snapshot_is_skipped() {
        let (store, autosave) = setup().await;
        let id = store.current_id().await;
        let before = writes(&store);

        autosave.schedule(&id, example_snapshot("same"));
        assert!(autosave.flush(&id).await);
        autosave.schedule(&id, example_snapshot("same"));
        assert!(autosave.flush(&id).await);

        assert_eq!(writes(&store), before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_now_and_timer_does_not_repeat() {
        let (store, autosave) = setup().await;
        let id = store.current_id().await;
        let before = writes(&store);

        autosave.schedule(&id, example_snapshot("x"));
        assert!(autosave.flush(&id).await);
        assert_eq!(writes(&store), before + 1);
        assert!(!autosave.flush(&id).await);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(writes(&store), before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_write() {
        let (store, autosave) = setup().await;
        let id = store.current_id().await;

        autosave.schedule(&id, example_snapshot("x"));
        assert!(autosave.cancel(&id));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(store.session(&id).await.unwrap().workflow_config.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_debounce_independently() {
        let (store, autosave) = setup().await;
        let first = store.current_id().await;
        let second = store.create(None).await.id;

        autosave.schedule(&first, example_snapshot("one"));
        autosave.schedule(&second, example_snapshot("two"));
        autosave.flush_all().await;

        let first = store.session(&first).await.unwrap().workflow_config.unwrap();
        let second = store.session(&second).await.unwrap().workflow_config.unwrap();
        assert_eq!(first, example_snapshot("one"));
        assert_eq!(second, example_snapshot("two"));
    }
}
