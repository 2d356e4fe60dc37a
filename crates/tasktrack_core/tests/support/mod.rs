#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tasktrack_core::{
    OwnerId, SqliteTaskStore, StoreError, StoreResult, Subscription, SubscriptionId, TaskDocument,
    TaskId, TaskPatch, TaskStore,
};

pub fn owner(raw: &str) -> OwnerId {
    OwnerId::parse(raw).unwrap()
}

/// Store double that delegates to SQLite, counts calls, and can refuse
/// writes or the next subscription on demand.
pub struct FlakyStore {
    inner: SqliteTaskStore,
    offline: AtomicBool,
    reject_next_subscribe: AtomicBool,
    pub subscribes: AtomicUsize,
    pub unsubscribes: AtomicUsize,
    pub writes: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteTaskStore::open_in_memory().unwrap(),
            offline: AtomicBool::new(false),
            reject_next_subscribe: AtomicBool::new(false),
            subscribes: AtomicUsize::new(0),
            unsubscribes: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes exactly one upcoming `subscribe` call fail.
    pub fn reject_next_subscribe(&self) {
        self.reject_next_subscribe.store(true, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &SqliteTaskStore {
        &self.inner
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("network offline".to_string()));
        }
        Ok(())
    }
}

impl TaskStore for FlakyStore {
    fn subscribe(&self, owner: &OwnerId) -> StoreResult<Subscription> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        if self.reject_next_subscribe.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("listener refused".to_string()));
        }
        self.inner.subscribe(owner)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        self.inner.unsubscribe(id)
    }

    fn insert(&self, document: &TaskDocument) -> StoreResult<TaskId> {
        self.check_online()?;
        self.inner.insert(document)
    }

    fn update(&self, id: TaskId, patch: &TaskPatch) -> StoreResult<()> {
        self.check_online()?;
        self.inner.update(id, patch)
    }

    fn remove(&self, id: TaskId) -> StoreResult<()> {
        self.check_online()?;
        self.inner.remove(id)
    }

    fn refresh(&self) -> StoreResult<usize> {
        self.inner.refresh()
    }
}
