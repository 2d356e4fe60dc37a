//! Live task feed for one identity.
//!
//! # Responsibility
//! - Hold exactly one store subscription for the current identity.
//! - Materialize every store snapshot into a complete task list.
//!
//! # Invariants
//! - Every emission replaces the held list in full; nothing is merged.
//! - List order is the store's delivery order.
//! - Teardown happens exactly once per subscription, on `close` or drop.

use crate::model::task::{OwnerId, Task, TaskId};
use crate::store::{Snapshot, StoreResult, Subscription, TaskStore};
use log::{debug, info, warn};
use std::sync::mpsc::TryRecvError;
use std::sync::Arc;

/// Standing subscription to one owner's task set.
pub struct LiveTaskFeed<S: TaskStore + ?Sized> {
    store: Arc<S>,
    owner: OwnerId,
    subscription: Option<Subscription>,
    tasks: Vec<Task>,
    emissions: u64,
}

impl<S: TaskStore + ?Sized> LiveTaskFeed<S> {
    /// Establishes the feed for `identity`.
    ///
    /// Returns `Ok(None)` without touching the store when there is no
    /// identity.
    pub fn subscribe(store: Arc<S>, identity: Option<&OwnerId>) -> StoreResult<Option<Self>> {
        let Some(owner) = identity else {
            debug!("event=feed_subscribe module=feed status=skipped reason=no_identity");
            return Ok(None);
        };

        let subscription = store.subscribe(owner)?;
        info!(
            "event=feed_subscribe module=feed status=ok subscription_id={}",
            subscription.id
        );
        Ok(Some(Self {
            store,
            owner: owner.clone(),
            subscription: Some(subscription),
            tasks: Vec::new(),
            emissions: 0,
        }))
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Task list from the most recent emission.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Looks up a task in the most recent emission.
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Number of emissions applied since subscribing.
    pub fn emission_count(&self) -> u64 {
        self.emissions
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    /// Applies every pending store snapshot, in arrival order.
    ///
    /// Asks the store to pick up commits made through other handles first.
    /// Returns the number of emissions applied. A closed feed applies none.
    /// If the store drops its side of the channel the feed closes itself.
    pub fn poll(&mut self) -> usize {
        if self.subscription.is_some() {
            if let Err(err) = self.store.refresh() {
                warn!("event=feed_poll module=feed status=error error_code=refresh_failed error={err}");
            }
        }

        let mut applied = 0;
        loop {
            let next = match &self.subscription {
                Some(subscription) => subscription.receiver.try_recv(),
                None => return applied,
            };
            match next {
                Ok(snapshot) => {
                    self.apply(snapshot);
                    applied += 1;
                }
                Err(TryRecvError::Empty) => return applied,
                Err(TryRecvError::Disconnected) => {
                    warn!("event=feed_poll module=feed status=error error_code=store_disconnected");
                    self.close();
                    return applied;
                }
            }
        }
    }

    /// Tears the subscription down.
    ///
    /// Returns `true` only for the call that actually released it.
    pub fn close(&mut self) -> bool {
        let Some(subscription) = self.subscription.take() else {
            return false;
        };
        self.store.unsubscribe(subscription.id);
        info!(
            "event=feed_close module=feed status=ok subscription_id={} emissions={}",
            subscription.id, self.emissions
        );
        true
    }

    fn apply(&mut self, snapshot: Snapshot) {
        let delivered = snapshot.documents.len();
        self.tasks = snapshot
            .documents
            .into_iter()
            .filter(|stored| stored.document.owner == self.owner)
            .map(|stored| Task::from_document(stored.id, stored.document))
            .collect();
        self.emissions += 1;

        let foreign = delivered - self.tasks.len();
        if foreign > 0 {
            warn!("event=feed_emit module=feed status=filtered foreign_documents={foreign}");
        }
        debug!(
            "event=feed_emit module=feed status=ok tasks={} emission={}",
            self.tasks.len(),
            self.emissions
        );
    }
}

impl<S: TaskStore + ?Sized> Drop for LiveTaskFeed<S> {
    fn drop(&mut self) {
        self.close();
    }
}
