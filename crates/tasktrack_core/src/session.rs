//! Tracker session: composition root of the sync engine.
//!
//! # Responsibility
//! - Own the current identity, its live feed, the collapse set and the
//!   transient write-failure signal.
//! - Route user intents to mutation operations using the most recently
//!   emitted copy of each task.
//!
//! # Invariants
//! - At most one feed exists at a time; an identity change closes the old
//!   feed before subscribing the new one.
//! - The collapse set is empty at session start and after every identity
//!   change.
//! - Mutations never touch the held task list; only `pump` replaces it.

use crate::feed::LiveTaskFeed;
use crate::model::task::{OwnerId, Task, TaskId};
use crate::mutation::{self, Dispatch, Rejection, WriteFailure};
use crate::reconcile::{render, TaskRow};
use crate::store::{StoreResult, TaskStore};
use crate::view_state::CollapseSet;
use log::{info, warn};
use std::sync::Arc;

/// One user-facing tracker session over a shared store.
pub struct TrackerSession<S: TaskStore + ?Sized> {
    store: Arc<S>,
    identity: Option<OwnerId>,
    feed: Option<LiveTaskFeed<S>>,
    collapsed: CollapseSet,
    last_failure: Option<WriteFailure>,
}

impl<S: TaskStore + ?Sized> TrackerSession<S> {
    /// Creates a signed-out session.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            identity: None,
            feed: None,
            collapsed: CollapseSet::new(),
            last_failure: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn identity(&self) -> Option<&OwnerId> {
        self.identity.as_ref()
    }

    /// Reacts to an identity transition.
    ///
    /// Setting the same identity again is a no-op while its feed is live.
    /// Any other transition tears the current feed down, resets view state
    /// and, for a non-null identity, subscribes a new feed.
    ///
    /// # Errors
    /// Returns the store error when the new subscription cannot be
    /// established; the session is then left signed in without a feed and
    /// the next call with the same identity subscribes again.
    pub fn set_identity(&mut self, identity: Option<OwnerId>) -> StoreResult<()> {
        if self.identity == identity && (identity.is_none() || self.has_feed()) {
            return Ok(());
        }

        if let Some(mut feed) = self.feed.take() {
            feed.close();
        }
        self.collapsed.clear();
        self.last_failure = None;
        self.identity = identity;
        info!(
            "event=identity_change module=session status=ok signed_in={}",
            self.identity.is_some()
        );

        match LiveTaskFeed::subscribe(Arc::clone(&self.store), self.identity.as_ref()) {
            Ok(feed) => {
                self.feed = feed;
                Ok(())
            }
            Err(err) => {
                warn!("event=identity_change module=session status=error error={err}");
                Err(err)
            }
        }
    }

    pub fn sign_out(&mut self) {
        // Signing out never subscribes, so it cannot fail.
        let _ = self.set_identity(None);
    }

    /// Applies pending feed emissions; returns how many were applied.
    pub fn pump(&mut self) -> usize {
        self.feed.as_mut().map_or(0, LiveTaskFeed::poll)
    }

    /// Task list from the most recent feed emission.
    pub fn tasks(&self) -> &[Task] {
        self.feed.as_ref().map(|feed| feed.tasks()).unwrap_or(&[])
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.feed.as_ref().and_then(|feed| feed.task(id))
    }

    pub fn has_feed(&self) -> bool {
        self.feed.as_ref().is_some_and(LiveTaskFeed::is_active)
    }

    pub fn collapse_set(&self) -> &CollapseSet {
        &self.collapsed
    }

    /// Flips the collapsed state of `id`; returns whether it is now collapsed.
    pub fn toggle_collapse(&mut self, id: TaskId) -> bool {
        self.collapsed.toggle(id)
    }

    /// Render rows for the current list and collapse set.
    pub fn render(&self) -> Vec<TaskRow> {
        render(self.tasks(), &self.collapsed)
    }

    /// Most recent unacknowledged write failure.
    pub fn last_write_failure(&self) -> Option<&WriteFailure> {
        self.last_failure.as_ref()
    }

    /// Acknowledges and returns the most recent write failure.
    pub fn take_write_failure(&mut self) -> Option<WriteFailure> {
        self.last_failure.take()
    }

    pub fn create_task(&mut self, label: &str) -> Dispatch {
        let dispatch = mutation::create_task(self.store.as_ref(), self.identity.as_ref(), label);
        self.record(dispatch)
    }

    pub fn toggle_task(&mut self, id: TaskId) -> Dispatch {
        let dispatch = match self.task(id) {
            Some(task) => mutation::toggle_task(self.store.as_ref(), self.identity.as_ref(), task),
            None => Dispatch::Rejected(Rejection::UnknownTask(id)),
        };
        self.record(dispatch)
    }

    pub fn delete_task(&mut self, id: TaskId) -> Dispatch {
        let dispatch = if self.task(id).is_some() {
            mutation::delete_task(self.store.as_ref(), self.identity.as_ref(), id)
        } else {
            Dispatch::Rejected(Rejection::UnknownTask(id))
        };
        self.record(dispatch)
    }

    pub fn add_subtask(&mut self, id: TaskId, label: &str) -> Dispatch {
        let dispatch = match self.task(id) {
            Some(task) => {
                mutation::add_subtask(self.store.as_ref(), self.identity.as_ref(), task, label)
            }
            None => Dispatch::Rejected(Rejection::UnknownTask(id)),
        };
        self.record(dispatch)
    }

    pub fn toggle_subtask(&mut self, id: TaskId, index: usize) -> Dispatch {
        let dispatch = match self.task(id) {
            Some(task) => {
                mutation::toggle_subtask(self.store.as_ref(), self.identity.as_ref(), task, index)
            }
            None => Dispatch::Rejected(Rejection::UnknownTask(id)),
        };
        self.record(dispatch)
    }

    fn record(&mut self, dispatch: Dispatch) -> Dispatch {
        if let Dispatch::Failed(failure) = &dispatch {
            self.last_failure = Some(failure.clone());
        }
        dispatch
    }
}
