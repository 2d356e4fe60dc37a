//! Core sync engine for TaskTrack.
//! This crate is the single source of truth for task/subtask invariants.

pub mod db;
pub mod feed;
pub mod logging;
pub mod model;
pub mod mutation;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod view_state;

pub use feed::LiveTaskFeed;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::task::{
    OwnerId, Subtask, Task, TaskDocument, TaskId, TaskPatch, TaskValidationError,
    DEFAULT_CATEGORY,
};
pub use mutation::{Dispatch, MutationKind, Rejection, WriteFailure};
pub use reconcile::{render, SubtaskRow, TaskRow};
pub use session::TrackerSession;
pub use store::{
    Snapshot, SqliteTaskStore, StoreError, StoreResult, StoredTask, Subscription,
    SubscriptionId, TaskStore,
};
pub use view_state::CollapseSet;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
