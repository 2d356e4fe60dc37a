//! Remote document store boundary.
//!
//! # Responsibility
//! - Define the subscribe/mutate contract the sync engine expects from the
//!   per-user task collection.
//! - Ship a SQLite-backed implementation for local use and tests.
//!
//! # Invariants
//! - A subscription delivers full snapshots only, never diffs.
//! - The first snapshot is delivered as soon as the subscription exists.
//! - `update` replaces only the fields present in the patch.
//! - `remove` of a missing id is a successful no-op.
//! - `refresh` never emits for writes made through the same store handle.

use crate::db::DbError;
use crate::model::task::{OwnerId, TaskDocument, TaskId, TaskPatch, TaskValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::Receiver;

pub mod sqlite_store;

pub use sqlite_store::SqliteTaskStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-side error for document reads, writes and subscriptions.
#[derive(Debug)]
pub enum StoreError {
    Validation(TaskValidationError),
    Db(DbError),
    NotFound(TaskId),
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Store is not reachable (poisoned lock, closed transport, injected fault).
    Unavailable(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted task data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "task store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "task store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "task store requires column `{column}` in table `{table}`"
            ),
            Self::Unavailable(message) => write!(f, "task store unavailable: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for StoreError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Handle id of one standing subscription.
pub type SubscriptionId = u64;

/// One stored document together with its store-assigned id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTask {
    pub id: TaskId,
    pub document: TaskDocument,
}

/// Complete document set for one owner at one point in time.
///
/// Documents are in the store's native delivery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub documents: Vec<StoredTask>,
}

/// Standing subscription returned by [`TaskStore::subscribe`].
///
/// The receiver yields one [`Snapshot`] per change affecting the owner.
/// Dropping the receiver alone does not release the store-side handle;
/// callers tear down through [`TaskStore::unsubscribe`].
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub owner: OwnerId,
    pub receiver: Receiver<Snapshot>,
}

/// Subscribe/mutate contract over a per-user task collection.
pub trait TaskStore {
    /// Establishes a live subscription filtered on `owner`.
    fn subscribe(&self, owner: &OwnerId) -> StoreResult<Subscription>;
    /// Releases a subscription. Returns `false` when it was already released.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
    /// Inserts a new document and returns the store-assigned id.
    fn insert(&self, document: &TaskDocument) -> StoreResult<TaskId>;
    /// Replaces the fields present in `patch`.
    fn update(&self, id: TaskId, patch: &TaskPatch) -> StoreResult<()>;
    /// Removes one document.
    fn remove(&self, id: TaskId) -> StoreResult<()>;
    /// Re-emits snapshots for changes committed outside this store handle.
    ///
    /// Returns the number of owners that were re-notified. Stores with a
    /// single writer have nothing to pick up.
    fn refresh(&self) -> StoreResult<usize> {
        Ok(0)
    }
}
