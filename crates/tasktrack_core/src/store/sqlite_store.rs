//! SQLite-backed task document store with live snapshot subscriptions.
//!
//! # Responsibility
//! - Persist task documents in the `tasks` table.
//! - Fan out full per-owner snapshots to subscribers after every write.
//!
//! # Invariants
//! - Write paths validate documents/patches before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Delivery order is insertion order (`seq ASC`).
//! - A write and its snapshot fan-out run under one connection lock, so a
//!   subscriber never observes snapshots out of write order.
//! - Commits from other connections on the same file are picked up by
//!   `refresh` through `PRAGMA data_version`.

use crate::db::migrations::latest_version;
use crate::db::{open_db, open_db_in_memory};
use crate::model::task::{OwnerId, Subtask, TaskDocument, TaskId, TaskPatch};
use crate::store::{
    Snapshot, StoreError, StoreResult, StoredTask, Subscription, SubscriptionId, TaskStore,
};
use log::{debug, error};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    id,
    owner,
    text,
    done,
    subtasks,
    category,
    time
FROM tasks";

const REQUIRED_COLUMNS: [&str; 10] = [
    "seq",
    "id",
    "owner",
    "text",
    "done",
    "subtasks",
    "category",
    "time",
    "created_at",
    "updated_at",
];

struct Subscriber {
    owner: OwnerId,
    sender: Sender<Snapshot>,
}

#[derive(Default)]
struct SubscriberRegistry {
    next_id: SubscriptionId,
    entries: BTreeMap<SubscriptionId, Subscriber>,
}

/// SQLite-backed implementation of [`TaskStore`].
pub struct SqliteTaskStore {
    conn: Mutex<Connection>,
    subscribers: Mutex<SubscriberRegistry>,
    /// Last observed `PRAGMA data_version` of `conn`.
    data_version: AtomicI64,
    path: Option<PathBuf>,
}

impl SqliteTaskStore {
    /// Wraps an already migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when the schema version does not match.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` for partial schemas.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        ensure_store_connection_ready(&conn)?;
        let data_version = read_data_version(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            subscribers: Mutex::new(SubscriberRegistry::default()),
            data_version: AtomicI64::new(data_version),
            path: None,
        })
    }

    /// Opens (or creates) a database file and wraps it.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let mut store = Self::try_new(open_db(path)?)?;
        store.path = Some(path.to_path_buf());
        Ok(store)
    }

    /// Opens a fresh in-memory database and wraps it.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }

    /// Database file behind this store; `None` for in-memory or wrapped
    /// connections.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Reads the current document set for one owner.
    pub fn snapshot(&self, owner: &OwnerId) -> StoreResult<Snapshot> {
        let conn = self.lock_conn()?;
        load_snapshot(&conn, owner)
    }

    /// Returns the number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().entries.len()
    }

    fn lock_conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, SubscriberRegistry> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Pushes a fresh snapshot to every subscriber of `owner`.
    ///
    /// Must be called with the connection lock held. Subscribers whose
    /// receiver is gone are pruned.
    fn notify_owner(&self, conn: &Connection, owner: &OwnerId) {
        let targets = {
            let registry = self.lock_subscribers();
            registry
                .entries
                .iter()
                .filter(|(_, subscriber)| subscriber.owner == *owner)
                .map(|(id, subscriber)| (*id, subscriber.sender.clone()))
                .collect::<Vec<_>>()
        };
        if targets.is_empty() {
            return;
        }

        let snapshot = match load_snapshot(conn, owner) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                error!(
                    "event=store_notify module=store status=error subscribers={} error={}",
                    targets.len(),
                    err
                );
                return;
            }
        };

        let mut disconnected = Vec::new();
        for (id, sender) in targets {
            if sender.send(snapshot.clone()).is_err() {
                disconnected.push(id);
            }
        }

        if !disconnected.is_empty() {
            let mut registry = self.lock_subscribers();
            for id in &disconnected {
                registry.entries.remove(id);
            }
            debug!(
                "event=store_notify module=store status=pruned count={}",
                disconnected.len()
            );
        }
    }
}

impl TaskStore for SqliteTaskStore {
    fn subscribe(&self, owner: &OwnerId) -> StoreResult<Subscription> {
        let conn = self.lock_conn()?;
        let initial = load_snapshot(&conn, owner)?;
        let (sender, receiver) = mpsc::channel();
        let document_count = initial.documents.len();
        // The receiver is still held locally, so this send cannot fail.
        let _ = sender.send(initial);

        let id = {
            let mut registry = self.lock_subscribers();
            registry.next_id += 1;
            let id = registry.next_id;
            registry.entries.insert(
                id,
                Subscriber {
                    owner: owner.clone(),
                    sender,
                },
            );
            id
        };

        debug!(
            "event=store_subscribe module=store status=ok subscription_id={} documents={}",
            id, document_count
        );
        Ok(Subscription {
            id,
            owner: owner.clone(),
            receiver,
        })
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.lock_subscribers().entries.remove(&id).is_some();
        debug!(
            "event=store_unsubscribe module=store status={} subscription_id={}",
            if removed { "ok" } else { "noop" },
            id
        );
        removed
    }

    fn insert(&self, document: &TaskDocument) -> StoreResult<TaskId> {
        document.validate()?;
        let id = Uuid::new_v4();

        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO tasks (
                id,
                owner,
                text,
                done,
                subtasks,
                category,
                time
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                id.to_string(),
                document.owner.as_str(),
                document.text.as_str(),
                bool_to_int(document.done),
                subtasks_to_db(&document.subtasks)?,
                document.category.as_str(),
                document.time.as_str(),
            ],
        )?;
        debug!("event=store_insert module=store status=ok task_id={id}");

        self.notify_owner(&conn, &document.owner);
        Ok(id)
    }

    fn update(&self, id: TaskId, patch: &TaskPatch) -> StoreResult<()> {
        patch.validate()?;
        let subtasks = patch
            .subtasks
            .as_deref()
            .map(subtasks_to_db)
            .transpose()?;

        let conn = self.lock_conn()?;
        let owner: Option<String> = conn
            .query_row(
                "UPDATE tasks
                 SET
                    done = COALESCE(?1, done),
                    subtasks = COALESCE(?2, subtasks),
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?3
                 RETURNING owner;",
                params![patch.done.map(bool_to_int), subtasks, id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(owner) = owner else {
            return Err(StoreError::NotFound(id));
        };
        debug!(
            "event=store_update module=store status=ok task_id={} fields={}",
            id,
            patch_field_names(patch)
        );

        self.notify_owner(&conn, &parse_owner(&owner)?);
        Ok(())
    }

    fn remove(&self, id: TaskId) -> StoreResult<()> {
        let conn = self.lock_conn()?;
        let owner: Option<String> = conn
            .query_row(
                "DELETE FROM tasks WHERE id = ?1 RETURNING owner;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match owner {
            Some(owner) => {
                debug!("event=store_remove module=store status=ok task_id={id}");
                self.notify_owner(&conn, &parse_owner(&owner)?);
            }
            None => debug!("event=store_remove module=store status=noop task_id={id}"),
        }
        Ok(())
    }

    fn refresh(&self) -> StoreResult<usize> {
        let conn = self.lock_conn()?;
        let current = read_data_version(&conn)?;
        if self.data_version.swap(current, Ordering::SeqCst) == current {
            return Ok(0);
        }

        let mut owners: Vec<OwnerId> = self
            .lock_subscribers()
            .entries
            .values()
            .map(|subscriber| subscriber.owner.clone())
            .collect();
        owners.sort();
        owners.dedup();

        for owner in &owners {
            self.notify_owner(&conn, owner);
        }
        debug!(
            "event=store_refresh module=store status=ok owners={}",
            owners.len()
        );
        Ok(owners.len())
    }
}

fn read_data_version(conn: &Connection) -> StoreResult<i64> {
    Ok(conn.query_row("PRAGMA data_version;", [], |row| row.get(0))?)
}

fn load_snapshot(conn: &Connection, owner: &OwnerId) -> StoreResult<Snapshot> {
    let mut stmt = conn.prepare(&format!(
        "{TASK_SELECT_SQL}
         WHERE owner = ?1
         ORDER BY seq ASC;"
    ))?;
    let mut rows = stmt.query([owner.as_str()])?;
    let mut documents = Vec::new();
    while let Some(row) = rows.next()? {
        documents.push(parse_task_row(row)?);
    }
    Ok(Snapshot { documents })
}

fn parse_task_row(row: &Row<'_>) -> StoreResult<StoredTask> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        StoreError::InvalidData(format!("invalid uuid value `{id_text}` in tasks.id"))
    })?;

    let owner_text: String = row.get("owner")?;
    let owner = parse_owner(&owner_text)?;

    let done = match row.get::<_, i64>("done")? {
        0 => false,
        1 => true,
        other => {
            return Err(StoreError::InvalidData(format!(
                "invalid done value `{other}` in tasks.done"
            )));
        }
    };

    let subtasks_text: Option<String> = row.get("subtasks")?;
    let subtasks = match subtasks_text {
        Some(text) => serde_json::from_str::<Vec<Subtask>>(&text).map_err(|err| {
            StoreError::InvalidData(format!("invalid subtasks json in tasks.subtasks: {err}"))
        })?,
        None => Vec::new(),
    };

    let document = TaskDocument {
        owner,
        text: row.get("text")?,
        done,
        subtasks,
        category: row.get("category")?,
        time: row.get("time")?,
    };
    document.validate()?;
    Ok(StoredTask { id, document })
}

fn parse_owner(value: &str) -> StoreResult<OwnerId> {
    OwnerId::parse(value)
        .ok_or_else(|| StoreError::InvalidData("empty owner value in tasks.owner".to_string()))
}

fn subtasks_to_db(subtasks: &[Subtask]) -> StoreResult<String> {
    serde_json::to_string(subtasks)
        .map_err(|err| StoreError::InvalidData(format!("cannot encode subtasks: {err}")))
}

fn patch_field_names(patch: &TaskPatch) -> &'static str {
    match (patch.done.is_some(), patch.subtasks.is_some()) {
        (true, true) => "done,subtasks",
        (true, false) => "done",
        (false, true) => "subtasks",
        (false, false) => "none",
    }
}

fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

fn ensure_store_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "tasks")? {
        return Err(StoreError::MissingRequiredTable("tasks"));
    }

    for column in REQUIRED_COLUMNS {
        if !table_has_column(conn, "tasks", column)? {
            return Err(StoreError::MissingRequiredColumn {
                table: "tasks",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
