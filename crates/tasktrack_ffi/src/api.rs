//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the process-wide tracker session to Dart via FRB.
//! - Keep error semantics simple: envelopes with `ok` + message.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Task data reaches Dart only through `tracker_snapshot`, after the
//!   live feed has been pumped.

use log::warn;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tasktrack_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    Dispatch, OwnerId, SqliteTaskStore, StoreResult, TaskId, TaskRow, TrackerSession,
};
use uuid::Uuid;

const TRACKER_DB_FILE_NAME: &str = "tasktrack.sqlite3";
const TRACKER_DB_PATH_ENV: &str = "TASKTRACK_DB_PATH";

type SharedTracker = Result<Mutex<TrackerSession<SqliteTaskStore>>, String>;

static TRACKER: OnceLock<SharedTracker> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Generic action response envelope for tracker intents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerActionResponse {
    /// Whether the intent reached the store.
    pub ok: bool,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl TrackerActionResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// One rendered subtask line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSubtaskItem {
    pub index: u32,
    pub text: String,
    pub done: bool,
}

/// One rendered task block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerTaskItem {
    /// Stable task ID in string form.
    pub task_id: String,
    pub text: String,
    pub done: bool,
    pub category: Option<String>,
    pub time: Option<String>,
    pub show_disclosure: bool,
    pub collapsed: bool,
    pub subtasks: Vec<TrackerSubtaskItem>,
    pub show_add_subtask: bool,
}

/// Render payload for one UI frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSnapshot {
    pub signed_in: bool,
    pub items: Vec<TrackerTaskItem>,
    /// Pending write-failure message; cleared once delivered.
    pub error_message: Option<String>,
}

/// Signs `uid` in and subscribes the live feed.
///
/// An empty `uid` is treated as sign-out.
#[flutter_rust_bridge::frb(sync)]
pub fn tracker_sign_in(uid: String) -> TrackerActionResponse {
    with_tracker(|session| match session.set_identity(OwnerId::parse(&uid)) {
        Ok(()) if session.identity().is_some() => TrackerActionResponse::success("Signed in."),
        Ok(()) => TrackerActionResponse::failure("tracker_sign_in failed: uid is empty"),
        Err(err) => TrackerActionResponse::failure(format!("tracker_sign_in failed: {err}")),
    })
}

/// Signs out and tears the live feed down.
#[flutter_rust_bridge::frb(sync)]
pub fn tracker_sign_out() -> TrackerActionResponse {
    with_tracker(|session| {
        session.sign_out();
        TrackerActionResponse::success("Signed out.")
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn tracker_create_task(text: String) -> TrackerActionResponse {
    with_tracker(|session| dispatch_response("Task created.", session.create_task(&text)))
}

#[flutter_rust_bridge::frb(sync)]
pub fn tracker_toggle_task(task_id: String) -> TrackerActionResponse {
    with_task(&task_id, |session, id| {
        dispatch_response("Task toggled.", session.toggle_task(id))
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn tracker_delete_task(task_id: String) -> TrackerActionResponse {
    with_task(&task_id, |session, id| {
        dispatch_response("Task deleted.", session.delete_task(id))
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn tracker_add_subtask(task_id: String, text: String) -> TrackerActionResponse {
    with_task(&task_id, |session, id| {
        dispatch_response("Subtask added.", session.add_subtask(id, &text))
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn tracker_toggle_subtask(task_id: String, index: u32) -> TrackerActionResponse {
    with_task(&task_id, |session, id| {
        dispatch_response(
            "Subtask toggled.",
            session.toggle_subtask(id, index as usize),
        )
    })
}

/// Flips local collapse state; never touches the store.
#[flutter_rust_bridge::frb(sync)]
pub fn tracker_toggle_collapse(task_id: String) -> TrackerActionResponse {
    with_task(&task_id, |session, id| {
        if session.toggle_collapse(id) {
            TrackerActionResponse::success("Collapsed.")
        } else {
            TrackerActionResponse::success("Expanded.")
        }
    })
}

/// Pumps the live feed and returns the current render rows.
///
/// # FFI contract
/// - Sync call; intended to be polled from the UI frame loop.
/// - Never panics; a broken tracker yields an empty snapshot carrying the
///   error message.
#[flutter_rust_bridge::frb(sync)]
pub fn tracker_snapshot() -> TrackerSnapshot {
    let mut session = match lock_tracker() {
        Ok(session) => session,
        Err(err) => {
            return TrackerSnapshot {
                signed_in: false,
                items: Vec::new(),
                error_message: Some(err),
            };
        }
    };

    session.pump();
    TrackerSnapshot {
        signed_in: session.identity().is_some(),
        items: session.render().into_iter().map(to_task_item).collect(),
        error_message: session
            .take_write_failure()
            .map(|failure| failure.to_string()),
    }
}

fn dispatch_response(success_message: &str, dispatch: Dispatch) -> TrackerActionResponse {
    match dispatch {
        Dispatch::Issued => TrackerActionResponse::success(success_message),
        Dispatch::Rejected(rejection) => TrackerActionResponse::failure(rejection.to_string()),
        Dispatch::Failed(failure) => TrackerActionResponse::failure(failure.to_string()),
    }
}

fn with_task(
    raw_id: &str,
    f: impl FnOnce(&mut TrackerSession<SqliteTaskStore>, TaskId) -> TrackerActionResponse,
) -> TrackerActionResponse {
    match Uuid::parse_str(raw_id.trim()) {
        Ok(id) => with_tracker(|session| f(session, id)),
        Err(_) => TrackerActionResponse::failure(format!("invalid task id `{raw_id}`")),
    }
}

fn with_tracker(
    f: impl FnOnce(&mut TrackerSession<SqliteTaskStore>) -> TrackerActionResponse,
) -> TrackerActionResponse {
    match lock_tracker() {
        Ok(mut session) => f(&mut session),
        Err(err) => TrackerActionResponse::failure(err),
    }
}

fn lock_tracker() -> Result<MutexGuard<'static, TrackerSession<SqliteTaskStore>>, String> {
    let tracker =
        TRACKER.get_or_init(|| new_tracker(SqliteTaskStore::open(resolve_tracker_db_path())));

    match tracker {
        Ok(mutex) => mutex
            .lock()
            .map_err(|_| "tracker session lock poisoned".to_string()),
        Err(err) => Err(err.clone()),
    }
}

fn new_tracker(store: StoreResult<SqliteTaskStore>) -> SharedTracker {
    store
        .map(|store| Mutex::new(TrackerSession::new(Arc::new(store))))
        .map_err(|err| {
            warn!("event=tracker_init module=ffi status=error error={err}");
            format!("tracker store open failed: {err}")
        })
}

fn resolve_tracker_db_path() -> PathBuf {
    if let Ok(raw) = std::env::var(TRACKER_DB_PATH_ENV) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    std::env::temp_dir().join(TRACKER_DB_FILE_NAME)
}

fn to_task_item(row: TaskRow) -> TrackerTaskItem {
    TrackerTaskItem {
        task_id: row.id.to_string(),
        text: row.text,
        done: row.done,
        category: row.category,
        time: row.time,
        show_disclosure: row.show_disclosure,
        collapsed: row.collapsed,
        subtasks: row
            .subtasks
            .into_iter()
            .map(|subtask| TrackerSubtaskItem {
                index: u32::try_from(subtask.index).unwrap_or(u32::MAX),
                text: subtask.text,
                done: subtask.done,
            })
            .collect(),
        show_add_subtask: row.show_add_subtask,
    }
}
