//! Task mutation operations.
//!
//! # Responsibility
//! - Translate one local user intent into exactly one store write.
//! - Reject invalid intents without touching the store.
//! - Log write failures and hand them back as a value.
//!
//! # Invariants
//! - No operation touches locally held task state; results become visible
//!   only through the next feed emission.
//! - Subtask writes always resend the whole `subtasks` sequence, built from
//!   the caller's currently known copy of the task.
//! - No operation panics or returns an error to its caller.

use crate::model::task::{OwnerId, Task, TaskDocument, TaskId, TaskPatch};
use crate::store::{StoreError, TaskStore};
use log::{debug, info, warn};
use std::fmt::{Display, Formatter};

/// Identifies which intent produced a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    CreateTask,
    ToggleTask,
    DeleteTask,
    AddSubtask,
    ToggleSubtask,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateTask => "create_task",
            Self::ToggleTask => "toggle_task",
            Self::DeleteTask => "delete_task",
            Self::AddSubtask => "add_subtask",
            Self::ToggleSubtask => "toggle_subtask",
        }
    }
}

/// Why an intent was dropped before reaching the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NoIdentity,
    EmptyLabel,
    /// Task is not part of the caller's current task set.
    UnknownTask(TaskId),
    /// Task belongs to another identity.
    ForeignTask(TaskId),
    SubtaskIndexOutOfRange { index: usize, len: usize },
}

impl Display for Rejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoIdentity => write!(f, "no signed-in identity"),
            Self::EmptyLabel => write!(f, "label is empty"),
            Self::UnknownTask(id) => write!(f, "task is not in the current list: {id}"),
            Self::ForeignTask(id) => write!(f, "task belongs to another identity: {id}"),
            Self::SubtaskIndexOutOfRange { index, len } => {
                write!(f, "subtask index {index} is out of range for {len} subtask(s)")
            }
        }
    }
}

/// A store write that was issued but failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub kind: MutationKind,
    pub task_id: Option<TaskId>,
    pub message: String,
}

impl Display for WriteFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.task_id {
            Some(id) => write!(f, "{} failed for task {id}: {}", self.kind.as_str(), self.message),
            None => write!(f, "{} failed: {}", self.kind.as_str(), self.message),
        }
    }
}

/// Outcome of one mutation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The write was handed to the store.
    Issued,
    /// The intent was invalid; nothing was written.
    Rejected(Rejection),
    /// The store refused the write.
    Failed(WriteFailure),
}

impl Dispatch {
    pub fn is_issued(&self) -> bool {
        matches!(self, Self::Issued)
    }
}

/// Creates a task for `identity` from a raw label.
///
/// # Contract
/// - The label is trimmed; an empty result is rejected.
/// - The inserted document has `done=false`, `subtasks=[]`,
///   `category="General"`, `time=""`.
pub fn create_task<S: TaskStore + ?Sized>(
    store: &S,
    identity: Option<&OwnerId>,
    label: &str,
) -> Dispatch {
    let kind = MutationKind::CreateTask;
    let Some(owner) = identity else {
        return reject(kind, None, Rejection::NoIdentity);
    };
    let Some(text) = normalize_label(label) else {
        return reject(kind, None, Rejection::EmptyLabel);
    };

    let document = TaskDocument::new_task(owner.clone(), text);
    match store.insert(&document) {
        Ok(task_id) => issued(kind, Some(task_id)),
        Err(err) => failed(kind, None, &err),
    }
}

/// Flips `done` based on the caller's currently known value.
pub fn toggle_task<S: TaskStore + ?Sized>(
    store: &S,
    identity: Option<&OwnerId>,
    task: &Task,
) -> Dispatch {
    let kind = MutationKind::ToggleTask;
    if let Err(rejection) = check_owned(identity, task) {
        return reject(kind, Some(task.id), rejection);
    }
    write_patch(store, kind, task.id, &TaskPatch::done(!task.done))
}

/// Removes one task by id.
pub fn delete_task<S: TaskStore + ?Sized>(
    store: &S,
    identity: Option<&OwnerId>,
    task_id: TaskId,
) -> Dispatch {
    let kind = MutationKind::DeleteTask;
    if identity.is_none() {
        return reject(kind, Some(task_id), Rejection::NoIdentity);
    }
    match store.remove(task_id) {
        Ok(()) => issued(kind, Some(task_id)),
        Err(err) => failed(kind, Some(task_id), &err),
    }
}

/// Appends one open subtask and resends the whole sequence.
pub fn add_subtask<S: TaskStore + ?Sized>(
    store: &S,
    identity: Option<&OwnerId>,
    task: &Task,
    label: &str,
) -> Dispatch {
    let kind = MutationKind::AddSubtask;
    if let Err(rejection) = check_owned(identity, task) {
        return reject(kind, Some(task.id), rejection);
    }
    let Some(text) = normalize_label(label) else {
        return reject(kind, Some(task.id), Rejection::EmptyLabel);
    };
    let patch = TaskPatch::subtasks(task.subtasks_with_appended(text));
    write_patch(store, kind, task.id, &patch)
}

/// Flips one subtask and resends the whole sequence.
///
/// An index outside the currently known list is rejected without a write.
pub fn toggle_subtask<S: TaskStore + ?Sized>(
    store: &S,
    identity: Option<&OwnerId>,
    task: &Task,
    index: usize,
) -> Dispatch {
    let kind = MutationKind::ToggleSubtask;
    if let Err(rejection) = check_owned(identity, task) {
        return reject(kind, Some(task.id), rejection);
    }
    let Some(subtasks) = task.subtasks_with_toggled(index) else {
        let rejection = Rejection::SubtaskIndexOutOfRange {
            index,
            len: task.subtasks.len(),
        };
        return reject(kind, Some(task.id), rejection);
    };
    write_patch(store, kind, task.id, &TaskPatch::subtasks(subtasks))
}

fn write_patch<S: TaskStore + ?Sized>(
    store: &S,
    kind: MutationKind,
    task_id: TaskId,
    patch: &TaskPatch,
) -> Dispatch {
    match store.update(task_id, patch) {
        Ok(()) => issued(kind, Some(task_id)),
        Err(err) => failed(kind, Some(task_id), &err),
    }
}

fn check_owned(identity: Option<&OwnerId>, task: &Task) -> Result<(), Rejection> {
    match identity {
        None => Err(Rejection::NoIdentity),
        Some(owner) if *owner != task.owner => Err(Rejection::ForeignTask(task.id)),
        Some(_) => Ok(()),
    }
}

fn normalize_label(label: &str) -> Option<&str> {
    let trimmed = label.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn issued(kind: MutationKind, task_id: Option<TaskId>) -> Dispatch {
    info!(
        "event=mutation module=mutation status=ok op={} task_id={}",
        kind.as_str(),
        format_task_id(task_id)
    );
    Dispatch::Issued
}

fn reject(kind: MutationKind, task_id: Option<TaskId>, rejection: Rejection) -> Dispatch {
    debug!(
        "event=mutation module=mutation status=rejected op={} task_id={} reason={}",
        kind.as_str(),
        format_task_id(task_id),
        rejection
    );
    Dispatch::Rejected(rejection)
}

fn failed(kind: MutationKind, task_id: Option<TaskId>, err: &StoreError) -> Dispatch {
    warn!(
        "event=mutation module=mutation status=error op={} task_id={} error={}",
        kind.as_str(),
        format_task_id(task_id),
        err
    );
    Dispatch::Failed(WriteFailure {
        kind,
        task_id,
        message: err.to_string(),
    })
}

fn format_task_id(task_id: Option<TaskId>) -> String {
    task_id.map_or_else(|| "none".to_string(), |id| id.to_string())
}
