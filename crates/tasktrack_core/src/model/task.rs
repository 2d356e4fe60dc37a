//! Task domain model.
//!
//! # Responsibility
//! - Define the task/subtask read model materialized from feed emissions.
//! - Define the persisted document shape and partial-update patch.
//!
//! # Invariants
//! - `id` is assigned by the store and never reused for another task.
//! - `owner` is fixed at creation and never re-assigned.
//! - Subtasks have no identity beyond their position in `subtasks`.
//! - Task and subtask text is never empty after trimming.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable store-assigned identifier of one task document.
pub type TaskId = Uuid;

/// Category assigned to every newly created task.
pub const DEFAULT_CATEGORY: &str = "General";

/// Identity of the user that owns a task set.
///
/// Acts as the per-user partition key: every read is filtered on it and
/// every insert is written against it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Builds an owner identity from raw provider input.
    ///
    /// Returns `None` when the trimmed input is empty; an empty identity is
    /// treated the same as no identity at all.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validation errors for task documents and patches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    EmptyOwner,
    EmptyText,
    EmptySubtaskText { index: usize },
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyOwner => write!(f, "task owner cannot be empty"),
            Self::EmptyText => write!(f, "task text cannot be empty"),
            Self::EmptySubtaskText { index } => {
                write!(f, "subtask text at index {index} cannot be empty")
            }
        }
    }
}

impl Error for TaskValidationError {}

/// One entry of a task's ordered subtask list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub text: String,
    pub done: bool,
}

impl Subtask {
    /// Creates an open subtask.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: false,
        }
    }
}

/// Persisted task payload, as written to and read from the store.
///
/// The store-assigned id is intentionally absent: it is not part of the
/// written payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDocument {
    pub owner: OwnerId,
    pub text: String,
    pub done: bool,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    pub category: String,
    pub time: String,
}

impl TaskDocument {
    /// Builds the document for a freshly created task.
    ///
    /// # Invariants
    /// - `done = false`, `subtasks = []`.
    /// - `category = DEFAULT_CATEGORY`, `time = ""`.
    pub fn new_task(owner: OwnerId, text: impl Into<String>) -> Self {
        Self {
            owner,
            text: text.into(),
            done: false,
            subtasks: Vec::new(),
            category: DEFAULT_CATEGORY.to_string(),
            time: String::new(),
        }
    }

    /// Validates document invariants before any store write.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.owner.as_str().trim().is_empty() {
            return Err(TaskValidationError::EmptyOwner);
        }
        if self.text.trim().is_empty() {
            return Err(TaskValidationError::EmptyText);
        }
        validate_subtasks(&self.subtasks)
    }
}

/// Partial update applied by the store's `update` primitive.
///
/// Only fields set to `Some` are replaced. `subtasks` is a whole-field
/// replacement: the full sequence must be supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<Subtask>>,
}

impl TaskPatch {
    pub fn done(done: bool) -> Self {
        Self {
            done: Some(done),
            ..Self::default()
        }
    }

    pub fn subtasks(subtasks: Vec<Subtask>) -> Self {
        Self {
            subtasks: Some(subtasks),
            ..Self::default()
        }
    }

    /// Returns whether this patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.done.is_none() && self.subtasks.is_none()
    }

    pub fn validate(&self) -> Result<(), TaskValidationError> {
        match &self.subtasks {
            Some(subtasks) => validate_subtasks(subtasks),
            None => Ok(()),
        }
    }
}

/// Task read model materialized from one feed emission.
///
/// Instances are rebuilt from scratch on every emission, so nothing
/// view-local may be stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub done: bool,
    pub subtasks: Vec<Subtask>,
    /// Empty when the stored document carries no category.
    pub category: String,
    /// Display-only; empty when unset.
    pub time: String,
    #[serde(skip_serializing)]
    pub owner: OwnerId,
}

impl Task {
    /// Materializes a task from a stored document and its id.
    pub fn from_document(id: TaskId, document: TaskDocument) -> Self {
        Self {
            id,
            text: document.text,
            done: document.done,
            subtasks: document.subtasks,
            category: document.category,
            time: document.time,
            owner: document.owner,
        }
    }

    pub fn has_subtasks(&self) -> bool {
        !self.subtasks.is_empty()
    }

    /// Returns the subtask list with one new open entry appended.
    pub fn subtasks_with_appended(&self, text: impl Into<String>) -> Vec<Subtask> {
        let mut updated = self.subtasks.clone();
        updated.push(Subtask::new(text));
        updated
    }

    /// Returns the subtask list with the entry at `index` flipped.
    ///
    /// Returns `None` when `index` is outside the currently known list.
    pub fn subtasks_with_toggled(&self, index: usize) -> Option<Vec<Subtask>> {
        let mut updated = self.subtasks.clone();
        let entry = updated.get_mut(index)?;
        entry.done = !entry.done;
        Some(updated)
    }
}

fn validate_subtasks(subtasks: &[Subtask]) -> Result<(), TaskValidationError> {
    match subtasks
        .iter()
        .position(|subtask| subtask.text.trim().is_empty())
    {
        Some(index) => Err(TaskValidationError::EmptySubtaskText { index }),
        None => Ok(()),
    }
}
