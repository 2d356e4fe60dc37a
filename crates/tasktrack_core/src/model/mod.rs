//! Domain model for the task tracker.
//!
//! # Responsibility
//! - Define the task/subtask shapes shared by store, feed and reconciler.
//! - Keep wire payload (`TaskDocument`) separate from the read model (`Task`).
//!
//! # Invariants
//! - Every task is identified by a stable store-assigned `TaskId`.
//! - Deletion is a hard delete; there are no tombstones.

pub mod task;
