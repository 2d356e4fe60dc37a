//! Presentation reconciler.
//!
//! # Responsibility
//! - Merge the current task list with the collapse set into render rows.
//!
//! # Invariants
//! - Pure: output depends only on the two inputs and owns no state.
//! - Subtask rows appear only for tasks that have subtasks and are not
//!   collapsed.
//! - The disclosure control appears only for tasks that have subtasks.

use crate::model::task::{Task, TaskId};
use crate::view_state::CollapseSet;
use serde::Serialize;

/// One rendered subtask line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtaskRow {
    /// Position inside the task; the only handle for toggling it.
    pub index: usize,
    pub text: String,
    pub done: bool,
}

/// One rendered task block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRow {
    pub id: TaskId,
    pub text: String,
    pub done: bool,
    /// Shown only when non-empty.
    pub category: Option<String>,
    /// Shown only when non-empty.
    pub time: Option<String>,
    pub show_disclosure: bool,
    pub collapsed: bool,
    pub subtasks: Vec<SubtaskRow>,
    /// The add-subtask affordance is hidden while collapsed.
    pub show_add_subtask: bool,
}

/// Builds render rows for `tasks`, in list order.
pub fn render(tasks: &[Task], collapsed: &CollapseSet) -> Vec<TaskRow> {
    tasks.iter().map(|task| render_task(task, collapsed)).collect()
}

fn render_task(task: &Task, collapsed: &CollapseSet) -> TaskRow {
    let is_collapsed = collapsed.is_collapsed(task.id);
    let subtasks = if task.has_subtasks() && !is_collapsed {
        task.subtasks
            .iter()
            .enumerate()
            .map(|(index, subtask)| SubtaskRow {
                index,
                text: subtask.text.clone(),
                done: subtask.done,
            })
            .collect()
    } else {
        Vec::new()
    };

    TaskRow {
        id: task.id,
        text: task.text.clone(),
        done: task.done,
        category: non_empty(&task.category),
        time: non_empty(&task.time),
        show_disclosure: task.has_subtasks(),
        collapsed: is_collapsed,
        subtasks,
        show_add_subtask: !is_collapsed,
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::render;
    use crate::model::task::{OwnerId, Subtask, Task};
    use crate::view_state::CollapseSet;
    use uuid::Uuid;

    fn task(text: &str, subtasks: Vec<Subtask>) -> Task {
        Task {
            id: Uuid::new_v4(),
            text: text.to_string(),
            done: false,
            subtasks,
            category: "General".to_string(),
            time: String::new(),
            owner: OwnerId::parse("u1").expect("owner should parse"),
        }
    }

    #[test]
    fn task_without_subtasks_has_no_disclosure_or_rows() {
        let tasks = vec![task("plain", vec![])];
        let rows = render(&tasks, &CollapseSet::new());

        assert_eq!(rows.len(), 1);
        assert!(!rows[0].show_disclosure);
        assert!(rows[0].subtasks.is_empty());
        assert!(rows[0].show_add_subtask);
        assert_eq!(rows[0].category.as_deref(), Some("General"));
        assert_eq!(rows[0].time, None);
    }

    #[test]
    fn expanded_task_lists_subtasks_in_order() {
        let tasks = vec![task(
            "groceries",
            vec![Subtask::new("milk"), Subtask::new("eggs")],
        )];
        let rows = render(&tasks, &CollapseSet::new());

        assert!(rows[0].show_disclosure);
        assert!(!rows[0].collapsed);
        let texts = rows[0]
            .subtasks
            .iter()
            .map(|row| (row.index, row.text.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(texts, vec![(0, "milk"), (1, "eggs")]);
    }

    #[test]
    fn collapsed_task_hides_subtasks_but_keeps_disclosure() {
        let tasks = vec![task("groceries", vec![Subtask::new("milk")])];
        let mut collapsed = CollapseSet::new();
        collapsed.toggle(tasks[0].id);

        let rows = render(&tasks, &collapsed);
        assert!(rows[0].show_disclosure);
        assert!(rows[0].collapsed);
        assert!(rows[0].subtasks.is_empty());
        assert!(!rows[0].show_add_subtask);
    }

    #[test]
    fn empty_category_and_time_render_as_absent() {
        let mut uncategorized = task("no category", vec![]);
        uncategorized.category = String::new();
        let mut scheduled = task("scheduled", vec![]);
        scheduled.time = "9:00".to_string();

        let rows = render(&[uncategorized, scheduled], &CollapseSet::new());
        assert_eq!(rows[0].category, None);
        assert_eq!(rows[0].time, None);
        assert_eq!(rows[1].category.as_deref(), Some("General"));
        assert_eq!(rows[1].time.as_deref(), Some("9:00"));
    }

    #[test]
    fn render_is_stable_for_same_inputs() {
        let tasks = vec![
            task("a", vec![Subtask::new("a1")]),
            task("b", vec![]),
        ];
        let mut collapsed = CollapseSet::new();
        collapsed.toggle(tasks[1].id);

        assert_eq!(render(&tasks, &collapsed), render(&tasks, &collapsed));
    }

    #[test]
    fn rows_serialize_for_snapshot_comparison() {
        let tasks = vec![task("groceries", vec![Subtask::new("milk")])];
        let rows = render(&tasks, &CollapseSet::new());

        let json = serde_json::to_value(&rows).expect("rows should serialize");
        assert_eq!(json[0]["text"], "groceries");
        assert_eq!(json[0]["show_disclosure"], true);
        assert_eq!(json[0]["subtasks"][0]["text"], "milk");
        assert_eq!(json[0]["subtasks"][0]["done"], false);
        assert!(json[0].get("owner").is_none());
    }
}
