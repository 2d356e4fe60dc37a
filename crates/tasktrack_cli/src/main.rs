//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `tasktrack_core` linkage.
//! - Drive one scripted session against an in-memory store and print the
//!   rendered rows, keeping output deterministic apart from task ids.
//!
//! # Invariants
//! - Exits non-zero when any scripted step is not issued.

use std::process::ExitCode;
use std::sync::Arc;
use tasktrack_core::{Dispatch, OwnerId, SqliteTaskStore, TrackerSession};

fn main() -> ExitCode {
    println!("tasktrack_core ping={}", tasktrack_core::ping());
    println!("tasktrack_core version={}", tasktrack_core::core_version());

    match run_scripted_session() {
        Ok(rendered) => {
            println!("{rendered}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("tasktrack smoke session failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_scripted_session() -> Result<String, String> {
    let store = SqliteTaskStore::open_in_memory().map_err(|err| err.to_string())?;
    let mut session = TrackerSession::new(Arc::new(store));
    session
        .set_identity(OwnerId::parse("smoke-user"))
        .map_err(|err| err.to_string())?;
    session.pump();

    require_issued("create groceries", session.create_task("Buy milk"))?;
    require_issued("create release", session.create_task("Ship release"))?;
    session.pump();

    let ids = session.tasks().iter().map(|task| task.id).collect::<Vec<_>>();
    let [groceries, release] = ids[..] else {
        return Err(format!("expected 2 tasks after create, found {}", ids.len()));
    };

    require_issued("add groceries subtask", session.add_subtask(groceries, "2% milk"))?;
    require_issued("add release subtask", session.add_subtask(release, "Tag version"))?;
    session.pump();
    require_issued("toggle groceries subtask", session.toggle_subtask(groceries, 0))?;
    require_issued("toggle release", session.toggle_task(release))?;
    session.pump();
    session.toggle_collapse(release);

    let rows = session.render();
    session.sign_out();
    serde_json::to_string_pretty(&rows).map_err(|err| format!("cannot encode rows: {err}"))
}

fn require_issued(step: &str, dispatch: Dispatch) -> Result<(), String> {
    match dispatch {
        Dispatch::Issued => Ok(()),
        Dispatch::Rejected(rejection) => Err(format!("{step} rejected: {rejection}")),
        Dispatch::Failed(failure) => Err(format!("{step} failed: {failure}")),
    }
}

#[cfg(test)]
mod tests {
    use super::{require_issued, run_scripted_session};
    use tasktrack_core::{Dispatch, Rejection};

    #[test]
    fn scripted_session_renders_both_tasks() {
        let rendered = run_scripted_session().expect("scripted session should succeed");
        let rows: serde_json::Value =
            serde_json::from_str(&rendered).expect("output should be JSON");

        assert_eq!(rows[0]["text"], "Buy milk");
        assert_eq!(rows[0]["subtasks"][0]["done"], true);
        assert_eq!(rows[1]["done"], true);
        assert_eq!(rows[1]["collapsed"], true);
    }

    #[test]
    fn non_issued_steps_fail_the_script() {
        assert!(require_issued("ok", Dispatch::Issued).is_ok());

        let error = require_issued("create", Dispatch::Rejected(Rejection::EmptyLabel))
            .expect_err("rejected step should fail");
        assert_eq!(error, "create rejected: label is empty");
    }
}
