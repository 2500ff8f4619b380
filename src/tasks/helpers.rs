//! Taskflow Business Logic Helpers

use super::models::{Task, TaskStatus};
use crate::error::{FieldIssue, ToolError, ValidationError};
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub fn new_task_id() -> String {
    format!("task_{}", Uuid::new_v4().simple())
}

/// A task without an owner is shared with every caller.
pub fn visible_to(task: &Task, subject: Option<&str>) -> bool {
    match &task.owner {
        None => true,
        Some(owner) => subject == Some(owner.as_str()),
    }
}

pub fn ensure_access(task: &Task, subject: Option<&str>) -> Result<(), ToolError> {
    if visible_to(task, subject) {
        Ok(())
    } else {
        Err(ToolError::PermissionDenied)
    }
}

pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    task.status != TaskStatus::Done && task.due.is_some_and(|due| due < now)
}

/// Sorts by due date (undated last), then by creation time.
pub fn sort_for_display(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| match (a.due, b.due) {
        (Some(x), Some(y)) => x.cmp(&y).then(a.created_at.cmp(&b.created_at)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.created_at.cmp(&b.created_at),
    });
}

pub fn encode_cursor(offset: usize) -> String {
    format!("o{}", offset)
}

pub fn decode_cursor(cursor: Option<&str>) -> Result<usize, ToolError> {
    let Some(raw) = cursor else {
        return Ok(0);
    };
    raw.strip_prefix('o')
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| {
            ValidationError::single(FieldIssue::InvalidType {
                field: "cursor".to_string(),
                expected: "a cursor returned by a previous list call",
            })
            .into()
        })
}

/// Human-facing due phrase for narration, e.g. `due 2026-10-20`.
pub fn due_phrase(task: &Task) -> String {
    match task.due {
        Some(due) => format!("due {}", due.format("%Y-%m-%d")),
        None => "no due date".to_string(),
    }
}

/// Produces a short one-line summary of task titles.
///
/// Example output: `"“Pay rent”, “Book flights” and 3 more"`.
pub fn format_title_summary(tasks: &[Task], shown: usize) -> String {
    let titles: Vec<String> = tasks
        .iter()
        .take(shown)
        .map(|t| format!("“{}”", t.title))
        .collect();
    let rest = tasks.len().saturating_sub(shown);
    if rest == 0 {
        titles.join(", ")
    } else {
        format!("{} and {} more", titles.join(", "), rest)
    }
}
