//! Taskflow Domain Models
//!
//! Task entities, typed tool inputs, and the payloads of the widget-state
//! REST channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Task Domain Models
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }
}

/// A task as stored by the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub due: Option<DateTime<Utc>>,

    /// Never serialized; access denials must not reveal who owns a task
    #[serde(skip)]
    pub owner: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub reminders_sent: u32,
}

/// The minimal per-task shape the model sees in list results
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaskSummary {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub due: Option<DateTime<Utc>>,
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            status: task.status,
            due: task.due,
        }
    }
}

// =============================================================================
// Tool Inputs (deserialized after schema validation)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    All,
    Open,
    InProgress,
    Done,
}

impl StatusFilter {
    pub fn matches(&self, status: TaskStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Open => status == TaskStatus::Open,
            StatusFilter::InProgress => status == TaskStatus::InProgress,
            StatusFilter::Done => status == TaskStatus::Done,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Open => "open",
            StatusFilter::InProgress => "in_progress",
            StatusFilter::Done => "done",
        }
    }

    /// Adjective used in narration, with a trailing space when non-empty.
    pub fn label(&self) -> &'static str {
        match self {
            StatusFilter::All => "",
            StatusFilter::Open => "open ",
            StatusFilter::InProgress => "in-progress ",
            StatusFilter::Done => "done ",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListTasksInput {
    pub status: StatusFilter,
    pub limit: usize,
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskRefInput {
    pub task_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SearchTasksInput {
    pub query: String,
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateTaskInput {
    pub title: String,
    pub description: String,
    pub due: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateTaskInput {
    pub task_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub due: Option<DateTime<Utc>>,
    pub clear_due: bool,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderChannel {
    Email,
    Sms,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SendReminderInput {
    pub task_id: String,
    pub channel: ReminderChannel,
}

// =============================================================================
// Widget-State Channel
// =============================================================================

/// Body of `POST /widget_state`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetStateInput {
    pub widget_id: String,
    pub state: Value,
}

/// Body of `POST /composer_input`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposerInput {
    pub conversation_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
    pub status: String,
    pub conversation_id: String,
    pub cleared: usize,
}
