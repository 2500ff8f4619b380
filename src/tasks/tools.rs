//! Taskflow tool definitions and handlers
//!
//! Each handler receives arguments that already passed strict schema
//! validation with defaults applied, and answers in three layers: a short
//! narration, minimal structured fields for follow-up calls, and the full
//! records in `_meta` for the widget.

use super::helpers::*;
use super::models::*;
use super::state::AppState;
use crate::apps::{
    CallContext, InputSchema, ParamSpec, ToolAnnotations, ToolDefinition, ToolOutput, ToolRegistry,
};
use crate::error::{RegistryError, ToolError};
use chrono::Utc;
use serde_json::{json, Map, Value};
use uuid::Uuid;

const TITLE_MAX: usize = 200;
const DESCRIPTION_MAX: usize = 2000;
const ID_MAX: usize = 64;
const PAGE_MAX: i64 = 50;

fn task_id_param() -> ParamSpec {
    ParamSpec::string(
        "taskId",
        "Identifier of the task, as returned by list, search or create",
        ID_MAX,
    )
    .non_empty()
    .required()
}

fn limit_param() -> ParamSpec {
    ParamSpec::integer("limit", "Maximum number of tasks to return", 1, PAGE_MAX)
        .default_value(json!(10))
}

/// Registers the Taskflow tool set under the registry's service prefix.
pub fn register_tools(registry: &mut ToolRegistry<AppState>) -> Result<(), RegistryError> {
    let service = registry.service().to_string();
    let name = |verb_noun: &str| format!("{}_{}", service, verb_noun);

    registry.register(
        ToolDefinition::new(name("list_tasks"), "List tasks")
            .description(
                "Use this when the user wants to see their tasks or asks what is due. \
                 Accepts an optional status filter and page size. \
                 Returns task ids, titles, statuses and due dates, plus total and overdue counts.",
            )
            .schema(
                InputSchema::new()
                    .param(
                        ParamSpec::enumeration(
                            "status",
                            "Only return tasks with this status",
                            ["all", "open", "in_progress", "done"],
                        )
                        .default_value(json!("all")),
                    )
                    .param(limit_param())
                    .param(
                        ParamSpec::string(
                            "cursor",
                            "Page cursor supplied by the Taskflow widget",
                            ID_MAX,
                        )
                        .default_value(Value::Null),
                    ),
            )
            .annotations(ToolAnnotations::read_only())
            .status_text("Loading tasks", "Tasks loaded"),
        list_tasks,
    )?;

    registry.register(
        ToolDefinition::new(name("get_task"), "Get task")
            .description(
                "Use this when the user asks about one specific task they already referenced. \
                 Accepts taskId. \
                 Returns the task's id, title, status, due date and last update time.",
            )
            .schema(InputSchema::new().param(task_id_param()))
            .annotations(ToolAnnotations::read_only())
            .status_text("Opening task", "Task opened"),
        get_task,
    )?;

    registry.register(
        ToolDefinition::new(name("search_tasks"), "Search tasks")
            .description(
                "Use this when the user looks for tasks by a word or phrase. \
                 Accepts query text and a page size. \
                 Returns matching task ids, titles, statuses and due dates.",
            )
            .schema(
                InputSchema::new()
                    .param(
                        ParamSpec::string(
                            "query",
                            "Text to match against task titles and descriptions",
                            TITLE_MAX,
                        )
                        .non_empty()
                        .required(),
                    )
                    .param(limit_param()),
            )
            .annotations(ToolAnnotations::read_only())
            .status_text("Searching tasks", "Search finished"),
        search_tasks,
    )?;

    registry.register(
        ToolDefinition::new(name("create_task"), "Create task")
            .description(
                "Use this when the user asks to add a new task. \
                 Accepts a title, an optional description and an optional due date-time. \
                 Returns the new task's id, title, status, due date and creation time.",
            )
            .schema(
                InputSchema::new()
                    .param(
                        ParamSpec::string("title", "Short title of the task", TITLE_MAX)
                            .non_empty()
                            .required(),
                    )
                    .param(
                        ParamSpec::string(
                            "description",
                            "Longer notes for the task",
                            DESCRIPTION_MAX,
                        )
                        .default_value(json!("")),
                    )
                    .param(
                        ParamSpec::timestamp(
                            "due",
                            "When the task is due, as an RFC 3339 date-time",
                        )
                        .default_value(Value::Null),
                    ),
            )
            .annotations(ToolAnnotations::write())
            .status_text("Creating task", "Task created"),
        create_task,
    )?;

    registry.register(
        ToolDefinition::new(name("update_task"), "Update task")
            .description(
                "Use this when the user wants to rename, reschedule, re-describe \
                 or change the status of an existing task. \
                 Accepts taskId plus any fields to change; \
                 omitted or null fields stay as they are. \
                 Set clearDue to true to remove the due date. \
                 Returns the task's id, title, status, due date, update time \
                 and the list of changed fields.",
            )
            .schema(
                InputSchema::new()
                    .param(task_id_param())
                    .param(
                        ParamSpec::string("title", "New title", TITLE_MAX)
                            .non_empty()
                            .default_value(Value::Null),
                    )
                    .param(
                        ParamSpec::string("description", "New description", DESCRIPTION_MAX)
                            .default_value(Value::Null),
                    )
                    .param(
                        ParamSpec::timestamp("due", "New due date-time in RFC 3339")
                            .default_value(Value::Null),
                    )
                    .param(
                        ParamSpec::boolean(
                            "clearDue",
                            "Remove the due date; ignored when due is set",
                        )
                        .default_value(json!(false)),
                    )
                    .param(
                        ParamSpec::enumeration(
                            "status",
                            "New status",
                            ["open", "in_progress", "done"],
                        )
                        .default_value(Value::Null),
                    ),
            )
            .annotations(ToolAnnotations::write())
            .status_text("Updating task", "Task updated"),
        update_task,
    )?;

    registry.register(
        ToolDefinition::new(name("complete_task"), "Complete task")
            .description(
                "Use this when the user says a task is finished. \
                 Accepts taskId. Returns the task's id, its done status and the completion time.",
            )
            .schema(InputSchema::new().param(task_id_param()))
            .annotations(ToolAnnotations::write())
            .status_text("Completing task", "Task completed"),
        complete_task,
    )?;

    registry.register(
        ToolDefinition::new(name("delete_task"), "Delete task")
            .description(
                "Use this when the user explicitly asks to remove a task permanently. \
                 Accepts taskId. Returns the removed task's id. The removal cannot be undone.",
            )
            .schema(InputSchema::new().param(task_id_param()))
            .annotations(ToolAnnotations::destructive())
            .status_text("Deleting task", "Task deleted"),
        delete_task,
    )?;

    registry.register(
        ToolDefinition::new(name("send_reminder"), "Send reminder")
            .description(
                "Use this when the user asks to be reminded about a task \
                 by email or text message. \
                 Accepts taskId and a channel. \
                 Returns the task id, channel and the time the reminder was sent.",
            )
            .schema(
                InputSchema::new().param(task_id_param()).param(
                    ParamSpec::enumeration(
                        "channel",
                        "Where to deliver the reminder",
                        ["email", "sms"],
                    )
                    .default_value(json!("email")),
                ),
            )
            .annotations(ToolAnnotations::write().open_world())
            .status_text("Sending reminder", "Reminder sent"),
        send_reminder,
    )?;

    Ok(())
}

fn parse<T: serde::de::DeserializeOwned>(args: Map<String, Value>) -> Result<T, ToolError> {
    Ok(serde_json::from_value(Value::Object(args))?)
}

fn load_task(state: &AppState, ctx: &CallContext, task_id: &str) -> Result<Task, ToolError> {
    let task = state
        .tasks
        .get(task_id)
        .ok_or_else(|| ToolError::not_found("task", task_id))?;
    ensure_access(&task, ctx.subject.as_deref())?;
    Ok(task.clone())
}

/// Visible tasks matching `keep`, in display order.
fn collect_visible(
    state: &AppState,
    ctx: &CallContext,
    keep: impl Fn(&Task) -> bool,
) -> Vec<Task> {
    let subject = ctx.subject.as_deref();
    let mut tasks: Vec<Task> = state
        .tasks
        .iter()
        .filter(|t| visible_to(t.value(), subject) && keep(t.value()))
        .map(|t| t.value().clone())
        .collect();
    sort_for_display(&mut tasks);
    tasks
}

fn summaries(tasks: &[Task]) -> Vec<TaskSummary> {
    tasks.iter().map(TaskSummary::from).collect()
}

fn list_tasks(
    state: &AppState,
    ctx: &CallContext,
    args: Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let input: ListTasksInput = parse(args)?;
    let offset = decode_cursor(input.cursor.as_deref())?;
    let now = Utc::now();

    let matching = collect_visible(state, ctx, |t| input.status.matches(t.status));
    let total = matching.len();
    let overdue = matching.iter().filter(|t| is_overdue(t, now)).count();
    let page: Vec<Task> = matching.iter().skip(offset).take(input.limit).cloned().collect();
    let next_cursor = (offset + page.len() < total).then(|| encode_cursor(offset + page.len()));

    let narration = if total == 0 {
        format!("There are no {}tasks.", input.status.label())
    } else if page.is_empty() {
        format!(
            "No more {}tasks after this page; {} in total. \
             List again without a cursor to start over.",
            input.status.label(),
            total
        )
    } else {
        format!(
            "Showing {} of {} {}tasks ({} overdue): {}.",
            page.len(),
            total,
            input.status.label(),
            overdue,
            format_title_summary(&page, 3)
        )
    };

    Ok(ToolOutput::new(
        narration,
        json!({
            "tasks": summaries(&page),
            "total": total,
            "overdue": overdue,
        }),
    )
    .with_meta("tasks", json!(page))
    .with_meta("nextCursor", json!(next_cursor))
    .with_meta("preferences", json!({ "sort": "due", "status": input.status.as_str() }))
    .with_widget_seed(json!({ "view": "list", "selectedTaskId": null })))
}

fn get_task(
    state: &AppState,
    ctx: &CallContext,
    args: Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let input: TaskRefInput = parse(args)?;
    let task = load_task(state, ctx, &input.task_id)?;

    Ok(ToolOutput::new(
        format!("“{}” is {}, {}.", task.title, task.status.as_str(), due_phrase(&task)),
        json!({
            "id": task.id,
            "title": task.title,
            "status": task.status,
            "due": task.due,
            "updatedAt": task.updated_at,
        }),
    )
    .with_meta("task", json!(task))
    .with_widget_seed(json!({ "view": "detail", "selectedTaskId": task.id })))
}

fn search_tasks(
    state: &AppState,
    ctx: &CallContext,
    args: Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let input: SearchTasksInput = parse(args)?;
    let needle = input.query.to_lowercase();

    let matching = collect_visible(state, ctx, |t| {
        t.title.to_lowercase().contains(&needle) || t.description.to_lowercase().contains(&needle)
    });
    let total = matching.len();
    let page: Vec<Task> = matching.into_iter().take(input.limit).collect();

    let narration = if total == 0 {
        format!("No tasks match “{}”.", input.query)
    } else {
        format!(
            "{} task(s) match “{}”: {}.",
            total,
            input.query,
            format_title_summary(&page, 3)
        )
    };

    Ok(ToolOutput::new(
        narration,
        json!({
            "tasks": summaries(&page),
            "total": total,
        }),
    )
    .with_meta("tasks", json!(page))
    .with_meta("query", json!(input.query))
    .with_widget_seed(json!({ "view": "search", "selectedTaskId": null })))
}

fn create_task(
    state: &AppState,
    ctx: &CallContext,
    args: Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let input: CreateTaskInput = parse(args)?;
    let now = Utc::now();
    let task = Task {
        id: new_task_id(),
        title: input.title,
        description: input.description,
        status: TaskStatus::Open,
        due: input.due,
        owner: ctx.subject.clone(),
        created_at: now,
        updated_at: now,
        completed_at: None,
        reminders_sent: 0,
    };
    state.tasks.insert(task.id.clone(), task.clone());
    tracing::info!(task_id = %task.id, "Created task");

    Ok(ToolOutput::new(
        format!("Created “{}”, {}.", task.title, due_phrase(&task)),
        json!({
            "id": task.id,
            "title": task.title,
            "status": task.status,
            "due": task.due,
            "createdAt": task.created_at,
        }),
    )
    .with_meta("task", json!(task))
    .with_widget_seed(json!({ "view": "detail", "selectedTaskId": task.id })))
}

fn update_task(
    state: &AppState,
    ctx: &CallContext,
    args: Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let input: UpdateTaskInput = parse(args)?;
    let mut entry = state
        .tasks
        .get_mut(&input.task_id)
        .ok_or_else(|| ToolError::not_found("task", &input.task_id))?;
    ensure_access(&entry, ctx.subject.as_deref())?;

    let now = Utc::now();
    let mut changed = Vec::new();
    if let Some(title) = input.title.filter(|t| *t != entry.title) {
        entry.title = title;
        changed.push("title");
    }
    if let Some(description) = input.description.filter(|d| *d != entry.description) {
        entry.description = description;
        changed.push("description");
    }
    let due = match input.due {
        Some(due) => Some(due),
        None if input.clear_due => None,
        None => entry.due,
    };
    if due != entry.due {
        entry.due = due;
        changed.push("due");
    }
    if let Some(status) = input.status.filter(|s| *s != entry.status) {
        entry.status = status;
        entry.completed_at = (status == TaskStatus::Done).then_some(now);
        changed.push("status");
    }
    if !changed.is_empty() {
        entry.updated_at = now;
    }
    let task = entry.clone();
    drop(entry);

    let narration = if changed.is_empty() {
        format!("“{}” already matches; nothing changed.", task.title)
    } else {
        format!("Updated {} of “{}”.", changed.join(", "), task.title)
    };

    Ok(ToolOutput::new(
        narration,
        json!({
            "id": task.id,
            "title": task.title,
            "status": task.status,
            "due": task.due,
            "updatedAt": task.updated_at,
            "changed": changed,
        }),
    )
    .with_meta("task", json!(task))
    .with_widget_seed(json!({ "view": "detail", "selectedTaskId": task.id })))
}

fn complete_task(
    state: &AppState,
    ctx: &CallContext,
    args: Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let input: TaskRefInput = parse(args)?;
    let mut entry = state
        .tasks
        .get_mut(&input.task_id)
        .ok_or_else(|| ToolError::not_found("task", &input.task_id))?;
    ensure_access(&entry, ctx.subject.as_deref())?;

    let already_done = entry.status == TaskStatus::Done;
    if !already_done {
        let now = Utc::now();
        entry.status = TaskStatus::Done;
        entry.completed_at = Some(now);
        entry.updated_at = now;
    }
    let task = entry.clone();
    drop(entry);

    let narration = if already_done {
        format!("“{}” was already completed.", task.title)
    } else {
        format!("Marked “{}” as done.", task.title)
    };

    Ok(ToolOutput::new(
        narration,
        json!({
            "id": task.id,
            "status": task.status,
            "completedAt": task.completed_at,
        }),
    )
    .with_meta("task", json!(task)))
}

fn delete_task(
    state: &AppState,
    ctx: &CallContext,
    args: Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let input: TaskRefInput = parse(args)?;
    let subject = ctx.subject.as_deref();

    let Some((_, task)) = state
        .tasks
        .remove_if(&input.task_id, |_, t| visible_to(t, subject))
    else {
        return Err(if state.tasks.contains_key(&input.task_id) {
            ToolError::PermissionDenied
        } else {
            ToolError::not_found("task", &input.task_id)
        });
    };
    state.reminders.remove(&task.id);
    tracing::info!(task_id = %task.id, "Deleted task");

    Ok(ToolOutput::new(
        format!("Deleted “{}”. This cannot be undone.", task.title),
        json!({
            "id": task.id,
            "deleted": true,
        }),
    )
    .with_meta("task", json!(task)))
}

fn send_reminder(
    state: &AppState,
    ctx: &CallContext,
    args: Map<String, Value>,
) -> Result<ToolOutput, ToolError> {
    let input: SendReminderInput = parse(args)?;
    let mut entry = state
        .tasks
        .get_mut(&input.task_id)
        .ok_or_else(|| ToolError::not_found("task", &input.task_id))?;
    ensure_access(&entry, ctx.subject.as_deref())?;

    let now = Utc::now();
    let cooldown_secs = state.settings.reminder_cooldown_secs.min(u64::from(u32::MAX));
    let cooldown = chrono::Duration::seconds(cooldown_secs as i64);
    {
        let mut last_sent = state
            .reminders
            .entry(input.task_id.clone())
            .or_insert(now - cooldown);
        let elapsed = now - *last_sent;
        if elapsed < cooldown {
            let remaining = (cooldown - elapsed).num_milliseconds();
            return Err(ToolError::RateLimited {
                retry_after_secs: u64::try_from((remaining + 999) / 1000).unwrap_or(1).max(1),
            });
        }
        *last_sent = now;
    }

    entry.reminders_sent += 1;
    let task = entry.clone();
    drop(entry);

    let delivery_id = Uuid::new_v4().simple().to_string();
    tracing::info!(
        task_id = %task.id,
        channel = ?input.channel,
        %delivery_id,
        "Reminder dispatched"
    );

    let channel = match input.channel {
        ReminderChannel::Email => "email",
        ReminderChannel::Sms => "text message",
    };

    Ok(ToolOutput::new(
        format!("Sent a {} reminder for “{}”.", channel, task.title),
        json!({
            "id": task.id,
            "channel": input.channel,
            "sentAt": now,
        }),
    )
    .with_meta("deliveryId", json!(delivery_id))
    .with_meta("task", json!(task)))
}
