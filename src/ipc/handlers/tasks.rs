use rusqlite::{params_from_iter, types::Value, Connection};
use serde_json::json;
use uuid::Uuid;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, is_unique_violation, optional_str, required_str, session_user};
use crate::ipc::types::{AppState, Request};
use crate::model::{
    self, now_ms, Task, TaskPriority, TaskStatus, User,
};
use crate::stats::is_overdue;

const DAY_MS: i64 = 86_400_000;

fn can_touch(user: &User, task: &Task) -> bool {
    user.role.is_overseer() || task.assigned_teacher_id == user.id
}

fn task_full_json(conn: &Connection, task: &Task, now: i64) -> rusqlite::Result<serde_json::Value> {
    let notes = model::load_task_notes(conn, &task.id)?;
    let attachments = model::load_task_attachments(conn, &task.id)?;
    let mut v = task.to_json();
    v["overdue"] = json!(is_overdue(task, now));
    v["notes"] = json!(notes.iter().map(|n| n.to_json()).collect::<Vec<_>>());
    v["attachments"] = json!(attachments.iter().map(|a| a.to_json()).collect::<Vec<_>>());
    Ok(v)
}

fn load_owned_task(
    conn: &Connection,
    user: &User,
    req: &Request,
    task_id: &str,
) -> Result<Task, serde_json::Value> {
    let task = match model::load_task(conn, task_id) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(error = %e, "task lookup failed");
            return Err(err(&req.id, "db_query_failed", e.to_string(), None));
        }
    };
    let Some(task) = task else {
        return Err(err(&req.id, "not_found", "task not found", None));
    };
    if !can_touch(user, &task) {
        return Err(err(&req.id, "forbidden", "task belongs to another teacher", None));
    }
    Ok(task)
}

fn handle_tasks_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let user = match session_user(state, req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let filter = optional_str(req, "assignedTeacherId");
    // Visibility scoping lives here, not in client-chosen query params:
    // non-overseers only ever see their own assignments.
    let scope = if user.role.is_overseer() {
        filter
    } else {
        if let Some(f) = &filter {
            if f != &user.id {
                return err(&req.id, "forbidden", "cannot list another teacher's tasks", None);
            }
        }
        Some(user.id.clone())
    };

    let tasks = match model::load_tasks(conn, scope.as_deref()) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(error = %e, "task list failed");
            return err(&req.id, "db_query_failed", e.to_string(), None);
        }
    };

    let now = now_ms();
    let rows: Vec<serde_json::Value> = tasks
        .iter()
        .map(|t| {
            let mut v = t.to_json();
            v["overdue"] = json!(is_overdue(t, now));
            v
        })
        .collect();
    ok(&req.id, json!({ "tasks": rows }))
}

fn handle_tasks_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let user = match session_user(state, req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let task_id = match required_str(req, "taskId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let task = match load_owned_task(conn, &user, req, &task_id) {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    match task_full_json(conn, &task, now_ms()) {
        Ok(v) => ok(&req.id, json!({ "task": v })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_tasks_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let user = match session_user(state, req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let title = match required_str(req, "title") {
        Ok(v) => v.trim().to_string(),
        Err(resp) => return resp,
    };
    if title.is_empty() {
        return err(&req.id, "bad_params", "title must not be empty", None);
    }
    let teacher_id = match required_str(req, "assignedTeacherId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if !user.role.is_overseer() && teacher_id != user.id {
        return err(&req.id, "forbidden", "only overseers assign tasks to others", None);
    }

    match model::load_user(conn, &teacher_id) {
        Ok(Some(_)) => {}
        Ok(None) => return err(&req.id, "not_found", "assigned teacher not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let priority = match optional_str(req, "priority") {
        Some(raw) => match TaskPriority::parse(&raw) {
            Some(p) => p,
            None => return err(&req.id, "bad_params", format!("unknown priority: {}", raw), None),
        },
        None => TaskPriority::Medium,
    };
    let now = now_ms();
    let due_date = match req.params.get("dueDate") {
        Some(v) => match v.as_i64() {
            Some(ms) => ms,
            None => return err(&req.id, "bad_params", "dueDate must be epoch milliseconds", None),
        },
        None => now + DAY_MS,
    };
    let id = optional_str(req, "id").unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Err(e) = conn.execute(
        "INSERT INTO tasks(id, title, description, subject, grade, assigned_teacher_id,
                           due_date, priority, status, progress, last_updated, synced)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, 'TODO', 0, ?, 1)",
        (
            &id,
            &title,
            optional_str(req, "description").unwrap_or_default(),
            optional_str(req, "subject").unwrap_or_default(),
            optional_str(req, "grade").unwrap_or_default(),
            &teacher_id,
            due_date,
            priority.as_str(),
            now,
        ),
    ) {
        if is_unique_violation(&e) {
            return err(&req.id, "duplicate_id", "task id already exists", None);
        }
        tracing::warn!(error = %e, "task insert failed");
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "tasks" })),
        );
    }

    match model::load_task(conn, &id) {
        Ok(Some(task)) => match task_full_json(conn, &task, now) {
            Ok(v) => ok(&req.id, json!({ "task": v })),
            Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Ok(None) => err(&req.id, "not_found", "task not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_tasks_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let user = match session_user(state, req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let task_id = match required_str(req, "taskId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if let Err(resp) = load_owned_task(conn, &user, req, &task_id) {
        return resp;
    }

    // Merge semantics: only supplied fields land in the SET list. Status and
    // progress pass through independently here; this path never re-derives
    // one from the other.
    let mut sets: Vec<&'static str> = Vec::new();
    let mut vals: Vec<Value> = Vec::new();

    if let Some(title) = optional_str(req, "title") {
        let title = title.trim().to_string();
        if title.is_empty() {
            return err(&req.id, "bad_params", "title must not be empty", None);
        }
        sets.push("title = ?");
        vals.push(Value::Text(title));
    }
    if let Some(v) = optional_str(req, "description") {
        sets.push("description = ?");
        vals.push(Value::Text(v));
    }
    if let Some(v) = optional_str(req, "subject") {
        sets.push("subject = ?");
        vals.push(Value::Text(v));
    }
    if let Some(v) = optional_str(req, "grade") {
        sets.push("grade = ?");
        vals.push(Value::Text(v));
    }
    if let Some(teacher_id) = optional_str(req, "assignedTeacherId") {
        if !user.role.is_overseer() && teacher_id != user.id {
            return err(&req.id, "forbidden", "only overseers reassign tasks", None);
        }
        match model::load_user(conn, &teacher_id) {
            Ok(Some(_)) => {}
            Ok(None) => return err(&req.id, "not_found", "assigned teacher not found", None),
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
        sets.push("assigned_teacher_id = ?");
        vals.push(Value::Text(teacher_id));
    }
    if let Some(v) = req.params.get("dueDate") {
        let Some(ms) = v.as_i64() else {
            return err(&req.id, "bad_params", "dueDate must be epoch milliseconds", None);
        };
        sets.push("due_date = ?");
        vals.push(Value::Integer(ms));
    }
    if let Some(raw) = optional_str(req, "priority") {
        let Some(p) = TaskPriority::parse(&raw) else {
            return err(&req.id, "bad_params", format!("unknown priority: {}", raw), None);
        };
        sets.push("priority = ?");
        vals.push(Value::Text(p.as_str().to_string()));
    }
    if let Some(raw) = optional_str(req, "status") {
        let Some(s) = TaskStatus::parse(&raw) else {
            return err(&req.id, "bad_params", format!("unknown status: {}", raw), None);
        };
        sets.push("status = ?");
        vals.push(Value::Text(s.as_str().to_string()));
    }
    if let Some(v) = req.params.get("progress") {
        let Some(p) = v.as_i64().filter(|p| (0..=100).contains(p)) else {
            return err(&req.id, "bad_params", "progress must be an integer 0-100", None);
        };
        sets.push("progress = ?");
        vals.push(Value::Integer(p));
    }
    if let Some(v) = req.params.get("synced") {
        let Some(b) = v.as_bool() else {
            return err(&req.id, "bad_params", "synced must be a boolean", None);
        };
        sets.push("synced = ?");
        vals.push(Value::Integer(b as i64));
    }

    let now = now_ms();
    sets.push("last_updated = ?");
    vals.push(Value::Integer(now));
    vals.push(Value::Text(task_id.clone()));

    let sql = format!("UPDATE tasks SET {} WHERE id = ?", sets.join(", "));
    if let Err(e) = conn.execute(&sql, params_from_iter(vals)) {
        tracing::warn!(error = %e, "task update failed");
        return err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "table": "tasks" })),
        );
    }

    match model::load_task(conn, &task_id) {
        Ok(Some(task)) => match task_full_json(conn, &task, now) {
            Ok(v) => ok(&req.id, json!({ "task": v })),
            Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Ok(None) => err(&req.id, "not_found", "task not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_tasks_set_progress(state: &mut AppState, req: &Request) -> serde_json::Value {
    let user = match session_user(state, req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let task_id = match required_str(req, "taskId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let progress = match req.params.get("progress").and_then(|v| v.as_i64()) {
        Some(p) if (0..=100).contains(&p) => p,
        _ => return err(&req.id, "bad_params", "progress must be an integer 0-100", None),
    };
    if let Err(resp) = load_owned_task(conn, &user, req, &task_id) {
        return resp;
    }

    // The one place the progress/status invariant is enforced: 100 forces
    // DONE, anything else forces IN_PROGRESS (which also walks a finished
    // task back when progress drops).
    let status = if progress == 100 {
        TaskStatus::Done
    } else {
        TaskStatus::InProgress
    };
    let now = now_ms();
    if let Err(e) = conn.execute(
        "UPDATE tasks SET progress = ?, status = ?, last_updated = ? WHERE id = ?",
        (progress, status.as_str(), now, &task_id),
    ) {
        tracing::warn!(error = %e, "progress update failed");
        return err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "table": "tasks" })),
        );
    }

    match model::load_task(conn, &task_id) {
        Ok(Some(task)) => match task_full_json(conn, &task, now) {
            Ok(v) => ok(&req.id, json!({ "task": v })),
            Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Ok(None) => err(&req.id, "not_found", "task not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_tasks_add_note(state: &mut AppState, req: &Request) -> serde_json::Value {
    let user = match session_user(state, req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let task_id = match required_str(req, "taskId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let content = match required_str(req, "content") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if content.trim().is_empty() {
        return err(&req.id, "bad_params", "content must not be empty", None);
    }
    if let Err(resp) = load_owned_task(conn, &user, req, &task_id) {
        return resp;
    }

    let now = now_ms();
    let note_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO task_notes(id, task_id, user_id, user_name, content, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (&note_id, &task_id, &user.id, &user.name, &content, now),
    ) {
        tracing::warn!(error = %e, "note insert failed");
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "task_notes" })),
        );
    }
    if let Err(e) = conn.execute(
        "UPDATE tasks SET last_updated = ? WHERE id = ?",
        (now, &task_id),
    ) {
        return err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "table": "tasks" })),
        );
    }

    match model::load_task(conn, &task_id) {
        Ok(Some(task)) => match task_full_json(conn, &task, now) {
            Ok(v) => ok(&req.id, json!({ "task": v })),
            Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Ok(None) => err(&req.id, "not_found", "task not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "tasks.list" => Some(handle_tasks_list(state, req)),
        "tasks.get" => Some(handle_tasks_get(state, req)),
        "tasks.create" => Some(handle_tasks_create(state, req)),
        "tasks.update" => Some(handle_tasks_update(state, req)),
        "tasks.setProgress" => Some(handle_tasks_set_progress(state, req)),
        "tasks.addNote" => Some(handle_tasks_add_note(state, req)),
        _ => None,
    }
}
