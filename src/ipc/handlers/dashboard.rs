use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, optional_str, session_user};
use crate::ipc::types::{AppState, Request};
use crate::model::{self, now_ms};
use crate::stats;

fn handle_overview(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = session_user(state, req) {
        return resp;
    }
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let tasks = match model::load_tasks(conn, None) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(error = %e, "overview task load failed");
            return err(&req.id, "db_query_failed", e.to_string(), None);
        }
    };
    let users = match model::load_all_users(conn) {
        Ok(u) => u,
        Err(e) => {
            tracing::warn!(error = %e, "overview user load failed");
            return err(&req.id, "db_query_failed", e.to_string(), None);
        }
    };

    let now = now_ms();
    let buckets = stats::status_buckets(&tasks, now);
    let workload: Vec<serde_json::Value> = stats::teacher_workload(&tasks, &users)
        .into_iter()
        .map(|w| {
            json!({
                "teacherId": w.teacher_id,
                "name": w.name,
                "activeCount": w.active_count,
            })
        })
        .collect();
    let critical: Vec<serde_json::Value> = stats::critical_tasks(&tasks, now, 8)
        .into_iter()
        .map(|t| {
            let mut v = t.to_json();
            v["overdue"] = json!(stats::is_overdue(t, now));
            v
        })
        .collect();

    ok(
        &req.id,
        json!({
            "buckets": {
                "pending": buckets.pending,
                "inProgress": buckets.in_progress,
                "done": buckets.done,
                "overdue": buckets.overdue,
            },
            "workload": workload,
            "critical": critical,
            "generatedAt": now,
        }),
    )
}

fn handle_completion(state: &mut AppState, req: &Request) -> serde_json::Value {
    let user = match session_user(state, req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let teacher_id = match optional_str(req, "teacherId") {
        Some(tid) => {
            if tid != user.id && !user.role.is_overseer() {
                return err(&req.id, "forbidden", "cannot read another teacher's completion", None);
            }
            tid
        }
        None => user.id.clone(),
    };

    let tasks = match model::load_tasks(conn, Some(&teacher_id)) {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let done = tasks
        .iter()
        .filter(|t| t.status == crate::model::TaskStatus::Done)
        .count();

    ok(
        &req.id,
        json!({
            "teacherId": teacher_id,
            "completionRate": stats::completion_rate(&tasks),
            "total": tasks.len(),
            "done": done,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.overview" => Some(handle_overview(state, req)),
        "dashboard.completion" => Some(handle_completion(state, req)),
        _ => None,
    }
}
