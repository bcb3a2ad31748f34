use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model;

fn snapshot(state: &AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "view": state.view.to_json() }))
}

fn handle_navigate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let view = match required_str(req, "view") {
        Ok(v) => v.trim().to_string(),
        Err(resp) => return resp,
    };
    if view.is_empty() {
        return err(&req.id, "bad_params", "view must not be empty", None);
    }
    // The view tag is a free string; unknown tags render as a placeholder
    // panel. Switching panels always leaves the task detail.
    state.view.current_view = view;
    state.view.active_task_id = None;
    snapshot(state, req)
}

fn handle_activate_task(state: &mut AppState, req: &Request) -> serde_json::Value {
    let task_id = match required_str(req, "taskId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match model::load_task(conn, &task_id) {
        Ok(Some(_)) => {}
        Ok(None) => return err(&req.id, "not_found", "task not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }
    state.view.active_task_id = Some(task_id);
    snapshot(state, req)
}

fn handle_clear_active_task(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.view.active_task_id = None;
    snapshot(state, req)
}

fn handle_open_task_modal(state: &mut AppState, req: &Request) -> serde_json::Value {
    let task_id = optional_str(req, "taskId");
    if let Some(tid) = &task_id {
        let conn = match db_conn(state, req) {
            Ok(c) => c,
            Err(resp) => return resp,
        };
        match model::load_task(conn, tid) {
            Ok(Some(_)) => {}
            Ok(None) => return err(&req.id, "not_found", "task not found", None),
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }
    state.view.task_modal.open = true;
    state.view.task_modal.task_id = task_id;
    state.view.task_modal.preselected_teacher_id = optional_str(req, "preselectedTeacherId");
    snapshot(state, req)
}

fn handle_close_task_modal(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.view.task_modal.open = false;
    state.view.task_modal.task_id = None;
    state.view.task_modal.preselected_teacher_id = None;
    snapshot(state, req)
}

fn handle_open_staff_modal(state: &mut AppState, req: &Request) -> serde_json::Value {
    let user_id = optional_str(req, "userId");
    if let Some(uid) = &user_id {
        let conn = match db_conn(state, req) {
            Ok(c) => c,
            Err(resp) => return resp,
        };
        match model::load_user(conn, uid) {
            Ok(Some(_)) => {}
            Ok(None) => return err(&req.id, "not_found", "user not found", None),
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }
    state.view.staff_modal.open = true;
    state.view.staff_modal.user_id = user_id;
    snapshot(state, req)
}

fn handle_close_staff_modal(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.view.staff_modal.open = false;
    state.view.staff_modal.user_id = None;
    snapshot(state, req)
}

fn handle_set_task_filter(state: &mut AppState, req: &Request) -> serde_json::Value {
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    state.view.task_filter_teacher_id = Some(teacher_id);
    snapshot(state, req)
}

fn handle_clear_task_filter(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.view.task_filter_teacher_id = None;
    snapshot(state, req)
}

fn handle_set_online(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(online) = req.params.get("online").and_then(|v| v.as_bool()) else {
        return err(&req.id, "bad_params", "online must be a boolean", None);
    };
    // Displayed in the header, consumed by nothing else.
    state.view.online = online;
    snapshot(state, req)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "view.get" => Some(snapshot(state, req)),
        "view.navigate" => Some(handle_navigate(state, req)),
        "view.activateTask" => Some(handle_activate_task(state, req)),
        "view.clearActiveTask" => Some(handle_clear_active_task(state, req)),
        "view.openTaskModal" => Some(handle_open_task_modal(state, req)),
        "view.closeTaskModal" => Some(handle_close_task_modal(state, req)),
        "view.openStaffModal" => Some(handle_open_staff_modal(state, req)),
        "view.closeStaffModal" => Some(handle_close_staff_modal(state, req)),
        "view.setTaskFilter" => Some(handle_set_task_filter(state, req)),
        "view.clearTaskFilter" => Some(handle_clear_task_filter(state, req)),
        "view.setOnline" => Some(handle_set_online(state, req)),
        _ => None,
    }
}
