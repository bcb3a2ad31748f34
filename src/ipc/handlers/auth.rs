use serde_json::json;
use uuid::Uuid;

use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, is_unique_violation, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{
    self, now_ms, placeholder_avatar, User, UserRole, SESSION_USER_KEY,
};

const DAY_MS: i64 = 86_400_000;

fn persist_session(state: &AppState, user: &User) {
    // The session IS the user record, stored verbatim. Losing it only costs
    // a re-login, so a write failure is logged and swallowed.
    if let Some(conn) = state.db.as_ref() {
        if let Err(e) = db::settings_set_json(conn, SESSION_USER_KEY, &user.to_json()) {
            tracing::warn!(error = ?e, "session persist failed");
        }
    }
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let password = match required_str(req, "password") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let user = match model::load_user_by_email(conn, &email) {
        Ok(u) => u,
        Err(e) => {
            tracing::warn!(error = %e, "login lookup failed");
            return err(&req.id, "db_query_failed", e.to_string(), None);
        }
    };

    // One error for both unknown email and wrong password; a user with no
    // stored password can never log in.
    let matched = user.filter(|u| u.password.as_deref() == Some(password.as_str()));
    let Some(user) = matched else {
        return err(&req.id, "invalid_credentials", "invalid email or password", None);
    };

    persist_session(state, &user);
    state.view.current_user = Some(user.clone());
    ok(&req.id, json!({ "user": user.to_json() }))
}

fn handle_signup(state: &mut AppState, req: &Request) -> serde_json::Value {
    let email = match required_str(req, "email") {
        Ok(v) => v.trim().to_string(),
        Err(resp) => return resp,
    };
    let password = match required_str(req, "password") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v.trim().to_string(),
        Err(resp) => return resp,
    };
    if email.is_empty() {
        return err(&req.id, "bad_params", "email must not be empty", None);
    }
    if name.is_empty() {
        return err(&req.id, "bad_params", "name must not be empty", None);
    }

    let avatar = optional_str(req, "avatar")
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| placeholder_avatar(&name));
    let user = User {
        id: Uuid::new_v4().to_string(),
        name,
        email,
        password: Some(password),
        phone: optional_str(req, "phone").filter(|p| !p.is_empty()),
        role: UserRole::Teacher,
        department: Some(optional_str(req, "department").unwrap_or_else(|| "Science".to_string())),
        avatar,
        responsibilities: Vec::new(),
    };

    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let responsibilities = match serde_json::to_string(&user.responsibilities) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    if let Err(e) = conn.execute(
        "INSERT INTO users(id, name, email, password, phone, role, department, avatar, responsibilities)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &user.id,
            &user.name,
            &user.email,
            &user.password,
            &user.phone,
            user.role.as_str(),
            &user.department,
            &user.avatar,
            &responsibilities,
        ),
    ) {
        if is_unique_violation(&e) {
            return err(&req.id, "email_in_use", "email already in use", None);
        }
        tracing::warn!(error = %e, "signup insert failed");
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "users" })),
        );
    }

    // Optional onboarding starter task, assigned to the new teacher.
    let mut first_task = None;
    let starter_title = req
        .params
        .get("firstTask")
        .and_then(|t| t.get("title"))
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    if let Some(title) = starter_title {
        let description = req
            .params
            .get("firstTask")
            .and_then(|t| t.get("description"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let task_id = Uuid::new_v4().to_string();
        let now = now_ms();
        if let Err(e) = conn.execute(
            "INSERT INTO tasks(id, title, description, subject, grade, assigned_teacher_id,
                               due_date, priority, status, progress, last_updated, synced)
             VALUES(?, ?, ?, 'General', 'General', ?, ?, 'MEDIUM', 'TODO', 0, ?, 1)",
            (&task_id, &title, &description, &user.id, now + DAY_MS, now),
        ) {
            tracing::warn!(error = %e, "starter task insert failed");
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "table": "tasks" })),
            );
        }
        first_task = model::load_task(conn, &task_id).ok().flatten();
    }

    persist_session(state, &user);
    state.view.current_user = Some(user.clone());
    ok(
        &req.id,
        json!({
            "user": user.to_json(),
            "firstTask": first_task.map(|t| t.to_json()),
        }),
    )
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(conn) = state.db.as_ref() {
        if let Err(e) = db::settings_delete(conn, SESSION_USER_KEY) {
            tracing::warn!(error = ?e, "session clear failed");
        }
    }
    state.view.current_user = None;
    state.view.current_view = "dashboard".to_string();
    state.view.active_task_id = None;
    ok(&req.id, json!({ "view": state.view.to_json() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.login" => Some(handle_login(state, req)),
        "auth.signup" => Some(handle_signup(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        _ => None,
    }
}
