use rusqlite::{params_from_iter, types::Value, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, is_unique_violation, optional_str, required_str, session_user};
use crate::ipc::types::{AppState, Request};
use crate::model::{
    self, parse_responsibilities, placeholder_avatar, UserRole, SESSION_USER_KEY,
};

fn handle_staff_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = session_user(state, req) {
        return resp;
    }
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match model::load_all_users(conn) {
        Ok(users) => ok(
            &req.id,
            json!({ "users": users.iter().map(|u| u.to_json()).collect::<Vec<_>>() }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "staff list failed");
            err(&req.id, "db_query_failed", e.to_string(), None)
        }
    }
}

fn handle_staff_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = session_user(state, req) {
        return resp;
    }
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let user_id = match required_str(req, "userId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match model::load_user(conn, &user_id) {
        Ok(Some(u)) => ok(&req.id, json!({ "user": u.to_json() })),
        Ok(None) => err(&req.id, "not_found", "user not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_staff_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match session_user(state, req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    if !session.role.is_overseer() {
        return err(&req.id, "forbidden", "only overseers manage staff", None);
    }
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let name = match required_str(req, "name") {
        Ok(v) => v.trim().to_string(),
        Err(resp) => return resp,
    };
    if name.is_empty() {
        return err(&req.id, "bad_params", "name must not be empty", None);
    }
    let email = match required_str(req, "email") {
        Ok(v) => v.trim().to_string(),
        Err(resp) => return resp,
    };
    if email.is_empty() {
        return err(&req.id, "bad_params", "email must not be empty", None);
    }
    let role = match optional_str(req, "role") {
        Some(raw) => match UserRole::parse(&raw) {
            Some(r) => r,
            None => return err(&req.id, "bad_params", format!("unknown role: {}", raw), None),
        },
        None => UserRole::Teacher,
    };
    let department = optional_str(req, "department").unwrap_or_else(|| "Science".to_string());
    let avatar = optional_str(req, "avatar")
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| placeholder_avatar(&name));
    let responsibilities = parse_responsibilities(
        optional_str(req, "responsibilities").unwrap_or_default().as_str(),
    );
    let responsibilities_raw = match serde_json::to_string(&responsibilities) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };

    // Insert-if-absent: a caller-supplied id that already exists is its own
    // failure, distinct from the email uniqueness constraint.
    let id = match optional_str(req, "id") {
        Some(explicit) => {
            let exists: Option<i64> = match conn
                .query_row("SELECT 1 FROM users WHERE id = ?", [&explicit], |r| r.get(0))
                .optional()
            {
                Ok(v) => v,
                Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
            };
            if exists.is_some() {
                return err(&req.id, "duplicate_id", "user id already exists", None);
            }
            explicit
        }
        None => Uuid::new_v4().to_string(),
    };

    if let Err(e) = conn.execute(
        "INSERT INTO users(id, name, email, password, phone, role, department, avatar, responsibilities)
         VALUES(?, ?, ?, NULL, ?, ?, ?, ?, ?)",
        (
            &id,
            &name,
            &email,
            optional_str(req, "phone").filter(|p| !p.is_empty()),
            role.as_str(),
            &department,
            &avatar,
            &responsibilities_raw,
        ),
    ) {
        if is_unique_violation(&e) {
            return err(&req.id, "email_in_use", "email already in use", None);
        }
        tracing::warn!(error = %e, "staff insert failed");
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "users" })),
        );
    }

    match model::load_user(conn, &id) {
        Ok(Some(u)) => ok(&req.id, json!({ "user": u.to_json() })),
        Ok(None) => err(&req.id, "not_found", "user not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_staff_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match session_user(state, req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    if !session.role.is_overseer() {
        return err(&req.id, "forbidden", "only overseers manage staff", None);
    }
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let user_id = match required_str(req, "userId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match model::load_user(conn, &user_id) {
        Ok(Some(_)) => {}
        Ok(None) => return err(&req.id, "not_found", "user not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    let mut sets: Vec<&'static str> = Vec::new();
    let mut vals: Vec<Value> = Vec::new();

    if let Some(name) = optional_str(req, "name") {
        let name = name.trim().to_string();
        if name.is_empty() {
            return err(&req.id, "bad_params", "name must not be empty", None);
        }
        sets.push("name = ?");
        vals.push(Value::Text(name));
    }
    if let Some(email) = optional_str(req, "email") {
        let email = email.trim().to_string();
        if email.is_empty() {
            return err(&req.id, "bad_params", "email must not be empty", None);
        }
        sets.push("email = ?");
        vals.push(Value::Text(email));
    }
    if let Some(v) = optional_str(req, "phone") {
        sets.push("phone = ?");
        vals.push(Value::Text(v));
    }
    if let Some(raw) = optional_str(req, "role") {
        let Some(r) = UserRole::parse(&raw) else {
            return err(&req.id, "bad_params", format!("unknown role: {}", raw), None);
        };
        sets.push("role = ?");
        vals.push(Value::Text(r.as_str().to_string()));
    }
    if let Some(v) = optional_str(req, "department") {
        sets.push("department = ?");
        vals.push(Value::Text(v));
    }
    if let Some(v) = optional_str(req, "avatar") {
        sets.push("avatar = ?");
        vals.push(Value::Text(v));
    }
    if let Some(raw) = optional_str(req, "responsibilities") {
        // Same comma-separated parsing rule as create.
        let parsed = parse_responsibilities(&raw);
        let encoded = match serde_json::to_string(&parsed) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
        };
        sets.push("responsibilities = ?");
        vals.push(Value::Text(encoded));
    }

    if sets.is_empty() {
        return err(&req.id, "bad_params", "nothing to update", None);
    }
    vals.push(Value::Text(user_id.clone()));

    let sql = format!("UPDATE users SET {} WHERE id = ?", sets.join(", "));
    if let Err(e) = conn.execute(&sql, params_from_iter(vals)) {
        if is_unique_violation(&e) {
            return err(&req.id, "email_in_use", "email already in use", None);
        }
        tracing::warn!(error = %e, "staff update failed");
        return err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "table": "users" })),
        );
    }

    let updated = match model::load_user(conn, &user_id) {
        Ok(Some(u)) => u,
        Ok(None) => return err(&req.id, "not_found", "user not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // Editing the logged-in user must not leave the persisted session stale.
    if session.id == updated.id {
        if let Err(e) = db::settings_set_json(conn, SESSION_USER_KEY, &updated.to_json()) {
            tracing::warn!(error = ?e, "session refresh failed");
        }
        state.view.current_user = Some(updated.clone());
    }

    ok(&req.id, json!({ "user": updated.to_json() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "staff.list" => Some(handle_staff_list(state, req)),
        "staff.get" => Some(handle_staff_get(state, req)),
        "staff.create" => Some(handle_staff_create(state, req)),
        "staff.update" => Some(handle_staff_update(state, req)),
        _ => None,
    }
}
