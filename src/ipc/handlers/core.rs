use std::path::PathBuf;

use serde_json::json;

use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{User, SESSION_USER_KEY};
use crate::seed;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let conn = match db::open_db(&path) {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = ?e, "workspace open failed");
            return err(&req.id, "db_open_failed", format!("{e:?}"), None);
        }
    };

    // Empty stores are bootstrapped before any UI read happens.
    if let Err(e) = seed::ensure_seeded(&conn) {
        tracing::warn!(error = ?e, "seeding failed");
        return err(&req.id, "seed_failed", format!("{e:?}"), None);
    }

    // Best-effort session restore; a stale or unreadable record just means
    // the UI shows the login surface again.
    let restored = db::settings_get_json(&conn, SESSION_USER_KEY)
        .ok()
        .flatten()
        .as_ref()
        .and_then(User::from_json);

    state.workspace = Some(path.clone());
    state.db = Some(conn);
    state.view.current_user = restored;

    tracing::info!(path = %path.display(), "workspace selected");
    ok(
        &req.id,
        json!({
            "workspacePath": path.to_string_lossy(),
            "currentUser": state.view.current_user.as_ref().map(|u| u.to_json()),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
