use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;

use crate::model::User;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Task-modal state: open flag plus the edit target (absent for "create")
/// and an optional teacher preselected in the assignee dropdown.
#[derive(Debug, Clone, Default)]
pub struct TaskModalState {
    pub open: bool,
    pub task_id: Option<String>,
    pub preselected_teacher_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StaffModalState {
    pub open: bool,
    pub user_id: Option<String>,
}

/// Session-scoped view state. Only `current_user` survives a restart (via the
/// settings table); everything else resets with the process.
#[derive(Debug, Clone)]
pub struct ViewState {
    pub current_user: Option<User>,
    pub current_view: String,
    pub active_task_id: Option<String>,
    pub online: bool,
    pub task_modal: TaskModalState,
    pub staff_modal: StaffModalState,
    pub task_filter_teacher_id: Option<String>,
}

impl ViewState {
    pub fn new() -> Self {
        ViewState {
            current_user: None,
            current_view: "dashboard".to_string(),
            active_task_id: None,
            online: true,
            task_modal: TaskModalState::default(),
            staff_modal: StaffModalState::default(),
            task_filter_teacher_id: None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "currentUser": self.current_user.as_ref().map(|u| u.to_json()),
            "currentView": self.current_view,
            "activeTaskId": self.active_task_id,
            "online": self.online,
            "taskModal": {
                "open": self.task_modal.open,
                "taskId": self.task_modal.task_id,
                "preselectedTeacherId": self.task_modal.preselected_teacher_id,
            },
            "staffModal": {
                "open": self.staff_modal.open,
                "userId": self.staff_modal.user_id,
            },
            "taskFilterTeacherId": self.task_filter_teacher_id,
        })
    }
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub view: ViewState,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            workspace: None,
            db: None,
            view: ViewState::new(),
        }
    }
}
