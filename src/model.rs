use rusqlite::{Connection, OptionalExtension, Row};
use serde_json::json;

/// Settings key the logged-in user is persisted under. The stored object is
/// the user record verbatim; its presence alone restores the session.
pub const SESSION_USER_KEY: &str = "session.currentUser";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRole {
    Admin,
    Hod,
    Teacher,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::Hod => "HOD",
            UserRole::Teacher => "TEACHER",
        }
    }

    pub fn parse(s: &str) -> Option<UserRole> {
        match s {
            "ADMIN" => Some(UserRole::Admin),
            "HOD" => Some(UserRole::Hod),
            "TEACHER" => Some(UserRole::Teacher),
            _ => None,
        }
    }

    /// ADMIN and HOD get cross-teacher visibility and assignment rights.
    pub fn is_overseer(self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Hod)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskPriority::Low => "LOW",
            TaskPriority::Medium => "MEDIUM",
            TaskPriority::High => "HIGH",
        }
    }

    pub fn parse(s: &str) -> Option<TaskPriority> {
        match s {
            "LOW" => Some(TaskPriority::Low),
            "MEDIUM" => Some(TaskPriority::Medium),
            "HIGH" => Some(TaskPriority::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Todo,
    InProgress,
    // Declared and storable, but no operation transitions into it; rows
    // carrying it only exist via direct data edits.
    AwaitingReview,
    Done,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "TODO",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::AwaitingReview => "AWAITING_REVIEW",
            TaskStatus::Done => "DONE",
        }
    }

    pub fn parse(s: &str) -> Option<TaskStatus> {
        match s {
            "TODO" => Some(TaskStatus::Todo),
            "IN_PROGRESS" => Some(TaskStatus::InProgress),
            "AWAITING_REVIEW" => Some(TaskStatus::AwaitingReview),
            "DONE" => Some(TaskStatus::Done),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    pub department: Option<String>,
    pub avatar: String,
    pub responsibilities: Vec<String>,
}

impl User {
    pub fn to_json(&self) -> serde_json::Value {
        let mut v = json!({
            "id": self.id,
            "name": self.name,
            "email": self.email,
            "role": self.role.as_str(),
            "avatar": self.avatar,
            "responsibilities": self.responsibilities,
        });
        if let Some(p) = &self.password {
            v["password"] = json!(p);
        }
        if let Some(p) = &self.phone {
            v["phone"] = json!(p);
        }
        if let Some(d) = &self.department {
            v["department"] = json!(d);
        }
        v
    }

    pub fn from_json(v: &serde_json::Value) -> Option<User> {
        Some(User {
            id: v.get("id")?.as_str()?.to_string(),
            name: v.get("name")?.as_str()?.to_string(),
            email: v.get("email")?.as_str()?.to_string(),
            password: v
                .get("password")
                .and_then(|p| p.as_str())
                .map(|p| p.to_string()),
            phone: v.get("phone").and_then(|p| p.as_str()).map(|p| p.to_string()),
            role: UserRole::parse(v.get("role")?.as_str()?)?,
            department: v
                .get("department")
                .and_then(|d| d.as_str())
                .map(|d| d.to_string()),
            avatar: v.get("avatar")?.as_str()?.to_string(),
            responsibilities: v
                .get("responsibilities")
                .and_then(|r| r.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|e| e.as_str().map(|s| s.to_string()))
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct TaskNote {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub content: String,
    pub created_at: i64,
}

impl TaskNote {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "userId": self.user_id,
            "userName": self.user_name,
            "content": self.content,
            "createdAt": self.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TaskAttachment {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub url: String,
}

impl TaskAttachment {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "name": self.name,
            "type": self.kind,
            "url": self.url,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub subject: String,
    pub grade: String,
    pub assigned_teacher_id: String,
    pub due_date: i64,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub progress: i64,
    pub last_updated: i64,
    pub synced: bool,
}

impl Task {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "title": self.title,
            "description": self.description,
            "subject": self.subject,
            "grade": self.grade,
            "assignedTeacherId": self.assigned_teacher_id,
            "dueDate": self.due_date,
            "priority": self.priority.as_str(),
            "status": self.status.as_str(),
            "progress": self.progress,
            "lastUpdated": self.last_updated,
            "synced": self.synced,
        })
    }
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn placeholder_avatar(name: &str) -> String {
    format!("https://api.dicebear.com/7.x/avataaars/svg?seed={}", name)
}

/// Comma-separated responsibilities input, trimmed, empty entries dropped.
pub fn parse_responsibilities(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect()
}

const USER_COLUMNS: &str =
    "id, name, email, password, phone, role, department, avatar, responsibilities";

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    let role_raw: String = row.get(5)?;
    let resp_raw: String = row.get(8)?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        phone: row.get(4)?,
        role: UserRole::parse(&role_raw).unwrap_or(UserRole::Teacher),
        department: row.get(6)?,
        avatar: row.get(7)?,
        responsibilities: serde_json::from_str(&resp_raw).unwrap_or_default(),
    })
}

pub fn load_user(conn: &Connection, id: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
        [id],
        user_from_row,
    )
    .optional()
}

pub fn load_user_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS),
        [email],
        user_from_row,
    )
    .optional()
}

pub fn load_all_users(conn: &Connection) -> rusqlite::Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users ORDER BY name",
        USER_COLUMNS
    ))?;
    let rows = stmt.query_map([], user_from_row)?;
    rows.collect()
}

const TASK_COLUMNS: &str = "id, title, description, subject, grade, assigned_teacher_id, \
     due_date, priority, status, progress, last_updated, synced";

fn task_from_row(row: &Row) -> rusqlite::Result<Task> {
    let priority_raw: String = row.get(7)?;
    let status_raw: String = row.get(8)?;
    let synced: i64 = row.get(11)?;
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        subject: row.get(3)?,
        grade: row.get(4)?,
        assigned_teacher_id: row.get(5)?,
        due_date: row.get(6)?,
        priority: TaskPriority::parse(&priority_raw).unwrap_or(TaskPriority::Medium),
        status: TaskStatus::parse(&status_raw).unwrap_or(TaskStatus::Todo),
        progress: row.get(9)?,
        last_updated: row.get(10)?,
        synced: synced != 0,
    })
}

pub fn load_task(conn: &Connection, id: &str) -> rusqlite::Result<Option<Task>> {
    conn.query_row(
        &format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS),
        [id],
        task_from_row,
    )
    .optional()
}

/// All tasks, optionally scoped to one assignee, due-date ascending.
pub fn load_tasks(conn: &Connection, teacher_id: Option<&str>) -> rusqlite::Result<Vec<Task>> {
    match teacher_id {
        Some(tid) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tasks WHERE assigned_teacher_id = ? ORDER BY due_date",
                TASK_COLUMNS
            ))?;
            let rows = stmt.query_map([tid], task_from_row)?;
            rows.collect()
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tasks ORDER BY due_date",
                TASK_COLUMNS
            ))?;
            let rows = stmt.query_map([], task_from_row)?;
            rows.collect()
        }
    }
}

/// Notes render newest-first; storage order itself is append.
pub fn load_task_notes(conn: &Connection, task_id: &str) -> rusqlite::Result<Vec<TaskNote>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, user_name, content, created_at
         FROM task_notes WHERE task_id = ?
         ORDER BY created_at DESC, id",
    )?;
    let rows = stmt.query_map([task_id], |row| {
        Ok(TaskNote {
            id: row.get(0)?,
            user_id: row.get(1)?,
            user_name: row.get(2)?,
            content: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;
    rows.collect()
}

pub fn load_task_attachments(
    conn: &Connection,
    task_id: &str,
) -> rusqlite::Result<Vec<TaskAttachment>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, type, url FROM task_attachments
         WHERE task_id = ? ORDER BY sort_order",
    )?;
    let rows = stmt.query_map([task_id], |row| {
        Ok(TaskAttachment {
            id: row.get(0)?,
            name: row.get(1)?,
            kind: row.get(2)?,
            url: row.get(3)?,
        })
    })?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn responsibilities_trim_and_drop_empty() {
        assert_eq!(
            parse_responsibilities("Lab Safety,  Debate Coach ,"),
            vec!["Lab Safety".to_string(), "Debate Coach".to_string()]
        );
        assert!(parse_responsibilities("  , ,").is_empty());
        assert!(parse_responsibilities("").is_empty());
    }

    #[test]
    fn status_tokens_roundtrip() {
        for s in [
            TaskStatus::Todo,
            TaskStatus::InProgress,
            TaskStatus::AwaitingReview,
            TaskStatus::Done,
        ] {
            assert_eq!(TaskStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(TaskStatus::parse("SHIPPED"), None);
    }

    #[test]
    fn overseer_roles() {
        assert!(UserRole::Admin.is_overseer());
        assert!(UserRole::Hod.is_overseer());
        assert!(!UserRole::Teacher.is_overseer());
    }

    #[test]
    fn user_json_roundtrip_keeps_session_fields() {
        let u = User {
            id: "u9".into(),
            name: "Priya Nair".into(),
            email: "priya@apex.edu".into(),
            password: Some("hunter2".into()),
            phone: None,
            role: UserRole::Hod,
            department: Some("Mathematics".into()),
            avatar: placeholder_avatar("Priya Nair"),
            responsibilities: vec!["Timetabling".into()],
        };
        let back = User::from_json(&u.to_json()).expect("roundtrip");
        assert_eq!(back.id, u.id);
        assert_eq!(back.password.as_deref(), Some("hunter2"));
        assert_eq!(back.role, UserRole::Hod);
        assert_eq!(back.responsibilities, u.responsibilities);
    }
}
