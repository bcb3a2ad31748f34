use crate::model::{Task, TaskPriority, TaskStatus, User, UserRole};

/// Derived, never persisted: past due and not finished.
pub fn is_overdue(task: &Task, now: i64) -> bool {
    task.due_date < now && task.status != TaskStatus::Done
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBuckets {
    pub pending: usize,
    pub in_progress: usize,
    pub done: usize,
    pub overdue: usize,
}

/// Chart/quick-stat buckets. Overdue overlaps the status buckets: an overdue
/// TODO task counts in both `pending` and `overdue`.
pub fn status_buckets(tasks: &[Task], now: i64) -> StatusBuckets {
    StatusBuckets {
        pending: tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Todo)
            .count(),
        in_progress: tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .count(),
        done: tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Done)
            .count(),
        overdue: tasks.iter().filter(|t| is_overdue(t, now)).count(),
    }
}

#[derive(Debug, Clone)]
pub struct WorkloadRow {
    pub teacher_id: String,
    pub name: String,
    pub active_count: usize,
}

/// Per teacher-role user, how many of their tasks are not DONE.
pub fn teacher_workload(tasks: &[Task], users: &[User]) -> Vec<WorkloadRow> {
    users
        .iter()
        .filter(|u| u.role == UserRole::Teacher)
        .map(|u| WorkloadRow {
            teacher_id: u.id.clone(),
            name: u.name.clone(),
            active_count: tasks
                .iter()
                .filter(|t| t.assigned_teacher_id == u.id && t.status != TaskStatus::Done)
                .count(),
        })
        .collect()
}

/// round(done / total * 100); 0 for an empty slice.
pub fn completion_rate(tasks: &[Task]) -> i64 {
    if tasks.is_empty() {
        return 0;
    }
    let done = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Done)
        .count();
    ((done as f64) * 100.0 / (tasks.len() as f64)).round() as i64
}

/// High priority or overdue, soonest deadline first, capped at `limit`.
pub fn critical_tasks<'a>(tasks: &'a [Task], now: i64, limit: usize) -> Vec<&'a Task> {
    let mut critical: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.priority == TaskPriority::High || is_overdue(t, now))
        .collect();
    critical.sort_by_key(|t| t.due_date);
    critical.truncate(limit);
    critical
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskPriority;

    fn task(id: &str, teacher: &str, due: i64, priority: TaskPriority, status: TaskStatus) -> Task {
        Task {
            id: id.to_string(),
            title: format!("task {}", id),
            description: String::new(),
            subject: String::new(),
            grade: String::new(),
            assigned_teacher_id: teacher.to_string(),
            due_date: due,
            priority,
            status,
            progress: 0,
            last_updated: 0,
            synced: true,
        }
    }

    #[test]
    fn overdue_requires_unfinished_status() {
        let now = 1_000_000;
        let late = task("t1", "u3", now - 1, TaskPriority::Medium, TaskStatus::InProgress);
        assert!(is_overdue(&late, now));

        let done = task("t2", "u3", now - 1, TaskPriority::Medium, TaskStatus::Done);
        assert!(!is_overdue(&done, now));

        let future = task("t3", "u3", now + 1, TaskPriority::Medium, TaskStatus::Todo);
        assert!(!is_overdue(&future, now));
    }

    #[test]
    fn buckets_overlap_on_overdue() {
        let now = 1_000_000;
        let tasks = vec![
            task("t1", "u3", now - 5, TaskPriority::Low, TaskStatus::Todo),
            task("t2", "u3", now + 5, TaskPriority::Low, TaskStatus::InProgress),
            task("t3", "u4", now - 5, TaskPriority::Low, TaskStatus::Done),
        ];
        let b = status_buckets(&tasks, now);
        assert_eq!(b.pending, 1);
        assert_eq!(b.in_progress, 1);
        assert_eq!(b.done, 1);
        // t1 is both pending and overdue; the finished t3 is not overdue.
        assert_eq!(b.overdue, 1);
    }

    #[test]
    fn completion_rate_rounds_and_handles_empty() {
        assert_eq!(completion_rate(&[]), 0);

        let now = 0;
        let tasks = vec![
            task("t1", "u3", now, TaskPriority::Low, TaskStatus::Done),
            task("t2", "u3", now, TaskPriority::Low, TaskStatus::Todo),
            task("t3", "u3", now, TaskPriority::Low, TaskStatus::Todo),
        ];
        // 1/3 => 33.33.. => 33
        assert_eq!(completion_rate(&tasks), 33);

        let two_of_three = vec![
            task("t1", "u3", now, TaskPriority::Low, TaskStatus::Done),
            task("t2", "u3", now, TaskPriority::Low, TaskStatus::Done),
            task("t3", "u3", now, TaskPriority::Low, TaskStatus::Todo),
        ];
        // 2/3 => 66.66.. => 67
        assert_eq!(completion_rate(&two_of_three), 67);
    }

    #[test]
    fn critical_list_sorted_and_capped() {
        let now = 1_000_000;
        let mut tasks = Vec::new();
        for i in 0..10 {
            tasks.push(task(
                &format!("t{}", i),
                "u3",
                now + 100 - i, // descending due dates
                TaskPriority::High,
                TaskStatus::Todo,
            ));
        }
        // A low-priority on-time task never makes the list.
        tasks.push(task("calm", "u4", now + 999, TaskPriority::Low, TaskStatus::Todo));

        let crit = critical_tasks(&tasks, now, 8);
        assert_eq!(crit.len(), 8);
        for pair in crit.windows(2) {
            assert!(pair[0].due_date <= pair[1].due_date);
        }
        assert!(crit.iter().all(|t| t.id != "calm"));
    }

    #[test]
    fn workload_counts_unfinished_per_teacher_only() {
        let now = 0;
        let users = vec![
            crate::model::User {
                id: "u1".into(),
                name: "Sarah Mitchell".into(),
                email: "sarah@apex.edu".into(),
                password: None,
                phone: None,
                role: UserRole::Admin,
                department: Some("Administration".into()),
                avatar: String::new(),
                responsibilities: vec![],
            },
            crate::model::User {
                id: "u3".into(),
                name: "David Chen".into(),
                email: "david@apex.edu".into(),
                password: None,
                phone: None,
                role: UserRole::Teacher,
                department: Some("Science".into()),
                avatar: String::new(),
                responsibilities: vec![],
            },
        ];
        let tasks = vec![
            task("t1", "u3", now, TaskPriority::Low, TaskStatus::Todo),
            task("t2", "u3", now, TaskPriority::Low, TaskStatus::Done),
            task("t3", "u1", now, TaskPriority::Low, TaskStatus::Todo),
        ];
        let rows = teacher_workload(&tasks, &users);
        // Admins are not charted.
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].teacher_id, "u3");
        assert_eq!(rows[0].active_count, 1);
    }
}
