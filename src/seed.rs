use rusqlite::Connection;

use crate::model::now_ms;

const DAY_MS: i64 = 86_400_000;

/// Local demo credential shared by the seeded roster; without it no overseer
/// could ever log in to a fresh workspace.
const DEMO_PASSWORD: &str = "apex123";

struct SeedUser {
    id: &'static str,
    name: &'static str,
    email: &'static str,
    phone: &'static str,
    role: &'static str,
    department: &'static str,
    responsibilities: &'static [&'static str],
}

const ROSTER: &[SeedUser] = &[
    SeedUser {
        id: "u1",
        name: "Sarah Mitchell",
        email: "sarah@apex.edu",
        phone: "+1 (555) 123-4567",
        role: "ADMIN",
        department: "Administration",
        responsibilities: &["School Strategy", "Budget Oversight", "Staff Hiring"],
    },
    SeedUser {
        id: "u2",
        name: "James Wilson",
        email: "james@apex.edu",
        phone: "+1 (555) 234-5678",
        role: "HOD",
        department: "Science",
        responsibilities: &["Curriculum Design", "Lab Safety", "Department Mentorship"],
    },
    SeedUser {
        id: "u3",
        name: "David Chen",
        email: "david@apex.edu",
        phone: "+1 (555) 345-6789",
        role: "TEACHER",
        department: "Science",
        responsibilities: &["Physics Lab Management", "Robotics Club Lead", "11th Grade Tutor"],
    },
    SeedUser {
        id: "u4",
        name: "Elena Rodriguez",
        email: "elena@apex.edu",
        phone: "+1 (555) 456-7890",
        role: "TEACHER",
        department: "English",
        responsibilities: &["Yearbook Editor", "Creative Writing Workshop", "Debate Coach"],
    },
    SeedUser {
        id: "u5",
        name: "Marcus Thorne",
        email: "marcus@apex.edu",
        phone: "+1 (555) 567-8901",
        role: "TEACHER",
        department: "Mathematics",
        responsibilities: &["Math Olympiad Training", "Calculus Lead", "Data Analysis Support"],
    },
];

struct SeedTask {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    subject: &'static str,
    grade: &'static str,
    assigned_teacher_id: &'static str,
    due_offset_ms: i64,
    priority: &'static str,
    status: &'static str,
    progress: i64,
    updated_offset_ms: i64,
}

const DEMO_TASKS: &[SeedTask] = &[
    SeedTask {
        id: "t1",
        title: "Prepare Physics Lab: Optics",
        description: "Set up lenses and lasers for the 11th grade afternoon session.",
        subject: "Physics",
        grade: "11th Grade",
        assigned_teacher_id: "u3",
        due_offset_ms: DAY_MS,
        priority: "HIGH",
        status: "IN_PROGRESS",
        progress: 45,
        updated_offset_ms: 0,
    },
    SeedTask {
        id: "t2",
        title: "Grade Creative Writing Essays",
        description: "Review the 500-word essays from 10B.",
        subject: "English",
        grade: "10th Grade",
        assigned_teacher_id: "u4",
        due_offset_ms: -DAY_MS,
        priority: "MEDIUM",
        status: "TODO",
        progress: 0,
        updated_offset_ms: -500_000_000,
    },
    SeedTask {
        id: "t3",
        title: "Math Olympiad Registration",
        description: "Finalize student list and register for the national qualifiers.",
        subject: "Math",
        grade: "9th-12th Grade",
        assigned_teacher_id: "u5",
        due_offset_ms: 2 * DAY_MS,
        priority: "HIGH",
        status: "IN_PROGRESS",
        progress: 70,
        updated_offset_ms: 0,
    },
    SeedTask {
        id: "t4",
        title: "Quarterly Curriculum Review",
        description: "Review English literature selection for next term.",
        subject: "English",
        grade: "All Grades",
        assigned_teacher_id: "u4",
        due_offset_ms: 7 * DAY_MS,
        priority: "LOW",
        status: "TODO",
        progress: 0,
        updated_offset_ms: 0,
    },
];

/// Bootstraps an empty store with the demo roster and tasks. A non-empty
/// users collection means a real workspace; leave it alone.
pub fn ensure_seeded(conn: &Connection) -> anyhow::Result<()> {
    let users_count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
    if users_count > 0 {
        return Ok(());
    }

    let now = now_ms();
    let tx = conn.unchecked_transaction()?;

    for u in ROSTER {
        tx.execute(
            "INSERT INTO users(id, name, email, password, phone, role, department, avatar, responsibilities)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                u.id,
                u.name,
                u.email,
                DEMO_PASSWORD,
                u.phone,
                u.role,
                u.department,
                crate::model::placeholder_avatar(u.name),
                serde_json::to_string(u.responsibilities)?,
            ),
        )?;
    }

    for t in DEMO_TASKS {
        tx.execute(
            "INSERT INTO tasks(id, title, description, subject, grade, assigned_teacher_id,
                               due_date, priority, status, progress, last_updated, synced)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
            (
                t.id,
                t.title,
                t.description,
                t.subject,
                t.grade,
                t.assigned_teacher_id,
                now + t.due_offset_ms,
                t.priority,
                t.status,
                t.progress,
                now + t.updated_offset_ms,
            ),
        )?;
    }

    tx.execute(
        "INSERT INTO task_notes(id, task_id, user_id, user_name, content, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            "c1",
            "t1",
            "u3",
            "David Chen",
            "Checking inventory for lasers.",
            now - 3_600_000,
        ),
    )?;

    tx.execute(
        "INSERT INTO task_attachments(id, task_id, name, type, url, sort_order)
         VALUES(?, ?, ?, ?, ?, 0)",
        ("a1", "t1", "Optics_Guide.pdf", "pdf", "#"),
    )?;

    tx.commit()?;
    tracing::info!(users = ROSTER.len(), tasks = DEMO_TASKS.len(), "seeded empty workspace");
    Ok(())
}
