//! SQLite-backed persistence.
//!
//! Stores subjects, their tasks, and committed study sessions, plus a
//! small key-value table the CLI uses to carry the timer machine across
//! invocations. The timer subsystem itself never touches this module
//! directly; it goes through the `SessionSink` seam.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::model::{Priority, SessionRecord, Subject, Task};

use super::data_dir;

/// Dashboard totals across all subjects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardStats {
    pub subject_count: u64,
    pub total_goal_hours: f64,
    pub total_studied_secs: u64,
}

/// SQLite database for study data.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/studysmart/studysmart.db`,
    /// creating file and schema if needed.
    pub fn open() -> Result<Self, StorageError> {
        let path = data_dir()?.join("studysmart.db");
        Self::open_at(&path)
    }

    /// Open the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    #[cfg(test)]
    pub(crate) fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS subjects (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    name        TEXT NOT NULL,
                    goal_hours  REAL NOT NULL DEFAULT 1.0
                );

                CREATE TABLE IF NOT EXISTS tasks (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    subject_id  INTEGER NOT NULL,
                    title       TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    due_date    TEXT,
                    priority    INTEGER NOT NULL DEFAULT 1,
                    is_complete INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS sessions (
                    id            INTEGER PRIMARY KEY AUTOINCREMENT,
                    subject_id    INTEGER,
                    subject_name  TEXT NOT NULL DEFAULT '',
                    started_at    TEXT NOT NULL,
                    duration_secs INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_tasks_subject ON tasks(subject_id);
                CREATE INDEX IF NOT EXISTS idx_sessions_subject ON sessions(subject_id);
                CREATE INDEX IF NOT EXISTS idx_sessions_started_at ON sessions(started_at);",
            )
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))
    }

    // ── Subjects ─────────────────────────────────────────────────────

    /// Insert or update a subject; returns its row id.
    pub fn upsert_subject(&self, subject: &Subject) -> Result<i64, StorageError> {
        match subject.id {
            Some(id) => {
                self.conn.execute(
                    "UPDATE subjects SET name = ?1, goal_hours = ?2 WHERE id = ?3",
                    params![subject.name, subject.goal_hours, id],
                )?;
                Ok(id)
            }
            None => {
                self.conn.execute(
                    "INSERT INTO subjects (name, goal_hours) VALUES (?1, ?2)",
                    params![subject.name, subject.goal_hours],
                )?;
                Ok(self.conn.last_insert_rowid())
            }
        }
    }

    pub fn all_subjects(&self) -> Result<Vec<Subject>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, goal_hours FROM subjects ORDER BY name")?;
        let rows = stmt.query_map([], subject_from_row)?;
        collect(rows)
    }

    pub fn subject_by_id(&self, id: i64) -> Result<Option<Subject>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, goal_hours FROM subjects WHERE id = ?1")?;
        optional(stmt.query_row(params![id], subject_from_row))
    }

    /// Delete a subject along with its tasks. Session history is kept,
    /// detached from the subject id (the denormalized name remains).
    pub fn delete_subject(&self, id: i64) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM tasks WHERE subject_id = ?1", params![id])?;
        self.conn.execute(
            "UPDATE sessions SET subject_id = NULL WHERE subject_id = ?1",
            params![id],
        )?;
        self.conn
            .execute("DELETE FROM subjects WHERE id = ?1", params![id])?;
        Ok(())
    }

    // ── Tasks ────────────────────────────────────────────────────────

    pub fn upsert_task(&self, task: &Task) -> Result<i64, StorageError> {
        let due = task.due_date.map(|d| d.to_rfc3339());
        match task.id {
            Some(id) => {
                self.conn.execute(
                    "UPDATE tasks SET subject_id = ?1, title = ?2, description = ?3,
                     due_date = ?4, priority = ?5, is_complete = ?6 WHERE id = ?7",
                    params![
                        task.subject_id,
                        task.title,
                        task.description,
                        due,
                        task.priority.as_i64(),
                        task.is_complete,
                        id
                    ],
                )?;
                Ok(id)
            }
            None => {
                self.conn.execute(
                    "INSERT INTO tasks (subject_id, title, description, due_date, priority, is_complete)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        task.subject_id,
                        task.title,
                        task.description,
                        due,
                        task.priority.as_i64(),
                        task.is_complete
                    ],
                )?;
                Ok(self.conn.last_insert_rowid())
            }
        }
    }

    pub fn task_by_id(&self, id: i64) -> Result<Option<Task>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, subject_id, title, description, due_date, priority, is_complete
             FROM tasks WHERE id = ?1",
        )?;
        optional(stmt.query_row(params![id], task_from_row))
    }

    pub fn delete_task(&self, id: i64) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn upcoming_tasks_for_subject(&self, subject_id: i64) -> Result<Vec<Task>, StorageError> {
        self.tasks_for_subject(subject_id, false)
    }

    pub fn completed_tasks_for_subject(&self, subject_id: i64) -> Result<Vec<Task>, StorageError> {
        self.tasks_for_subject(subject_id, true)
    }

    fn tasks_for_subject(&self, subject_id: i64, complete: bool) -> Result<Vec<Task>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, subject_id, title, description, due_date, priority, is_complete
             FROM tasks WHERE subject_id = ?1 AND is_complete = ?2
             ORDER BY due_date IS NULL, due_date, priority DESC",
        )?;
        let rows = stmt.query_map(params![subject_id, complete], task_from_row)?;
        collect(rows)
    }

    pub fn all_upcoming_tasks(&self) -> Result<Vec<Task>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, subject_id, title, description, due_date, priority, is_complete
             FROM tasks WHERE is_complete = 0
             ORDER BY due_date IS NULL, due_date, priority DESC",
        )?;
        let rows = stmt.query_map([], task_from_row)?;
        collect(rows)
    }

    // ── Sessions ─────────────────────────────────────────────────────

    /// Record a committed study session.
    pub fn insert_session(
        &self,
        subject_id: Option<i64>,
        subject_name: &str,
        started_at: DateTime<Utc>,
        duration_secs: u64,
    ) -> Result<SessionRecord, StorageError> {
        self.conn.execute(
            "INSERT INTO sessions (subject_id, subject_name, started_at, duration_secs)
             VALUES (?1, ?2, ?3, ?4)",
            params![subject_id, subject_name, started_at.to_rfc3339(), duration_secs],
        )?;
        Ok(SessionRecord {
            id: self.conn.last_insert_rowid(),
            subject_id,
            subject_name: subject_name.to_string(),
            started_at,
            duration_secs,
        })
    }

    pub fn delete_session(&self, id: i64) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn all_sessions(&self) -> Result<Vec<SessionRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, subject_id, subject_name, started_at, duration_secs
             FROM sessions ORDER BY started_at DESC",
        )?;
        let rows = stmt.query_map([], session_from_row)?;
        collect(rows)
    }

    pub fn recent_sessions_for_subject(
        &self,
        subject_id: i64,
        limit: u32,
    ) -> Result<Vec<SessionRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, subject_id, subject_name, started_at, duration_secs
             FROM sessions WHERE subject_id = ?1
             ORDER BY started_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![subject_id, limit], session_from_row)?;
        collect(rows)
    }

    pub fn total_session_duration(&self) -> Result<u64, StorageError> {
        let total = self.conn.query_row(
            "SELECT COALESCE(SUM(duration_secs), 0) FROM sessions",
            [],
            |row| row.get::<_, u64>(0),
        )?;
        Ok(total)
    }

    pub fn total_session_duration_for_subject(&self, subject_id: i64) -> Result<u64, StorageError> {
        let total = self.conn.query_row(
            "SELECT COALESCE(SUM(duration_secs), 0) FROM sessions WHERE subject_id = ?1",
            params![subject_id],
            |row| row.get::<_, u64>(0),
        )?;
        Ok(total)
    }

    // ── Stats ────────────────────────────────────────────────────────

    pub fn stats(&self) -> Result<DashboardStats, StorageError> {
        let (subject_count, total_goal_hours) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(goal_hours), 0) FROM subjects",
            [],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, f64>(1)?)),
        )?;
        Ok(DashboardStats {
            subject_count,
            total_goal_hours,
            total_studied_secs: self.total_session_duration()?,
        })
    }

    // ── KV ───────────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        optional(stmt.query_row(params![key], |row| row.get::<_, String>(0)))
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

fn subject_from_row(row: &Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        goal_hours: row.get(2)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: Some(row.get(0)?),
        subject_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        due_date: row
            .get::<_, Option<String>>(4)?
            .and_then(|s| parse_instant(&s)),
        priority: Priority::from_i64(row.get(5)?),
        is_complete: row.get(6)?,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    let started_raw: String = row.get(3)?;
    Ok(SessionRecord {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        subject_name: row.get(2)?,
        started_at: parse_instant(&started_raw).unwrap_or_else(Utc::now),
        duration_secs: row.get(4)?,
    })
}

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn collect<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>, StorageError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn optional<T>(result: rusqlite::Result<T>) -> Result<Option<T>, StorageError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_roundtrip() {
        let db = Database::open_memory().unwrap();
        let id = db
            .upsert_subject(&Subject {
                id: None,
                name: "Maths".into(),
                goal_hours: 10.0,
            })
            .unwrap();

        let subject = db.subject_by_id(id).unwrap().unwrap();
        assert_eq!(subject.name, "Maths");

        db.upsert_subject(&Subject {
            id: Some(id),
            name: "Maths II".into(),
            goal_hours: 12.0,
        })
        .unwrap();
        let subject = db.subject_by_id(id).unwrap().unwrap();
        assert_eq!(subject.name, "Maths II");
        assert_eq!(db.all_subjects().unwrap().len(), 1);
    }

    #[test]
    fn deleting_subject_keeps_session_history() {
        let db = Database::open_memory().unwrap();
        let id = db
            .upsert_subject(&Subject {
                id: None,
                name: "History".into(),
                goal_hours: 5.0,
            })
            .unwrap();
        db.insert_session(Some(id), "History", Utc::now(), 120)
            .unwrap();
        db.upsert_task(&Task {
            id: None,
            subject_id: id,
            title: "Read chapter 3".into(),
            description: String::new(),
            due_date: None,
            priority: Priority::Medium,
            is_complete: false,
        })
        .unwrap();

        db.delete_subject(id).unwrap();
        assert!(db.subject_by_id(id).unwrap().is_none());
        assert!(db.upcoming_tasks_for_subject(id).unwrap().is_empty());

        let sessions = db.all_sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].subject_id, None);
        assert_eq!(sessions[0].subject_name, "History");
    }

    #[test]
    fn task_completion_split() {
        let db = Database::open_memory().unwrap();
        let subject_id = db
            .upsert_subject(&Subject {
                id: None,
                name: "Physics".into(),
                goal_hours: 8.0,
            })
            .unwrap();
        let mut task = Task {
            id: None,
            subject_id,
            title: "Problem set".into(),
            description: "Chapters 1-2".into(),
            due_date: Some(Utc::now()),
            priority: Priority::High,
            is_complete: false,
        };
        let task_id = db.upsert_task(&task).unwrap();
        assert_eq!(db.upcoming_tasks_for_subject(subject_id).unwrap().len(), 1);
        assert!(db.completed_tasks_for_subject(subject_id).unwrap().is_empty());

        task.id = Some(task_id);
        task.is_complete = true;
        db.upsert_task(&task).unwrap();
        assert!(db.upcoming_tasks_for_subject(subject_id).unwrap().is_empty());
        assert_eq!(db.completed_tasks_for_subject(subject_id).unwrap().len(), 1);
    }

    #[test]
    fn session_totals_and_stats() {
        let db = Database::open_memory().unwrap();
        let id = db
            .upsert_subject(&Subject {
                id: None,
                name: "Chemistry".into(),
                goal_hours: 4.0,
            })
            .unwrap();
        db.insert_session(Some(id), "Chemistry", Utc::now(), 40)
            .unwrap();
        db.insert_session(Some(id), "Chemistry", Utc::now(), 60)
            .unwrap();
        db.insert_session(None, "", Utc::now(), 50).unwrap();

        assert_eq!(db.total_session_duration_for_subject(id).unwrap(), 100);
        assert_eq!(db.total_session_duration().unwrap(), 150);

        let stats = db.stats().unwrap();
        assert_eq!(stats.subject_count, 1);
        assert_eq!(stats.total_goal_hours, 4.0);
        assert_eq!(stats.total_studied_secs, 150);

        let recent = db.recent_sessions_for_subject(id, 10).unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("timer").unwrap().is_none());
        db.kv_set("timer", "{}").unwrap();
        assert_eq!(db.kv_get("timer").unwrap().unwrap(), "{}");
    }
}
