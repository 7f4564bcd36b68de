//! Persisted domain entities: subjects, tasks, and study sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A subject being studied, with a study-hours goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    /// Database row id; `None` until first persisted.
    pub id: Option<i64>,
    pub name: String,
    pub goal_hours: f64,
}

/// Task priority, stored as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_i64(self) -> i64 {
        match self {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
        }
    }

    /// Unknown values fall back to `Medium`.
    pub fn from_i64(value: i64) -> Self {
        match value {
            0 => Priority::Low,
            2 => Priority::High,
            _ => Priority::Medium,
        }
    }
}

/// A task attached to a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Option<i64>,
    pub subject_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub is_complete: bool,
}

/// A committed study session.
///
/// Created once per successful timer finish and thereafter owned by the
/// storage layer; the timer subsystem never mutates it afterwards.
/// `subject_name` is denormalized so history survives subject deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub subject_id: Option<i64>,
    pub subject_name: String,
    pub started_at: DateTime<Utc>,
    pub duration_secs: u64,
}
