//! Reactive storage wrapper.
//!
//! [`StudyStore`] owns the database and publishes each persisted
//! collection over a watch channel, re-querying after every mutation.
//! These are the data feeds the view aggregator combines; they hold
//! `None` until the initial load so downstream consumers can tell
//! "empty" apart from "not loaded yet".

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::warn;
use tokio::sync::watch;

use crate::error::StorageError;
use crate::model::{SessionRecord, Subject, Task};
use crate::timer::SessionSink;

use super::database::{DashboardStats, Database};

pub struct StudyStore {
    db: Mutex<Database>,
    subjects_tx: watch::Sender<Option<Arc<Vec<Subject>>>>,
    sessions_tx: watch::Sender<Option<Arc<Vec<SessionRecord>>>>,
    tasks_tx: watch::Sender<Option<Arc<Vec<Task>>>>,
}

impl StudyStore {
    /// Wrap a database and perform the initial load of every collection.
    pub fn new(db: Database) -> Result<Self, StorageError> {
        let store = Self {
            db: Mutex::new(db),
            subjects_tx: watch::channel(None).0,
            sessions_tx: watch::channel(None).0,
            tasks_tx: watch::channel(None).0,
        };
        store.reload()?;
        Ok(store)
    }

    /// Open the default on-disk database.
    pub fn open() -> Result<Self, StorageError> {
        Self::new(Database::open()?)
    }

    #[cfg(test)]
    pub(crate) fn open_memory() -> Result<Self, StorageError> {
        Self::new(Database::open_memory()?)
    }

    // ── Feeds ────────────────────────────────────────────────────────

    pub fn watch_subjects(&self) -> watch::Receiver<Option<Arc<Vec<Subject>>>> {
        self.subjects_tx.subscribe()
    }

    pub fn watch_sessions(&self) -> watch::Receiver<Option<Arc<Vec<SessionRecord>>>> {
        self.sessions_tx.subscribe()
    }

    pub fn watch_tasks(&self) -> watch::Receiver<Option<Arc<Vec<Task>>>> {
        self.tasks_tx.subscribe()
    }

    // ── Subjects ─────────────────────────────────────────────────────

    pub fn upsert_subject(&self, subject: &Subject) -> Result<i64, StorageError> {
        let id = self.lock_db().upsert_subject(subject)?;
        self.refresh_subjects();
        Ok(id)
    }

    pub fn subject_by_id(&self, id: i64) -> Result<Option<Subject>, StorageError> {
        self.lock_db().subject_by_id(id)
    }

    pub fn delete_subject(&self, id: i64) -> Result<(), StorageError> {
        self.lock_db().delete_subject(id)?;
        self.refresh_subjects();
        self.refresh_tasks();
        self.refresh_sessions();
        Ok(())
    }

    // ── Tasks ────────────────────────────────────────────────────────

    pub fn upsert_task(&self, task: &Task) -> Result<i64, StorageError> {
        let id = self.lock_db().upsert_task(task)?;
        self.refresh_tasks();
        Ok(id)
    }

    pub fn task_by_id(&self, id: i64) -> Result<Option<Task>, StorageError> {
        self.lock_db().task_by_id(id)
    }

    pub fn delete_task(&self, id: i64) -> Result<(), StorageError> {
        self.lock_db().delete_task(id)?;
        self.refresh_tasks();
        Ok(())
    }

    // ── Sessions ─────────────────────────────────────────────────────

    pub fn delete_session(&self, id: i64) -> Result<(), StorageError> {
        self.lock_db().delete_session(id)?;
        self.refresh_sessions();
        Ok(())
    }

    pub fn total_session_duration_for_subject(
        &self,
        subject_id: i64,
    ) -> Result<u64, StorageError> {
        self.lock_db().total_session_duration_for_subject(subject_id)
    }

    pub fn stats(&self) -> Result<DashboardStats, StorageError> {
        self.lock_db().stats()
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn lock_db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Initial load; failures abort construction.
    fn reload(&self) -> Result<(), StorageError> {
        let db = self.lock_db();
        let subjects = db.all_subjects()?;
        let sessions = db.all_sessions()?;
        let tasks = db.all_upcoming_tasks()?;
        drop(db);
        self.subjects_tx.send_replace(Some(Arc::new(subjects)));
        self.sessions_tx.send_replace(Some(Arc::new(sessions)));
        self.tasks_tx.send_replace(Some(Arc::new(tasks)));
        Ok(())
    }

    // Post-mutation refreshes are best-effort: the write already landed,
    // a failed re-query only leaves the published view stale.

    fn refresh_subjects(&self) {
        match self.lock_db().all_subjects() {
            Ok(rows) => {
                self.subjects_tx.send_replace(Some(Arc::new(rows)));
            }
            Err(e) => warn!("failed to refresh subjects: {e}"),
        }
    }

    fn refresh_sessions(&self) {
        match self.lock_db().all_sessions() {
            Ok(rows) => {
                self.sessions_tx.send_replace(Some(Arc::new(rows)));
            }
            Err(e) => warn!("failed to refresh sessions: {e}"),
        }
    }

    fn refresh_tasks(&self) {
        match self.lock_db().all_upcoming_tasks() {
            Ok(rows) => {
                self.tasks_tx.send_replace(Some(Arc::new(rows)));
            }
            Err(e) => warn!("failed to refresh tasks: {e}"),
        }
    }
}

impl SessionSink for StudyStore {
    fn record_session(
        &self,
        subject_id: Option<i64>,
        subject_name: &str,
        started_at: DateTime<Utc>,
        duration_secs: u64,
    ) -> Result<SessionRecord, StorageError> {
        let record =
            self.lock_db()
                .insert_session(subject_id, subject_name, started_at, duration_secs)?;
        self.refresh_sessions();
        Ok(record)
    }
}
