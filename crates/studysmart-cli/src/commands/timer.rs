//! Study timer commands.
//!
//! Single-shot commands (`start`, `stop`, `cancel`, `finish`, `status`) run
//! against a timer machine persisted in the database, re-anchored to wall
//! clock time on load so elapsed time keeps counting between invocations.
//! `watch` runs the live subsystem in the foreground instead.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use studysmart_core::storage::Database;
use studysmart_core::timer::FinishOutcome;
use studysmart_core::{
    Config, ControlCommand, StudyStore, StudyTracker, SubjectRef, TimerMachine, TimerPhase,
    TrackerConfig, MIN_SESSION_SECS,
};

const TIMER_KEY: &str = "timer_machine";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start the timer, or resume it when paused
    Start,
    /// Pause the timer
    Stop,
    /// Cancel the timer, discarding any elapsed time
    Cancel,
    /// Finish the session and record it
    Finish {
        /// Subject ID to credit the session to
        #[arg(long)]
        subject: Option<i64>,
    },
    /// Print the current timer state as JSON
    Status,
    /// Run the timer interactively until Ctrl-C
    Watch {
        /// Subject ID to credit the session to
        #[arg(long)]
        subject: Option<i64>,
        /// Start the timer immediately
        #[arg(long)]
        start: bool,
    },
}

#[derive(Serialize, Deserialize)]
struct StoredTimer {
    machine: TimerMachine,
    synced_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
}

impl Default for StoredTimer {
    fn default() -> Self {
        Self {
            machine: TimerMachine::new(),
            synced_at: Utc::now(),
            started_at: None,
        }
    }
}

/// Loads the persisted timer and catches a running machine up to now.
fn load_timer(db: &Database) -> Result<StoredTimer, Box<dyn std::error::Error>> {
    let mut stored = match db.kv_get(TIMER_KEY)? {
        Some(raw) => serde_json::from_str(&raw)?,
        None => StoredTimer::default(),
    };
    let gap = (Utc::now() - stored.synced_at).num_seconds().max(0) as u64;
    if stored.machine.advance(gap) {
        log::debug!("re-anchored running timer by {gap}s");
    }
    Ok(stored)
}

fn save_timer(db: &Database, stored: &StoredTimer) -> Result<(), Box<dyn std::error::Error>> {
    let payload = StoredTimer {
        machine: stored.machine.clone(),
        synced_at: Utc::now(),
        started_at: stored.started_at,
    };
    db.kv_set(TIMER_KEY, &serde_json::to_string(&payload)?)?;
    Ok(())
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TimerAction::Watch { subject, start } => watch(subject, start),
        other => {
            let db = Database::open()?;
            let mut stored = load_timer(&db)?;
            oneshot(&db, &mut stored, other)?;
            save_timer(&db, &stored)?;
            Ok(())
        }
    }
}

fn oneshot(
    db: &Database,
    stored: &mut StoredTimer,
    action: TimerAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TimerAction::Start => {
            let resuming = stored.machine.phase() == TimerPhase::Paused;
            if stored.machine.apply(ControlCommand::Start) {
                if !resuming {
                    stored.started_at = Some(Utc::now());
                }
                println!("Timer started");
            } else {
                println!("Timer already running");
            }
        }
        TimerAction::Stop => {
            if stored.machine.apply(ControlCommand::Stop) {
                println!("Timer paused at {}s", stored.machine.elapsed_secs());
            } else {
                println!("Timer is not running");
            }
        }
        TimerAction::Cancel => {
            if stored.machine.apply(ControlCommand::Cancel) {
                stored.started_at = None;
                println!("Timer cancelled");
            } else {
                println!("Nothing to cancel");
            }
        }
        TimerAction::Finish { subject } => {
            let started_at = stored.started_at.take().unwrap_or_else(Utc::now);
            match stored.machine.finish() {
                FinishOutcome::Inactive => println!("No active session to save"),
                FinishOutcome::TooShort { elapsed_secs } => println!(
                    "Session not saved: {elapsed_secs}s is under the {MIN_SESSION_SECS}s minimum"
                ),
                FinishOutcome::Finished { elapsed_secs } => {
                    let subject_row = match subject {
                        Some(id) => Some(
                            db.subject_by_id(id)?
                                .ok_or_else(|| format!("no subject with id {id}"))?,
                        ),
                        None => None,
                    };
                    let name = subject_row
                        .as_ref()
                        .map(|s| s.name.as_str())
                        .unwrap_or("(no subject)");
                    let record = db.insert_session(
                        subject_row.as_ref().and_then(|s| s.id),
                        name,
                        started_at,
                        elapsed_secs,
                    )?;
                    println!("Session saved: {elapsed_secs}s (id {})", record.id);
                }
            }
        }
        TimerAction::Status => {
            println!(
                "{}",
                serde_json::to_string_pretty(&stored.machine.snapshot())?
            );
        }
        TimerAction::Watch { .. } => unreachable!("handled by run"),
    }
    Ok(())
}

fn watch(subject: Option<i64>, start: bool) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let store = Arc::new(StudyStore::open()?);
        let config = Config::load()?;
        let tracker = StudyTracker::new(store, TrackerConfig::from_config(&config));

        let selected = match subject {
            Some(id) => {
                let db = Database::open()?;
                let row = db
                    .subject_by_id(id)?
                    .ok_or_else(|| format!("no subject with id {id}"))?;
                Some(SubjectRef {
                    id: row.id,
                    name: row.name,
                })
            }
            None => None,
        };
        tracker.select_subject(selected.clone());

        let mut handle = tracker.subscribe();
        if start {
            handle.controls().send(ControlCommand::Start);
        }

        println!("Watching timer (Ctrl-C to finish)");
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                changed = handle.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if let Some(state) = handle.current() {
                        let name = state
                            .selected_subject_id
                            .and_then(|id| state.subjects.iter().find(|s| s.id == Some(id)))
                            .map(|s| s.name.clone())
                            .unwrap_or_else(|| "(no subject)".to_string());
                        println!(
                            "{:?} {}s  subject={name}  sessions={}",
                            state.timer.phase,
                            state.timer.elapsed_secs,
                            state.sessions.len()
                        );
                    }
                }
            }
        }

        match handle.finish(selected).await {
            Ok(record) => println!(
                "Session saved: {}s (id {})",
                record.duration_secs, record.id
            ),
            Err(err) => println!("Session not saved: {err}"),
        }
        Ok(())
    })
}
