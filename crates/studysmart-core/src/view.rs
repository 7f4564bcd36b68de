//! Reactive view-state aggregation.
//!
//! An explicit fan-in over the independently-updating sources: persisted
//! subjects, persisted sessions, the live timer snapshot, and the current
//! subject selection. Combine-latest semantics: every source change
//! produces a fresh immutable [`ViewState`] built from the last-known
//! value of every source. Nothing is emitted until both persisted
//! collections have produced an initial value.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::model::{SessionRecord, Subject};
use crate::timer::{SubjectRef, TimerSnapshot};

/// One coherent snapshot of everything an observer needs. Rebuilt as a
/// new value on every contributing input change, never mutated in place.
#[derive(Debug, Clone)]
pub struct ViewState {
    pub subjects: Arc<Vec<Subject>>,
    pub sessions: Arc<Vec<SessionRecord>>,
    pub timer: TimerSnapshot,
    pub selected_subject_id: Option<i64>,
}

pub(crate) fn spawn_aggregator(
    mut subjects: watch::Receiver<Option<Arc<Vec<Subject>>>>,
    mut sessions: watch::Receiver<Option<Arc<Vec<SessionRecord>>>>,
    mut timer: watch::Receiver<TimerSnapshot>,
    mut selection: watch::Receiver<Option<SubjectRef>>,
) -> (watch::Receiver<Option<ViewState>>, JoinHandle<()>) {
    let (out_tx, out_rx) = watch::channel(None);
    let task = tokio::spawn(async move {
        loop {
            // Recompute from the latest value of every source. A source
            // that has not emitted yet (`None` collection) gates output.
            {
                let subjects_now = subjects.borrow_and_update().clone();
                let sessions_now = sessions.borrow_and_update().clone();
                let timer_now = *timer.borrow_and_update();
                let selected = selection.borrow_and_update().clone();
                if let (Some(subjects_now), Some(sessions_now)) = (subjects_now, sessions_now) {
                    out_tx.send_replace(Some(ViewState {
                        subjects: subjects_now,
                        sessions: sessions_now,
                        timer: timer_now,
                        selected_subject_id: selected.and_then(|s| s.id),
                    }));
                }
            }
            // Wake on whichever source changes first; a closed source
            // means the surrounding subsystem is tearing down.
            let closed = tokio::select! {
                res = subjects.changed() => res.is_err(),
                res = sessions.changed() => res.is_err(),
                res = timer.changed() => res.is_err(),
                res = selection.changed() => res.is_err(),
            };
            if closed {
                break;
            }
        }
    });
    (out_rx, task)
}
