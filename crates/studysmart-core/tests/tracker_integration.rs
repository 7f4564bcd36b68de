//! End-to-end timer subsystem tests against an on-disk database.
//!
//! Runs the whole stack -- tracker, service actor, aggregator, reactive
//! store -- on a paused Tokio clock so tick counts are exact.

use std::sync::Arc;
use std::time::Duration;

use studysmart_core::storage::{Database, StudyStore};
use studysmart_core::timer::{ControlCommand, StudyTracker, SubjectRef, TimerPhase, TrackerConfig};
use studysmart_core::{CoreError, SessionError, Subject};

fn open_store(dir: &tempfile::TempDir) -> Arc<StudyStore> {
    let db = Database::open_at(&dir.path().join("studysmart.db")).expect("open database");
    Arc::new(StudyStore::new(db).expect("load store"))
}

async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn full_session_is_committed_and_published() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let subject_id = store
        .upsert_subject(&Subject {
            id: None,
            name: "Algebra".into(),
            goal_hours: 10.0,
        })
        .unwrap();
    let subject = SubjectRef {
        id: Some(subject_id),
        name: "Algebra".into(),
    };

    let tracker = StudyTracker::new(store.clone(), TrackerConfig::default());
    let handle = tracker.subscribe();
    tracker.select_subject(Some(subject.clone()));
    settle().await;

    // The aggregator has everything it needs before the timer even runs.
    let view = handle.current().expect("view emitted");
    assert_eq!(view.subjects.len(), 1);
    assert_eq!(view.selected_subject_id, Some(subject_id));
    assert_eq!(view.timer.phase, TimerPhase::Idle);

    handle.controls().send(ControlCommand::Start);
    tokio::time::sleep(Duration::from_millis(40_400)).await;

    let record = handle.finish(Some(subject)).await.unwrap();
    assert_eq!(record.duration_secs, 40);
    assert_eq!(record.subject_id, Some(subject_id));
    assert_eq!(record.subject_name, "Algebra");

    // Committed through the store, so the view re-emitted with the
    // fresh session list.
    settle().await;
    let view = handle.current().unwrap();
    assert_eq!(view.sessions.len(), 1);
    assert_eq!(view.sessions[0].duration_secs, 40);
    assert_eq!(view.timer.phase, TimerPhase::Finished);

    // And it is durable: visible through a second connection.
    let db = Database::open_at(&dir.path().join("studysmart.db")).unwrap();
    let sessions = db.all_sessions().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].duration_secs, 40);
}

#[tokio::test(start_paused = true)]
async fn short_session_is_rejected_and_nothing_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let tracker = StudyTracker::new(store.clone(), TrackerConfig::default());
    let handle = tracker.subscribe();

    handle.controls().send(ControlCommand::Start);
    tokio::time::sleep(Duration::from_millis(10_400)).await;

    let err = handle.finish(None).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Session(SessionError::TooShort {
            elapsed_secs: 10,
            ..
        })
    ));
    assert_eq!(handle.timer_snapshot().phase, TimerPhase::Idle);

    settle().await;
    let db = Database::open_at(&dir.path().join("studysmart.db")).unwrap();
    assert!(db.all_sessions().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancelled_session_leaves_no_trace() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(&dir);
    let tracker = StudyTracker::new(store, TrackerConfig::default());
    let handle = tracker.subscribe();

    handle.controls().send(ControlCommand::Start);
    handle.controls().send(ControlCommand::Cancel);
    settle().await;

    let snap = handle.timer_snapshot();
    assert_eq!(snap.phase, TimerPhase::Cancelled);
    assert_eq!(snap.elapsed_secs, 0);

    let db = Database::open_at(&dir.path().join("studysmart.db")).unwrap();
    assert!(db.all_sessions().unwrap().is_empty());
}
