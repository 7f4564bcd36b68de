//! Tracker lifecycle.
//!
//! [`StudyTracker`] binds the timer core (service actor + aggregator) to
//! observer demand: the core is spawned lazily on the first subscription
//! and torn down only after the last observer has gone away AND a grace
//! period has elapsed with no new subscriber. Re-subscription inside the
//! window reuses the running core without losing elapsed time, so a
//! transient unsubscribe (configuration change, brief backgrounding) does
//! not reset anything.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::CoreError;
use crate::model::SessionRecord;
use crate::storage::{Config, StudyStore};
use crate::view::{self, ViewState};

use super::machine::TimerSnapshot;
use super::service::{self, ControlHandle, SessionSink, SubjectRef};

/// Tunables for the live tracker.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub tick_interval: Duration,
    pub grace_period: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            grace_period: Duration::from_millis(5000),
        }
    }
}

impl TrackerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            grace_period: config.grace_period(),
        }
    }
}

/// Everything spawned for one activation of the timer core.
struct Core {
    commands: ControlHandle,
    snapshots: watch::Receiver<TimerSnapshot>,
    view: watch::Receiver<Option<ViewState>>,
    service_task: JoinHandle<()>,
    aggregator_task: JoinHandle<()>,
}

#[derive(Default)]
struct Gate {
    observers: usize,
    /// Bumped on every subscribe/last-unsubscribe; a pending teardown
    /// only fires if the epoch it captured is still current.
    epoch: u64,
    core: Option<Core>,
}

struct Inner {
    store: Arc<StudyStore>,
    config: TrackerConfig,
    selection_tx: watch::Sender<Option<SubjectRef>>,
    gate: Mutex<Gate>,
}

/// The study tracker: lifecycle binder and command surface for the timer
/// subsystem. Cheap to clone; all clones share one core.
#[derive(Clone)]
pub struct StudyTracker {
    inner: Arc<Inner>,
}

impl StudyTracker {
    pub fn new(store: Arc<StudyStore>, config: TrackerConfig) -> Self {
        let (selection_tx, _rx) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                store,
                config,
                selection_tx,
                gate: Mutex::new(Gate::default()),
            }),
        }
    }

    /// Select the subject future commits and view states refer to.
    pub fn select_subject(&self, subject: Option<SubjectRef>) {
        self.inner.selection_tx.send_replace(subject);
    }

    /// Subscribe to the aggregated view, starting the timer core if it is
    /// not already running. Must be called within a Tokio runtime.
    pub fn subscribe(&self) -> ViewHandle {
        let mut gate = self.lock_gate();
        gate.observers += 1;
        gate.epoch += 1;
        let core = gate.core.get_or_insert_with(|| {
            info!("timer core started");
            self.spawn_core()
        });
        ViewHandle {
            view: core.view.clone(),
            snapshots: core.snapshots.clone(),
            commands: core.commands.clone(),
            tracker: self.clone(),
            runtime: tokio::runtime::Handle::current(),
        }
    }

    /// Command surface for standalone triggers. `None` while the core is
    /// torn down (commands would have nowhere to go).
    pub fn controls(&self) -> Option<ControlHandle> {
        self.lock_gate().core.as_ref().map(|c| c.commands.clone())
    }

    /// Latest timer snapshot, if the core is live.
    pub fn snapshot(&self) -> Option<TimerSnapshot> {
        self.lock_gate()
            .core
            .as_ref()
            .map(|c| *c.snapshots.borrow())
    }

    fn spawn_core(&self) -> Core {
        let sink: Arc<dyn SessionSink> = self.inner.store.clone();
        let handles = service::spawn(self.inner.config.tick_interval, sink);
        let (view, aggregator_task) = view::spawn_aggregator(
            self.inner.store.watch_subjects(),
            self.inner.store.watch_sessions(),
            handles.snapshots.clone(),
            self.inner.selection_tx.subscribe(),
        );
        Core {
            commands: handles.commands,
            snapshots: handles.snapshots,
            view,
            service_task: handles.task,
            aggregator_task,
        }
    }

    fn lock_gate(&self) -> std::sync::MutexGuard<'_, Gate> {
        self.inner
            .gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn release(&self, runtime: &tokio::runtime::Handle) {
        let mut gate = self.lock_gate();
        gate.observers = gate.observers.saturating_sub(1);
        if gate.observers > 0 {
            return;
        }
        gate.epoch += 1;
        let epoch = gate.epoch;
        drop(gate);

        let tracker = self.clone();
        let grace = self.inner.config.grace_period;
        debug!("last observer gone, teardown in {}ms", grace.as_millis());
        runtime.spawn(async move {
            tokio::time::sleep(grace).await;
            let mut gate = tracker.lock_gate();
            if gate.observers == 0 && gate.epoch == epoch {
                if let Some(core) = gate.core.take() {
                    // Abort is all-or-nothing: the clock and the fan-in
                    // go away together.
                    core.service_task.abort();
                    core.aggregator_task.abort();
                    info!("timer core stopped after grace period");
                }
            }
        });
    }
}

/// An observer of the aggregated view. Dropping the last handle starts
/// the grace-period teardown clock.
pub struct ViewHandle {
    view: watch::Receiver<Option<ViewState>>,
    snapshots: watch::Receiver<TimerSnapshot>,
    commands: ControlHandle,
    tracker: StudyTracker,
    runtime: tokio::runtime::Handle,
}

impl ViewHandle {
    /// Latest aggregated view; `None` until every source has emitted.
    pub fn current(&self) -> Option<ViewState> {
        self.view.borrow().clone()
    }

    /// Wait for the next view emission.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.view.changed().await
    }

    /// Latest timer snapshot (also available through [`Self::current`]).
    pub fn timer_snapshot(&self) -> TimerSnapshot {
        *self.snapshots.borrow()
    }

    pub fn controls(&self) -> ControlHandle {
        self.commands.clone()
    }

    /// Commit the current session. See [`ControlHandle::finish`].
    pub async fn finish(&self, subject: Option<SubjectRef>) -> Result<SessionRecord, CoreError> {
        self.commands.finish(subject).await
    }
}

impl Drop for ViewHandle {
    fn drop(&mut self) {
        let runtime = self.runtime.clone();
        self.tracker.release(&runtime);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{ControlCommand, TimerPhase};
    use tokio::time::{self, Duration};

    fn tracker() -> StudyTracker {
        let store = Arc::new(StudyStore::open_memory().expect("in-memory store"));
        StudyTracker::new(store, TrackerConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn core_starts_on_first_subscribe_only() {
        let tracker = tracker();
        assert!(tracker.controls().is_none());
        assert!(tracker.snapshot().is_none());

        let _handle = tracker.subscribe();
        assert!(tracker.controls().is_some());
        assert_eq!(tracker.snapshot().map(|s| s.phase), Some(TimerPhase::Idle));
    }

    #[tokio::test(start_paused = true)]
    async fn resubscribe_within_grace_reuses_running_state() {
        let tracker = tracker();
        let handle = tracker.subscribe();
        handle.controls().send(ControlCommand::Start);
        time::sleep(Duration::from_millis(5_400)).await;
        handle.controls().send(ControlCommand::Stop);
        time::sleep(Duration::from_millis(100)).await;
        drop(handle);

        // Come back half-way into the 5s grace window.
        time::sleep(Duration::from_millis(2_500)).await;
        let handle = tracker.subscribe();
        let snap = handle.timer_snapshot();
        assert_eq!(snap.phase, TimerPhase::Paused);
        assert_eq!(snap.elapsed_secs, 5);

        // The teardown scheduled at unsubscribe time must not fire now.
        time::sleep(Duration::from_secs(10)).await;
        assert!(tracker.controls().is_some());
        assert_eq!(handle.timer_snapshot().elapsed_secs, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_past_grace_stops_the_clock() {
        let tracker = tracker();
        let handle = tracker.subscribe();
        handle.controls().send(ControlCommand::Start);
        time::sleep(Duration::from_millis(3_400)).await;
        drop(handle);

        time::sleep(Duration::from_secs(6)).await;
        assert!(tracker.controls().is_none());
        assert!(tracker.snapshot().is_none());

        // A new subscriber gets a fresh, idle core.
        let handle = tracker.subscribe();
        let snap = handle.timer_snapshot();
        assert_eq!(snap.phase, TimerPhase::Idle);
        assert_eq!(snap.elapsed_secs, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribing_one_observer_leaves_others_untouched() {
        let tracker = tracker();
        let first = tracker.subscribe();
        let second = tracker.subscribe();
        first.controls().send(ControlCommand::Start);
        time::sleep(Duration::from_millis(2_400)).await;
        drop(first);

        // Well past the grace period: the second observer keeps the core
        // alive on its own.
        time::sleep(Duration::from_secs(10)).await;
        assert!(tracker.controls().is_some());
        assert_eq!(second.timer_snapshot().phase, TimerPhase::Running);
    }
}
