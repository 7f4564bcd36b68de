//! Timer service actor.
//!
//! Owns the [`TimerMachine`] and is its only writer: control commands and
//! clock ticks are serialized through one `select!` loop, so a tick that
//! races a phase-leaving command can never be applied after the
//! transition. Snapshots go out over a watch channel on every change.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::error::{CoreError, SessionError, StorageError};
use crate::model::SessionRecord;

use super::machine::{
    ControlCommand, FinishOutcome, TimerMachine, TimerPhase, TimerSnapshot, MIN_SESSION_SECS,
};

/// Subject a committed session is attributed to.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectRef {
    pub id: Option<i64>,
    pub name: String,
}

/// Persistence seam used when a finish is committed. The timer subsystem
/// never embeds SQL knowledge.
pub trait SessionSink: Send + Sync {
    fn record_session(
        &self,
        subject_id: Option<i64>,
        subject_name: &str,
        started_at: DateTime<Utc>,
        duration_secs: u64,
    ) -> Result<SessionRecord, StorageError>;
}

pub(crate) enum TimerRequest {
    Control(ControlCommand),
    Finish {
        subject: Option<SubjectRef>,
        reply: oneshot::Sender<Result<SessionRecord, CoreError>>,
    },
}

/// Clonable command surface into the timer service. Safe to hand to any
/// task or thread; commands are applied in queue order.
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::UnboundedSender<TimerRequest>,
}

impl ControlHandle {
    /// Queue a control command. Returns false when the service is gone
    /// (the command is dropped, which is indistinguishable from a no-op).
    pub fn send(&self, cmd: ControlCommand) -> bool {
        self.tx.send(TimerRequest::Control(cmd)).is_ok()
    }

    /// Commit the current session, attributing it to `subject`.
    ///
    /// Travels on the same queue as control commands so ordering between
    /// the two is preserved.
    pub async fn finish(&self, subject: Option<SubjectRef>) -> Result<SessionRecord, CoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(TimerRequest::Finish {
                subject,
                reply: reply_tx,
            })
            .map_err(|_| CoreError::TimerInactive)?;
        reply_rx.await.map_err(|_| CoreError::TimerInactive)?
    }
}

pub(crate) struct ServiceHandles {
    pub commands: ControlHandle,
    pub snapshots: watch::Receiver<TimerSnapshot>,
    pub task: JoinHandle<()>,
}

/// Spawn the service actor. Must be called within a Tokio runtime.
pub(crate) fn spawn(tick_interval: Duration, sink: Arc<dyn SessionSink>) -> ServiceHandles {
    let (tx, rx) = mpsc::unbounded_channel();
    let (snap_tx, snap_rx) = watch::channel(TimerMachine::new().snapshot());
    let task = tokio::spawn(run_loop(rx, snap_tx, tick_interval, sink));
    ServiceHandles {
        commands: ControlHandle { tx },
        snapshots: snap_rx,
        task,
    }
}

async fn run_loop(
    mut rx: mpsc::UnboundedReceiver<TimerRequest>,
    snap_tx: watch::Sender<TimerSnapshot>,
    tick_interval: Duration,
    sink: Arc<dyn SessionSink>,
) {
    let mut machine = TimerMachine::new();
    // Wall-clock instant the current session began, for the record.
    let mut started_at: Option<DateTime<Utc>> = None;
    // First tick one full period after start; missed ticks are skipped,
    // never backfilled.
    let mut interval = time::interval_at(Instant::now() + tick_interval, tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!("timer service started");

    loop {
        tokio::select! {
            req = rx.recv() => {
                let Some(req) = req else { break };
                match req {
                    TimerRequest::Control(cmd) => {
                        let prev = machine.phase();
                        if machine.apply(cmd) {
                            match machine.phase() {
                                TimerPhase::Running => {
                                    if prev != TimerPhase::Paused {
                                        started_at = Some(Utc::now());
                                        info!("session started");
                                    }
                                    interval.reset();
                                }
                                TimerPhase::Cancelled => {
                                    started_at = None;
                                    info!("session cancelled");
                                }
                                _ => {}
                            }
                            snap_tx.send_replace(machine.snapshot());
                        }
                    }
                    TimerRequest::Finish { subject, reply } => {
                        let outcome = machine.finish();
                        if outcome != FinishOutcome::Inactive {
                            snap_tx.send_replace(machine.snapshot());
                        }
                        let result = match outcome {
                            FinishOutcome::Inactive => Err(CoreError::TimerInactive),
                            FinishOutcome::TooShort { elapsed_secs } => {
                                started_at = None;
                                warn!("session too short to save ({elapsed_secs}s)");
                                Err(SessionError::TooShort {
                                    elapsed_secs,
                                    min_secs: MIN_SESSION_SECS,
                                }
                                .into())
                            }
                            FinishOutcome::Finished { elapsed_secs } => {
                                let (subject_id, subject_name) = subject
                                    .map(|s| (s.id, s.name))
                                    .unwrap_or((None, String::new()));
                                let begun = started_at.take().unwrap_or_else(Utc::now);
                                let result = sink
                                    .record_session(subject_id, &subject_name, begun, elapsed_secs)
                                    .map_err(CoreError::from);
                                match &result {
                                    Ok(record) => {
                                        info!("session saved: {elapsed_secs}s (id {})", record.id)
                                    }
                                    // The in-memory timer is not rolled
                                    // back on a failed write.
                                    Err(e) => warn!("failed to save session: {e}"),
                                }
                                result
                            }
                        };
                        let _ = reply.send(result);
                    }
                }
            }
            _ = interval.tick(), if machine.phase() == TimerPhase::Running => {
                machine.tick();
                snap_tx.send_replace(machine.snapshot());
            }
        }
    }
    debug!("timer service stopped");
}
