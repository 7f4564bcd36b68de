//! Timer state machine.
//!
//! The machine is pure and synchronous; it has no clock of its own. The
//! caller (the service actor, or the single-shot CLI) feeds it ticks and
//! control commands.
//!
//! ## Phases
//!
//! ```text
//! Idle -> Running <-> Paused
//!           |  \
//!           |   Finished (commit, if long enough)
//!           Cancelled
//! ```
//!
//! Commands that have no defined effect in the current phase are no-ops,
//! never errors, so at-least-once delivery over the control channel is
//! indistinguishable from exactly-once.

use serde::{Deserialize, Serialize};

/// Minimum committable session length. Anything shorter is treated as an
/// accidental tap and discarded.
pub const MIN_SESSION_SECS: u64 = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    Idle,
    Running,
    Paused,
    Finished,
    Cancelled,
}

/// Payload-free control commands, deliverable from outside the process
/// that owns the machine (e.g. a notification-style trigger).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlCommand {
    /// Start a fresh session, or resume a paused one.
    Start,
    /// Pause a running session; elapsed time is retained.
    Stop,
    /// Discard the current session without creating a record.
    Cancel,
}

/// Immutable value published on every tick or phase change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub phase: TimerPhase,
    pub elapsed_secs: u64,
}

/// Result of an explicit finish (commit) attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishOutcome {
    /// No session was running or paused; nothing changed.
    Inactive,
    /// Elapsed time was below [`MIN_SESSION_SECS`]; the machine was reset
    /// to idle and nothing is eligible for persistence.
    TooShort { elapsed_secs: u64 },
    /// The session is frozen and eligible for persistence.
    Finished { elapsed_secs: u64 },
}

/// The timer state machine: one phase and one elapsed-seconds counter.
///
/// Serializable so the CLI can persist it between invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerMachine {
    phase: TimerPhase,
    elapsed_secs: u64,
}

impl Default for TimerMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerMachine {
    pub fn new() -> Self {
        Self {
            phase: TimerPhase::Idle,
            elapsed_secs: 0,
        }
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            phase: self.phase,
            elapsed_secs: self.elapsed_secs,
        }
    }

    /// Apply a control command. Returns whether anything changed; a
    /// command with no effect in the current phase is a no-op.
    pub fn apply(&mut self, cmd: ControlCommand) -> bool {
        use ControlCommand::*;
        use TimerPhase::*;
        match (self.phase, cmd) {
            // Fresh session: elapsed resets.
            (Idle, Start) | (Finished, Start) | (Cancelled, Start) => {
                self.phase = Running;
                self.elapsed_secs = 0;
                true
            }
            // Resume: elapsed is retained.
            (Paused, Start) => {
                self.phase = Running;
                true
            }
            (Running, Stop) => {
                self.phase = Paused;
                true
            }
            (Running, Cancel) | (Paused, Cancel) => {
                self.phase = Cancelled;
                self.elapsed_secs = 0;
                true
            }
            _ => false,
        }
    }

    /// Advance by one second. Only counts while running.
    pub fn tick(&mut self) -> bool {
        self.advance(1)
    }

    /// Advance by `secs` seconds if running. Used by the CLI to re-anchor
    /// a persisted machine from the wall clock.
    pub fn advance(&mut self, secs: u64) -> bool {
        if self.phase == TimerPhase::Running && secs > 0 {
            self.elapsed_secs = self.elapsed_secs.saturating_add(secs);
            true
        } else {
            false
        }
    }

    /// Attempt to commit the current session.
    ///
    /// A too-short session resets the machine to idle; a successful
    /// finish freezes the elapsed value in the `Finished` phase. The
    /// returned elapsed count is exactly what the machine recorded at the
    /// moment the finish was accepted.
    pub fn finish(&mut self) -> FinishOutcome {
        match self.phase {
            TimerPhase::Running | TimerPhase::Paused => {
                let elapsed_secs = self.elapsed_secs;
                if elapsed_secs < MIN_SESSION_SECS {
                    self.phase = TimerPhase::Idle;
                    self.elapsed_secs = 0;
                    FinishOutcome::TooShort { elapsed_secs }
                } else {
                    self.phase = TimerPhase::Finished;
                    FinishOutcome::Finished { elapsed_secs }
                }
            }
            _ => FinishOutcome::Inactive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn start_pause_resume_retains_elapsed() {
        let mut m = TimerMachine::new();
        assert_eq!(m.phase(), TimerPhase::Idle);

        assert!(m.apply(ControlCommand::Start));
        assert_eq!(m.phase(), TimerPhase::Running);

        for _ in 0..5 {
            assert!(m.tick());
        }
        assert!(m.apply(ControlCommand::Stop));
        assert_eq!(m.phase(), TimerPhase::Paused);
        assert_eq!(m.elapsed_secs(), 5);

        // Ticks while paused are ignored.
        assert!(!m.tick());
        assert_eq!(m.elapsed_secs(), 5);

        assert!(m.apply(ControlCommand::Start));
        assert_eq!(m.phase(), TimerPhase::Running);
        assert_eq!(m.elapsed_secs(), 5);

        for _ in 0..5 {
            m.tick();
        }
        assert_eq!(m.finish(), FinishOutcome::TooShort { elapsed_secs: 10 });
        assert_eq!(m.phase(), TimerPhase::Idle);
        assert_eq!(m.elapsed_secs(), 0);
    }

    #[test]
    fn cancel_before_first_tick_discards_session() {
        let mut m = TimerMachine::new();
        m.apply(ControlCommand::Start);
        assert!(m.apply(ControlCommand::Cancel));
        assert_eq!(m.phase(), TimerPhase::Cancelled);
        assert_eq!(m.elapsed_secs(), 0);
        assert_eq!(m.finish(), FinishOutcome::Inactive);
    }

    #[test]
    fn finish_at_threshold_commits() {
        let mut m = TimerMachine::new();
        m.apply(ControlCommand::Start);
        m.advance(MIN_SESSION_SECS);
        assert_eq!(
            m.finish(),
            FinishOutcome::Finished {
                elapsed_secs: MIN_SESSION_SECS
            }
        );
        assert_eq!(m.phase(), TimerPhase::Finished);
        // Elapsed stays frozen in the finished phase.
        assert_eq!(m.elapsed_secs(), MIN_SESSION_SECS);
    }

    #[test]
    fn short_finish_resets_to_idle() {
        let mut m = TimerMachine::new();
        m.apply(ControlCommand::Start);
        m.advance(10);
        assert_eq!(m.finish(), FinishOutcome::TooShort { elapsed_secs: 10 });
        assert_eq!(m.phase(), TimerPhase::Idle);
    }

    #[test]
    fn start_from_terminal_phase_begins_fresh_cycle() {
        let mut m = TimerMachine::new();
        m.apply(ControlCommand::Start);
        m.advance(MIN_SESSION_SECS);
        m.finish();
        assert_eq!(m.phase(), TimerPhase::Finished);

        assert!(m.apply(ControlCommand::Start));
        assert_eq!(m.phase(), TimerPhase::Running);
        assert_eq!(m.elapsed_secs(), 0);

        m.apply(ControlCommand::Cancel);
        assert!(m.apply(ControlCommand::Start));
        assert_eq!(m.elapsed_secs(), 0);
    }

    #[test]
    fn undefined_commands_are_noops() {
        let mut m = TimerMachine::new();
        assert!(!m.apply(ControlCommand::Stop));
        assert!(!m.apply(ControlCommand::Cancel));
        assert_eq!(m.phase(), TimerPhase::Idle);

        m.apply(ControlCommand::Start);
        // Repeated delivery of the same command has no observable effect.
        assert!(!m.apply(ControlCommand::Start));
        assert_eq!(m.phase(), TimerPhase::Running);

        m.apply(ControlCommand::Stop);
        assert!(!m.apply(ControlCommand::Stop));
        assert_eq!(m.phase(), TimerPhase::Paused);
    }

    /// Ops fed to the machine in the property test below.
    #[derive(Debug, Clone, Copy)]
    enum Op {
        Cmd(ControlCommand),
        Tick,
        Finish,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Cmd(ControlCommand::Start)),
            Just(Op::Cmd(ControlCommand::Stop)),
            Just(Op::Cmd(ControlCommand::Cancel)),
            Just(Op::Finish),
            Just(Op::Tick),
            Just(Op::Tick),
            Just(Op::Tick),
        ]
    }

    proptest! {
        /// Elapsed only moves on ticks while running; every other change
        /// to it is one of the defined resets (fresh start, cancel,
        /// too-short finish).
        #[test]
        fn elapsed_is_monotonic_while_running_and_frozen_otherwise(
            ops in proptest::collection::vec(op_strategy(), 0..128)
        ) {
            let mut m = TimerMachine::new();
            for op in ops {
                let phase_before = m.phase();
                let elapsed_before = m.elapsed_secs();
                match op {
                    Op::Tick => {
                        m.tick();
                        if phase_before == TimerPhase::Running {
                            prop_assert_eq!(m.elapsed_secs(), elapsed_before + 1);
                        } else {
                            prop_assert_eq!(m.elapsed_secs(), elapsed_before);
                            prop_assert_eq!(m.phase(), phase_before);
                        }
                    }
                    Op::Cmd(cmd) => {
                        m.apply(cmd);
                        match cmd {
                            // Stop never touches elapsed.
                            ControlCommand::Stop => {
                                prop_assert_eq!(m.elapsed_secs(), elapsed_before);
                            }
                            ControlCommand::Start => {
                                if phase_before == TimerPhase::Paused
                                    || phase_before == TimerPhase::Running
                                {
                                    prop_assert_eq!(m.elapsed_secs(), elapsed_before);
                                } else {
                                    prop_assert_eq!(m.elapsed_secs(), 0);
                                }
                            }
                            ControlCommand::Cancel => {
                                if phase_before == TimerPhase::Running
                                    || phase_before == TimerPhase::Paused
                                {
                                    prop_assert_eq!(m.elapsed_secs(), 0);
                                } else {
                                    prop_assert_eq!(m.elapsed_secs(), elapsed_before);
                                }
                            }
                        }
                    }
                    Op::Finish => {
                        match m.finish() {
                            FinishOutcome::Inactive => {
                                prop_assert_eq!(m.phase(), phase_before);
                                prop_assert_eq!(m.elapsed_secs(), elapsed_before);
                            }
                            FinishOutcome::TooShort { elapsed_secs } => {
                                prop_assert_eq!(elapsed_secs, elapsed_before);
                                prop_assert!(elapsed_secs < MIN_SESSION_SECS);
                                prop_assert_eq!(m.phase(), TimerPhase::Idle);
                            }
                            FinishOutcome::Finished { elapsed_secs } => {
                                prop_assert_eq!(elapsed_secs, elapsed_before);
                                prop_assert!(elapsed_secs >= MIN_SESSION_SECS);
                                prop_assert_eq!(m.phase(), TimerPhase::Finished);
                            }
                        }
                    }
                }
            }
        }
    }
}
