mod machine;
mod service;
mod subsystem;

pub use machine::{
    ControlCommand, FinishOutcome, TimerMachine, TimerPhase, TimerSnapshot, MIN_SESSION_SECS,
};
pub use service::{ControlHandle, SessionSink, SubjectRef};
pub use subsystem::{StudyTracker, TrackerConfig, ViewHandle};
