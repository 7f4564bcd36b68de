//! # StudySmart Core Library
//!
//! Core business logic for StudySmart, a personal study-tracking tool.
//! All operations are available through a standalone CLI binary; the core
//! itself is UI-agnostic.
//!
//! ## Architecture
//!
//! - **Timer**: a pure state machine ([`TimerMachine`]) driven by a single
//!   actor task that serializes ticks and control commands, published as
//!   [`TimerSnapshot`] values over a watch channel
//! - **Tracker**: [`StudyTracker`] owns the timer lifecycle -- the timer
//!   core starts on the first subscriber and is torn down a grace period
//!   after the last one leaves
//! - **View**: a combine-latest aggregator joining the timer with the
//!   persisted subject/session collections into one [`ViewState`]
//! - **Storage**: SQLite-backed subjects, tasks, and study sessions, plus
//!   TOML-based configuration
//!
//! ## Key Components
//!
//! - [`TimerMachine`]: the timer state machine
//! - [`StudyTracker`]: lifecycle binder and command surface
//! - [`StudyStore`]: reactive storage wrapper
//! - [`Database`]: session and subject persistence
//! - [`Config`]: application configuration

pub mod error;
pub mod model;
pub mod storage;
pub mod timer;
pub mod view;

pub use error::{ConfigError, CoreError, SessionError, StorageError};
pub use model::{Priority, SessionRecord, Subject, Task};
pub use storage::{Config, Database, StudyStore};
pub use timer::{
    ControlCommand, ControlHandle, SessionSink, StudyTracker, SubjectRef, TimerMachine,
    TimerPhase, TimerSnapshot, TrackerConfig, ViewHandle, MIN_SESSION_SECS,
};
pub use view::ViewState;
