use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::SolveRecord;
use crate::timer::TimerState;

/// Every observable change in the stopwatch produces an Event.
/// The runtime broadcasts them; the UI layer subscribes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    StateChanged {
        from: TimerState,
        to: TimerState,
        at: DateTime<Utc>,
    },
    /// Press registered; the hold timer with this token is pending.
    HoldStarted {
        token: u64,
        at: DateTime<Utc>,
    },
    /// Released or dragged before the hold elapsed, or disarmed by a drag.
    HoldCancelled {
        at: DateTime<Utc>,
    },
    /// Hold elapsed; the next release starts the clock.
    Armed {
        at: DateTime<Utc>,
    },
    InspectionStarted {
        at: DateTime<Utc>,
    },
    TimerStarted {
        scramble: String,
        at: DateTime<Utc>,
    },
    /// A phase boundary in a multi-phase solve.
    PhaseRecorded {
        phase: u8,
        split_secs: f64,
        at: DateTime<Utc>,
    },
    SolveCompleted {
        record: SolveRecord,
        at: DateTime<Utc>,
    },
    /// An in-progress solve or inspection was dropped by a swipe.
    SolveDiscarded {
        elapsed_secs: f64,
        at: DateTime<Utc>,
    },
    /// `current` now holds a new scramble.
    ScrambleChanged {
        scramble: String,
        at: DateTime<Utc>,
    },
    /// The next solve's scramble is ready.
    ScrambleStaged {
        at: DateTime<Utc>,
    },
    ScrambleReloadRequested {
        seq: u64,
        at: DateTime<Utc>,
    },
    /// Recoverable: buffers were left unchanged.
    ScrambleUnavailable {
        reason: String,
        at: DateTime<Utc>,
    },
    /// The sink stored the record.
    SolvePersisted {
        solve_id: Uuid,
        at: DateTime<Utc>,
    },
    /// Recoverable: the solve happened, the sink could not store it.
    PersistenceFailed {
        solve_id: Uuid,
        reason: String,
        at: DateTime<Utc>,
    },
    ConfigApplied {
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::StateChanged { .. } => "state_changed",
            Event::HoldStarted { .. } => "hold_started",
            Event::HoldCancelled { .. } => "hold_cancelled",
            Event::Armed { .. } => "armed",
            Event::InspectionStarted { .. } => "inspection_started",
            Event::TimerStarted { .. } => "timer_started",
            Event::PhaseRecorded { .. } => "phase_recorded",
            Event::SolveCompleted { .. } => "solve_completed",
            Event::SolveDiscarded { .. } => "solve_discarded",
            Event::ScrambleChanged { .. } => "scramble_changed",
            Event::ScrambleStaged { .. } => "scramble_staged",
            Event::ScrambleReloadRequested { .. } => "scramble_reload_requested",
            Event::ScrambleUnavailable { .. } => "scramble_unavailable",
            Event::SolvePersisted { .. } => "solve_persisted",
            Event::PersistenceFailed { .. } => "persistence_failed",
            Event::ConfigApplied { .. } => "config_applied",
        }
    }
}
