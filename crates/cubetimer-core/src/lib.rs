//! # Cubetimer Core Library
//!
//! This library provides the core logic for a touch-driven speedcubing
//! stopwatch. All behaviour lives here; the CLI and any GUI shell are thin
//! layers that feed touch samples in and render events and snapshots.
//!
//! ## Architecture
//!
//! - **Gesture classifier**: turns raw down/move/up samples into press,
//!   drag and release intents (tap or four-way swipe)
//! - **Stopwatch engine**: a deterministic state machine driven by explicit
//!   timestamps. Deferred work (hold timers, scramble fetches) is returned
//!   to the caller as requests
//! - **Scramble pipeline**: double-buffered current/staged scrambles with
//!   sequence-numbered fetches, so late responses are dropped
//! - **Runtime**: a tokio task that owns the engine, serializes every input
//!   through one queue and publishes events and snapshots
//! - **Config**: TOML-based settings at `~/.config/cubetimer/config.toml`
//!
//! ## Key Components
//!
//! - [`Stopwatch`]: Core timer state machine
//! - [`GestureTracker`]: Touch gesture classification
//! - [`ScramblePipeline`]: Scramble double buffer
//! - [`StopwatchHandle`]: Front end to the async runtime
//! - [`Config`]: Application configuration management
//! - [`SolveSink`] / [`Haptics`]: Collaborator contracts

pub mod config;
pub mod error;
pub mod events;
pub mod gesture;
pub mod record;
pub mod runtime;
pub mod scramble;
pub mod sink;
pub mod timer;

pub use config::{Config, Precision, StopwatchConfig};
pub use error::{ConfigError, CoreError, GestureError, ScrambleError, SinkError};
pub use events::Event;
pub use gesture::{Gesture, GestureTracker, Intent, Point, SwipeDirection, TouchPhase, TouchSample};
pub use record::{Penalty, SessionRef, SolveRecord};
pub use runtime::StopwatchHandle;
pub use scramble::{Puzzle, RandomMoveScrambler, ScramblePipeline, ScrambleSource, ScrambleTicket};
pub use sink::{HapticIntensity, Haptics, MemorySolveSink, NoHaptics, SolveSink};
pub use timer::{DisplayColor, Reaction, Request, Stopwatch, TimerSnapshot, TimerState};
