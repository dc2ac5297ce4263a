//! Stopwatch engine implementation.
//!
//! The stopwatch is a wall-clock-based state machine. It owns no threads
//! and no timers: every input carries its own timestamp, and anything that
//! has to happen later (the hold timer, scramble fetches, solve persistence)
//! is handed back to the caller as a [`Request`]. The runtime executes those
//! requests and feeds their results back in through the same serialized path.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Holding -> Armed -> Running -> Idle
//!   ^        |         |         |
//!   +--------+---------+---------+   (early release, drag, swipe)
//! ```
//!
//! With inspection enabled, the first release from an armed or held timer
//! enters `Inspecting`, and the next hold-and-release starts the solve.
//!
//! ## Usage
//!
//! ```ignore
//! let (mut sw, reaction) = Stopwatch::new(config, &source, sink, haptics)?;
//! // For every touch sample:
//! let reaction = sw.touch(sample);
//! // When a hold timer fires:
//! let reaction = sw.hold_elapsed(token, Instant::now());
//! // While sw.is_timing():
//! sw.tick(Instant::now());
//! // Callers without a worker pool store solves on the spot:
//! let mut stop = sw.touch(sample);
//! sw.persist_inline(&mut stop);
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::clock::{format_time, TimingClock};
use crate::config::StopwatchConfig;
use crate::error::{ScrambleError, SinkError};
use crate::events::Event;
use crate::gesture::{Gesture, GestureTracker, Intent, SwipeDirection, TouchSample};
use crate::record::{Penalty, SessionRef, SolveRecord};
use crate::scramble::{Applied, Puzzle, ScramblePipeline, ScrambleSource, ScrambleTicket};
use crate::sink::{Haptics, SolveSink};

/// WCA inspection allowance, used for the countdown display.
const INSPECTION_SECS: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    /// Inspection countdown before the solve (inspection mode only).
    Inspecting,
    /// Finger down, hold timer pending.
    Holding,
    /// Hold elapsed; release starts the clock.
    Armed,
    Running,
}

/// Timer text colour hint for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayColor {
    Default,
    HeldDown,
    CanStart,
}

/// Deferred work for the caller to execute and report back.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Call [`Stopwatch::hold_elapsed`] with `token` after `after`.
    Hold { token: u64, after: Duration },
    /// Generate a scramble and call [`Stopwatch::scramble_fetched`].
    FetchScramble(ScrambleTicket),
    /// Hand the record to [`Stopwatch::sink`] and call
    /// [`Stopwatch::persisted`] with the outcome.
    Persist(SolveRecord),
}

/// Everything one input produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reaction {
    pub events: Vec<Event>,
    pub requests: Vec<Request>,
}

impl Reaction {
    fn event(&mut self, event: Event) {
        self.events.push(event);
    }

    fn request(&mut self, request: Request) {
        self.requests.push(request);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.requests.is_empty()
    }

    pub fn hold_token(&self) -> Option<u64> {
        self.requests.iter().find_map(|r| match r {
            Request::Hold { token, .. } => Some(*token),
            _ => None,
        })
    }

    pub fn scramble_ticket(&self) -> Option<ScrambleTicket> {
        self.requests.iter().find_map(|r| match r {
            Request::FetchScramble(ticket) => Some(*ticket),
            _ => None,
        })
    }

    pub fn solve(&self) -> Option<&SolveRecord> {
        self.events.iter().find_map(|e| match e {
            Event::SolveCompleted { record, .. } => Some(record),
            _ => None,
        })
    }
}

/// Externally observable projection of the stopwatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub state: TimerState,
    pub elapsed_secs: f64,
    /// `elapsed_secs` at the configured precision; `None` when hidden.
    pub display: Option<String>,
    pub display_color: DisplayColor,
    pub scramble: String,
    /// `scramble` was already solved; a replacement is being fetched.
    pub scramble_pending: bool,
    pub scramble_unavailable: bool,
    /// Inspection time, remaining or elapsed per config.
    pub inspection_secs: Option<f64>,
    pub splits: Vec<f64>,
}

/// The solve currently on the clock.
#[derive(Debug, Clone)]
struct ActiveSolve {
    scramble: String,
    penalty: Penalty,
    splits: Vec<f64>,
}

pub struct Stopwatch {
    config: StopwatchConfig,
    /// Config received while a cycle was in progress; installed at Idle.
    deferred_config: Option<StopwatchConfig>,
    state: TimerState,
    gestures: GestureTracker,
    clock: TimingClock,
    scrambles: ScramblePipeline,
    session: SessionRef,
    sink: Arc<dyn SolveSink>,
    haptics: Arc<dyn Haptics>,
    /// Monotonic. A hold firing is honoured only if it matches `pending_hold`.
    next_hold_token: u64,
    pending_hold: Option<u64>,
    inspection_started: Option<Instant>,
    solve: Option<ActiveSolve>,
    display_color: DisplayColor,
    last_seen: Option<Instant>,
}

impl Stopwatch {
    /// Build a stopwatch, fetching the first scramble synchronously.
    ///
    /// The returned reaction carries the staged-scramble prefetch.
    pub fn new(
        config: StopwatchConfig,
        source: &dyn ScrambleSource,
        sink: Arc<dyn SolveSink>,
        haptics: Arc<dyn Haptics>,
    ) -> Result<(Self, Reaction), ScrambleError> {
        let (scrambles, ticket) = ScramblePipeline::new(source, config.puzzle)?;
        let stopwatch = Self {
            gestures: GestureTracker::new(config.swipe_threshold),
            session: config.session.clone(),
            config,
            deferred_config: None,
            state: TimerState::Idle,
            clock: TimingClock::new(),
            scrambles,
            sink,
            haptics,
            next_hold_token: 0,
            pending_hold: None,
            inspection_started: None,
            solve: None,
            display_color: DisplayColor::Default,
            last_seen: None,
        };
        let mut reaction = Reaction::default();
        reaction.request(Request::FetchScramble(ticket));
        Ok((stopwatch, reaction))
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn config(&self) -> &StopwatchConfig {
        &self.config
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.clock.elapsed_secs()
    }

    pub fn current_scramble(&self) -> &str {
        self.scrambles.current()
    }

    pub fn staged_scramble(&self) -> Option<&str> {
        self.scrambles.staged()
    }

    pub fn puzzle(&self) -> Puzzle {
        self.scrambles.puzzle()
    }

    pub fn session(&self) -> &SessionRef {
        &self.session
    }

    pub fn pending_hold(&self) -> Option<u64> {
        self.pending_hold
    }

    /// The solve sink, for callers that run [`Request::Persist`] elsewhere.
    pub fn sink(&self) -> Arc<dyn SolveSink> {
        Arc::clone(&self.sink)
    }

    /// Whether the periodic tick is needed. The clock is inert otherwise.
    pub fn is_timing(&self) -> bool {
        matches!(self.state, TimerState::Running) || self.inspection_started.is_some()
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let elapsed_secs = self.clock.elapsed_secs();
        let precision = if self.state == TimerState::Running {
            self.config.running_precision
        } else {
            self.config.precision
        };
        let inspection_secs = match (self.inspection_started, self.last_seen) {
            (Some(start), Some(now)) => {
                let spent = now.saturating_duration_since(start).as_secs_f64();
                Some(if self.config.inspection_counts_down {
                    INSPECTION_SECS - spent
                } else {
                    spent
                })
            }
            _ => None,
        };
        TimerSnapshot {
            state: self.state,
            elapsed_secs,
            display: format_time(elapsed_secs, precision),
            display_color: self.display_color,
            scramble: self.scrambles.current().to_string(),
            scramble_pending: self.scrambles.is_pending(),
            scramble_unavailable: self.scrambles.is_unavailable(),
            inspection_secs,
            splits: self
                .solve
                .as_ref()
                .map(|s| s.splits.clone())
                .unwrap_or_default(),
        }
    }

    // ── Inputs ───────────────────────────────────────────────────────

    /// Feed one raw touch sample.
    pub fn touch(&mut self, sample: TouchSample) -> Reaction {
        self.observe(sample.at);
        let mut reaction = Reaction::default();
        match self.gestures.feed(sample) {
            Ok(Some(Intent::Press { at })) => self.on_press(at, &mut reaction),
            Ok(Some(Intent::DragPastThreshold { at })) => self.on_drag(at, &mut reaction),
            Ok(Some(Intent::Release { gesture, at })) => {
                self.on_release(gesture, at, &mut reaction)
            }
            Ok(None) => {}
            Err(err) => debug!(%err, "ignoring touch sample"),
        }
        reaction
    }

    /// The hold timer identified by `token` fired.
    pub fn hold_elapsed(&mut self, token: u64, now: Instant) -> Reaction {
        self.observe(now);
        let mut reaction = Reaction::default();
        if self.state != TimerState::Holding || self.pending_hold != Some(token) {
            debug!(token, pending = ?self.pending_hold, "ignoring stale hold timer");
            return reaction;
        }

        self.pending_hold = None;
        self.display_color = DisplayColor::CanStart;
        if let Some(intensity) = self.config.haptics {
            self.haptics.pulse(intensity);
        }
        self.transition(TimerState::Armed, &mut reaction);
        reaction.event(Event::Armed { at: Utc::now() });
        reaction
    }

    /// Periodic display tick. Recomputes elapsed time while running.
    pub fn tick(&mut self, now: Instant) {
        self.observe(now);
        if self.state == TimerState::Running {
            self.clock.sample(now);
        }
    }

    /// A scramble fetch finished.
    pub fn scramble_fetched(
        &mut self,
        seq: u64,
        result: Result<String, ScrambleError>,
    ) -> Reaction {
        let mut reaction = Reaction::default();
        let solving = self.state == TimerState::Running;
        match self.scrambles.apply(seq, result, solving) {
            Applied::Current { follow_up } => {
                reaction.event(Event::ScrambleChanged {
                    scramble: self.scrambles.current().to_string(),
                    at: Utc::now(),
                });
                if let Some(ticket) = follow_up {
                    reaction.request(Request::FetchScramble(ticket));
                }
            }
            Applied::Staged => reaction.event(Event::ScrambleStaged { at: Utc::now() }),
            Applied::Stale => {}
            Applied::Failed(err) => {
                warn!(%err, seq, "scramble source failed");
                reaction.event(Event::ScrambleUnavailable {
                    reason: err.to_string(),
                    at: Utc::now(),
                });
            }
        }
        reaction
    }

    /// A persistence request finished. The engine has long since moved on;
    /// this only reports the outcome.
    pub fn persisted(&self, solve_id: Uuid, result: Result<(), SinkError>) -> Reaction {
        let mut reaction = Reaction::default();
        match result {
            Ok(()) => {
                debug!(%solve_id, "solve stored");
                reaction.event(Event::SolvePersisted {
                    solve_id,
                    at: Utc::now(),
                });
            }
            Err(err) => {
                warn!(%err, %solve_id, "solve sink rejected record");
                reaction.event(Event::PersistenceFailed {
                    solve_id,
                    reason: err.to_string(),
                    at: Utc::now(),
                });
            }
        }
        reaction
    }

    /// Run every [`Request::Persist`] in `reaction` on the calling thread,
    /// appending the outcome events.
    pub fn persist_inline(&self, reaction: &mut Reaction) {
        let (persist, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut reaction.requests)
            .into_iter()
            .partition(|r| matches!(r, Request::Persist(_)));
        reaction.requests = rest;
        for request in persist {
            if let Request::Persist(record) = request {
                let solve_id = record.id;
                let outcome = self.persisted(solve_id, self.sink.record(record));
                reaction.events.extend(outcome.events);
            }
        }
    }

    /// Explicitly replace the current scramble, same as a right swipe
    /// outside a solve.
    pub fn reload_scramble(&mut self) -> Reaction {
        let mut reaction = Reaction::default();
        if self.state == TimerState::Running {
            debug!("ignoring scramble reload during a solve");
            return reaction;
        }
        self.request_reload(&mut reaction);
        reaction
    }

    /// Switch puzzles. Both scramble buffers are replaced; refused mid-solve.
    pub fn set_puzzle(&mut self, puzzle: Puzzle) -> Reaction {
        let mut reaction = Reaction::default();
        if self.state == TimerState::Running || puzzle == self.scrambles.puzzle() {
            return reaction;
        }
        self.config.puzzle = puzzle;
        let ticket = self.scrambles.set_puzzle(puzzle);
        reaction.event(Event::ScrambleReloadRequested {
            seq: ticket.seq,
            at: Utc::now(),
        });
        reaction.request(Request::FetchScramble(ticket));
        reaction
    }

    /// Later solves are attributed to `session`.
    pub fn set_session(&mut self, session: SessionRef) {
        self.config.session = session.clone();
        self.session = session;
    }

    /// Install new settings. Applied immediately when idle, otherwise when
    /// the current cycle returns to idle.
    pub fn apply_config(&mut self, config: StopwatchConfig) -> Reaction {
        let mut reaction = Reaction::default();
        if self.state == TimerState::Idle && self.inspection_started.is_none() {
            self.install_config(config, &mut reaction);
        } else {
            debug!(state = ?self.state, "deferring config until idle");
            self.deferred_config = Some(config);
        }
        reaction
    }

    // ── Transitions ──────────────────────────────────────────────────

    fn on_press(&mut self, at: Instant, reaction: &mut Reaction) {
        match self.state {
            TimerState::Idle | TimerState::Inspecting => {
                self.next_hold_token += 1;
                let token = self.next_hold_token;
                self.pending_hold = Some(token);
                self.display_color = DisplayColor::HeldDown;
                self.transition(TimerState::Holding, reaction);
                reaction.event(Event::HoldStarted {
                    token,
                    at: Utc::now(),
                });
                reaction.request(Request::Hold {
                    token,
                    after: self.config.hold_duration,
                });
            }
            TimerState::Running => {
                let elapsed = self.clock.sample(at);
                let recorded = self.solve.as_ref().map(|s| s.splits.len()).unwrap_or(0);
                if recorded + 1 < usize::from(self.config.phases) {
                    if let Some(solve) = self.solve.as_mut() {
                        solve.splits.push(elapsed);
                    }
                    reaction.event(Event::PhaseRecorded {
                        phase: (recorded + 1) as u8,
                        split_secs: elapsed,
                        at: Utc::now(),
                    });
                } else {
                    self.finish_solve(at, reaction);
                }
            }
            // A pending hold already exists for this contact.
            TimerState::Holding | TimerState::Armed => {
                debug!(state = ?self.state, "ignoring press while holding");
            }
        }
    }

    fn on_drag(&mut self, _at: Instant, reaction: &mut Reaction) {
        if matches!(self.state, TimerState::Holding | TimerState::Armed) {
            debug!(state = ?self.state, "drag past threshold cancels hold");
            self.cancel_hold(reaction);
        }
    }

    fn on_release(&mut self, gesture: Gesture, at: Instant, reaction: &mut Reaction) {
        match gesture {
            Gesture::Swipe(SwipeDirection::Left) => self.discard(at, reaction),
            Gesture::Swipe(SwipeDirection::Right) => {
                self.discard(at, reaction);
                self.request_reload(reaction);
            }
            // Reserved directions: never start the clock from them.
            Gesture::Swipe(SwipeDirection::Up | SwipeDirection::Down) => {
                if matches!(self.state, TimerState::Holding | TimerState::Armed) {
                    self.cancel_hold(reaction);
                }
            }
            Gesture::Tap => match self.state {
                TimerState::Holding => {
                    self.pending_hold = None;
                    self.display_color = DisplayColor::Default;
                    reaction.event(Event::HoldCancelled { at: Utc::now() });
                    if self.config.inspection && self.inspection_started.is_none() {
                        self.start_inspection(at, reaction);
                    } else {
                        self.settle(reaction);
                    }
                }
                TimerState::Armed => {
                    if self.config.inspection && self.inspection_started.is_none() {
                        self.display_color = DisplayColor::Default;
                        self.start_inspection(at, reaction);
                    } else {
                        self.start_solve(at, reaction);
                    }
                }
                // Release of the contact that stopped the clock or recorded
                // a split.
                TimerState::Idle | TimerState::Inspecting | TimerState::Running => {}
            },
        }
    }

    fn start_inspection(&mut self, at: Instant, reaction: &mut Reaction) {
        self.inspection_started = Some(at);
        self.transition(TimerState::Inspecting, reaction);
        reaction.event(Event::InspectionStarted { at: Utc::now() });
    }

    fn start_solve(&mut self, at: Instant, reaction: &mut Reaction) {
        let penalty = self
            .inspection_started
            .take()
            .map(|start| Penalty::for_inspection(at.saturating_duration_since(start).as_secs_f64()))
            .unwrap_or_default();
        let scramble = self.scrambles.current().to_string();
        self.solve = Some(ActiveSolve {
            scramble: scramble.clone(),
            penalty,
            splits: Vec::new(),
        });
        self.clock.start(at);
        self.display_color = DisplayColor::Default;
        self.transition(TimerState::Running, reaction);
        reaction.event(Event::TimerStarted {
            scramble,
            at: Utc::now(),
        });
    }

    /// Running -> (Stopping) -> Idle.
    fn finish_solve(&mut self, at: Instant, reaction: &mut Reaction) {
        let elapsed_secs = self.clock.stop(at);
        let solve = self.solve.take().unwrap_or_else(|| ActiveSolve {
            scramble: self.scrambles.current().to_string(),
            penalty: Penalty::None,
            splits: Vec::new(),
        });
        let record = SolveRecord::new(
            elapsed_secs,
            solve.scramble,
            self.scrambles.puzzle(),
            solve.penalty,
            solve.splits,
            self.session.clone(),
        );

        let ticket = self.scrambles.promote();
        let promoted = !self.scrambles.is_pending();
        reaction.request(Request::FetchScramble(ticket));

        info!(
            solve_id = %record.id,
            elapsed_secs,
            penalty = ?record.penalty,
            "solve completed"
        );
        reaction.event(Event::SolveCompleted {
            record: record.clone(),
            at: Utc::now(),
        });
        reaction.request(Request::Persist(record));

        // Nothing was staged: `current` is unchanged until the refetch lands.
        if promoted {
            reaction.event(Event::ScrambleChanged {
                scramble: self.scrambles.current().to_string(),
                at: Utc::now(),
            });
        }
        self.display_color = DisplayColor::Default;
        self.enter_idle(reaction);
    }

    /// Drop whatever is in progress without producing a record.
    fn discard(&mut self, at: Instant, reaction: &mut Reaction) {
        let was = self.state;
        self.pending_hold = None;
        self.display_color = DisplayColor::Default;

        let mut dropped = false;
        if self.solve.take().is_some() {
            self.clock.stop(at);
            dropped = true;
        }
        if self.inspection_started.take().is_some() {
            dropped = true;
        }
        if dropped {
            reaction.event(Event::SolveDiscarded {
                elapsed_secs: self.clock.elapsed_secs(),
                at: Utc::now(),
            });
        } else if matches!(was, TimerState::Holding | TimerState::Armed) {
            reaction.event(Event::HoldCancelled { at: Utc::now() });
        }
        self.enter_idle(reaction);
    }

    fn cancel_hold(&mut self, reaction: &mut Reaction) {
        self.pending_hold = None;
        self.display_color = DisplayColor::Default;
        reaction.event(Event::HoldCancelled { at: Utc::now() });
        self.settle(reaction);
    }

    fn request_reload(&mut self, reaction: &mut Reaction) {
        let ticket = self.scrambles.reload();
        reaction.event(Event::ScrambleReloadRequested {
            seq: ticket.seq,
            at: Utc::now(),
        });
        reaction.request(Request::FetchScramble(ticket));
    }

    fn enter_idle(&mut self, reaction: &mut Reaction) {
        self.transition(TimerState::Idle, reaction);
        if let Some(config) = self.deferred_config.take() {
            self.install_config(config, reaction);
        }
    }

    fn install_config(&mut self, config: StopwatchConfig, reaction: &mut Reaction) {
        self.gestures.set_threshold(config.swipe_threshold);
        self.session = config.session.clone();
        let puzzle_changed = config.puzzle != self.scrambles.puzzle();
        let puzzle = config.puzzle;
        self.config = config;
        if puzzle_changed {
            let ticket = self.scrambles.set_puzzle(puzzle);
            reaction.event(Event::ScrambleReloadRequested {
                seq: ticket.seq,
                at: Utc::now(),
            });
            reaction.request(Request::FetchScramble(ticket));
        }
        reaction.event(Event::ConfigApplied { at: Utc::now() });
    }

    /// Back to Inspecting if an inspection is open, else through `enter_idle`.
    fn settle(&mut self, reaction: &mut Reaction) {
        match self.resting_state() {
            TimerState::Idle => self.enter_idle(reaction),
            resting => self.transition(resting, reaction),
        }
    }

    fn resting_state(&self) -> TimerState {
        if self.inspection_started.is_some() {
            TimerState::Inspecting
        } else {
            TimerState::Idle
        }
    }

    fn transition(&mut self, to: TimerState, reaction: &mut Reaction) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        reaction.event(Event::StateChanged {
            from,
            to,
            at: Utc::now(),
        });
    }

    fn observe(&mut self, at: Instant) {
        self.last_seen = Some(match self.last_seen {
            Some(last) if last > at => last,
            _ => at,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Precision;
    use crate::gesture::Point;
    use crate::sink::{HapticIntensity, MemorySolveSink, NoHaptics};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHaptics(Mutex<Vec<HapticIntensity>>);

    impl Haptics for RecordingHaptics {
        fn pulse(&self, intensity: HapticIntensity) {
            self.0.lock().unwrap().push(intensity);
        }
    }

    fn source(_: &Puzzle) -> Result<String, ScrambleError> {
        Ok("R U R' U'".to_string())
    }

    fn ms(t0: Instant, millis: u64) -> Instant {
        t0 + Duration::from_millis(millis)
    }

    fn origin() -> Point {
        Point::new(100.0, 100.0)
    }

    fn stopwatch(config: StopwatchConfig) -> (Stopwatch, MemorySolveSink, ScrambleTicket) {
        let sink = MemorySolveSink::new();
        let (sw, reaction) =
            Stopwatch::new(config, &source, Arc::new(sink.clone()), Arc::new(NoHaptics)).unwrap();
        let ticket = reaction.scramble_ticket().unwrap();
        (sw, sink, ticket)
    }

    /// Press, fire the hold timer, release. Returns with the clock running.
    fn start_solve(sw: &mut Stopwatch, t0: Instant) {
        let token = sw.touch(TouchSample::down(origin(), t0)).hold_token().unwrap();
        sw.hold_elapsed(token, ms(t0, 500));
        sw.touch(TouchSample::up(origin(), ms(t0, 600)));
    }

    #[test]
    fn starts_idle_with_scramble_and_staged_fetch() {
        let (sw, _, ticket) = stopwatch(StopwatchConfig::default());
        assert_eq!(sw.state(), TimerState::Idle);
        assert_eq!(sw.current_scramble(), "R U R' U'");
        assert_eq!(sw.staged_scramble(), None);
        assert_eq!(ticket.seq, 1);
        assert!(!sw.is_timing());
    }

    #[test]
    fn hold_arm_release_starts_at_zero() {
        let (mut sw, _, _) = stopwatch(StopwatchConfig::default());
        let t0 = Instant::now();

        let r = sw.touch(TouchSample::down(origin(), t0));
        assert_eq!(sw.state(), TimerState::Holding);
        assert_eq!(
            r.requests,
            vec![Request::Hold {
                token: 1,
                after: Duration::from_millis(500)
            }]
        );

        sw.hold_elapsed(1, ms(t0, 600));
        assert_eq!(sw.state(), TimerState::Armed);
        assert_eq!(sw.snapshot().display_color, DisplayColor::CanStart);

        let r = sw.touch(TouchSample::up(origin(), ms(t0, 600)));
        assert_eq!(sw.state(), TimerState::Running);
        assert_eq!(sw.elapsed_secs(), 0.0);
        assert!(r
            .events
            .iter()
            .any(|e| matches!(e, Event::TimerStarted { scramble, .. } if scramble == "R U R' U'")));
        assert!(sw.is_timing());
    }

    #[test]
    fn early_release_returns_to_idle() {
        let (mut sw, sink, _) = stopwatch(StopwatchConfig::default());
        let t0 = Instant::now();
        sw.touch(TouchSample::down(origin(), t0));
        sw.touch(TouchSample::up(origin(), ms(t0, 200)));
        assert_eq!(sw.state(), TimerState::Idle);
        assert_eq!(sw.pending_hold(), None);

        // The cancelled timer firing late must not arm.
        assert!(sw.hold_elapsed(1, ms(t0, 500)).is_empty());
        assert_eq!(sw.state(), TimerState::Idle);
        assert!(sink.is_empty());
    }

    #[test]
    fn stale_token_from_previous_press_is_ignored() {
        let (mut sw, _, _) = stopwatch(StopwatchConfig::default());
        let t0 = Instant::now();
        sw.touch(TouchSample::down(origin(), t0));
        sw.touch(TouchSample::up(origin(), ms(t0, 100)));
        let token = sw
            .touch(TouchSample::down(origin(), ms(t0, 200)))
            .hold_token()
            .unwrap();
        assert_eq!(token, 2);

        sw.hold_elapsed(1, ms(t0, 500));
        assert_eq!(sw.state(), TimerState::Holding);
        sw.hold_elapsed(2, ms(t0, 700));
        assert_eq!(sw.state(), TimerState::Armed);
    }

    #[test]
    fn repeated_press_does_not_duplicate_hold_timer() {
        let (mut sw, _, _) = stopwatch(StopwatchConfig::default());
        let t0 = Instant::now();
        sw.touch(TouchSample::down(origin(), t0));
        let again = sw.touch(TouchSample::down(origin(), ms(t0, 50)));
        assert!(again.requests.is_empty());
        assert_eq!(sw.pending_hold(), Some(1));
    }

    #[test]
    fn press_while_running_records_exactly_one_solve() {
        let (mut sw, sink, staged) = stopwatch(StopwatchConfig::default());
        sw.scramble_fetched(staged.seq, Ok("F2 D'".into()));
        let t0 = Instant::now();
        start_solve(&mut sw, t0);

        sw.tick(ms(t0, 5_000));
        let mut stop = sw.touch(TouchSample::down(origin(), ms(t0, 600 + 12_340)));
        assert_eq!(sw.state(), TimerState::Idle);

        let record = stop.solve().unwrap().clone();
        assert!((record.elapsed_secs - 12.34).abs() < 1e-9);
        assert_eq!(record.scramble, "R U R' U'");
        assert_eq!(record.penalty, Penalty::None);
        assert!(stop.requests.contains(&Request::Persist(record.clone())));
        assert!(sink.is_empty());

        sw.persist_inline(&mut stop);
        assert_eq!(sink.len(), 1);
        assert!(!stop
            .requests
            .iter()
            .any(|r| matches!(r, Request::Persist(_))));
        assert!(stop
            .events
            .iter()
            .any(|e| matches!(e, Event::SolvePersisted { solve_id, .. } if *solve_id == record.id)));
        assert!(stop
            .events
            .iter()
            .any(|e| matches!(e, Event::ScrambleChanged { scramble, .. } if scramble == "F2 D'")));

        // Promotion, then a fresh staged fetch.
        assert_eq!(sw.current_scramble(), "F2 D'");
        assert_eq!(sw.staged_scramble(), None);
        let ticket = stop.scramble_ticket().unwrap();
        assert!(ticket.seq > staged.seq);

        // The release of the stopping press is not a new start.
        sw.touch(TouchSample::up(origin(), ms(t0, 13_000)));
        assert_eq!(sw.state(), TimerState::Idle);
        assert_eq!(sink.len(), 1);
        // The final time stays on screen.
        assert!((sw.snapshot().elapsed_secs - 12.34).abs() < 1e-9);
    }

    #[test]
    fn scramble_captured_at_start_survives_reload_response_mid_solve() {
        let (mut sw, sink, _) = stopwatch(StopwatchConfig::default());
        let reload = sw.reload_scramble().scramble_ticket().unwrap();
        let t0 = Instant::now();
        start_solve(&mut sw, t0);

        sw.scramble_fetched(reload.seq, Ok("B L".into()));
        assert_eq!(sw.current_scramble(), "R U R' U'");

        let mut stop = sw.touch(TouchSample::down(origin(), ms(t0, 5_000)));
        sw.persist_inline(&mut stop);
        assert_eq!(stop.solve().unwrap().scramble, "R U R' U'");
        assert_eq!(sw.current_scramble(), "B L");
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn ticks_are_monotonic_while_running() {
        let (mut sw, _, _) = stopwatch(StopwatchConfig::default());
        let t0 = Instant::now();
        start_solve(&mut sw, t0);
        let mut last = 0.0;
        for step in [700u64, 716, 733, 733, 720, 900] {
            sw.tick(ms(t0, step));
            assert!(sw.elapsed_secs() >= last);
            last = sw.elapsed_secs();
        }
        assert!((last - 0.3).abs() < 1e-9);
    }

    #[test]
    fn drag_past_threshold_cancels_pending_hold() {
        let (mut sw, _, _) = stopwatch(StopwatchConfig::default());
        let t0 = Instant::now();
        sw.touch(TouchSample::down(origin(), t0));
        sw.touch(TouchSample::moved(Point::new(130.0, 100.0), ms(t0, 100)));
        assert_eq!(sw.state(), TimerState::Idle);
        assert_eq!(sw.pending_hold(), None);
        assert!(sw.hold_elapsed(1, ms(t0, 500)).is_empty());
    }

    #[test]
    fn left_swipe_from_armed_discards_without_record() {
        let (mut sw, sink, _) = stopwatch(StopwatchConfig::default());
        let t0 = Instant::now();
        sw.touch(TouchSample::down(origin(), t0));
        sw.hold_elapsed(1, ms(t0, 500));
        sw.touch(TouchSample::up(Point::new(60.0, 105.0), ms(t0, 700)));
        assert_eq!(sw.state(), TimerState::Idle);
        assert!(sink.is_empty());
    }

    #[test]
    fn right_swipe_requests_new_current_scramble() {
        let (mut sw, _, staged) = stopwatch(StopwatchConfig::default());
        let t0 = Instant::now();
        sw.touch(TouchSample::down(origin(), t0));
        let r = sw.touch(TouchSample::up(Point::new(140.0, 95.0), ms(t0, 150)));
        assert_eq!(sw.state(), TimerState::Idle);
        let reload = r.scramble_ticket().unwrap();

        // The staged fetch from construction is now stale.
        assert!(sw.scramble_fetched(staged.seq, Ok("old".into())).is_empty());
        let r = sw.scramble_fetched(reload.seq, Ok("U2 F".into()));
        assert_eq!(sw.current_scramble(), "U2 F");
        assert!(r.scramble_ticket().is_some());
    }

    #[test]
    fn swipe_during_solve_discards_it() {
        let (mut sw, sink, _) = stopwatch(StopwatchConfig {
            phases: 2,
            ..StopwatchConfig::default()
        });
        let t0 = Instant::now();
        start_solve(&mut sw, t0);
        // First press records a split; its release swipes left.
        sw.touch(TouchSample::down(origin(), ms(t0, 2_000)));
        let r = sw.touch(TouchSample::up(Point::new(20.0, 100.0), ms(t0, 2_100)));
        assert_eq!(sw.state(), TimerState::Idle);
        assert!(r
            .events
            .iter()
            .any(|e| matches!(e, Event::SolveDiscarded { .. })));
        assert!(sink.is_empty());
    }

    #[test]
    fn multi_phase_records_splits() {
        let (mut sw, sink, _) = stopwatch(StopwatchConfig {
            phases: 3,
            ..StopwatchConfig::default()
        });
        let t0 = Instant::now();
        start_solve(&mut sw, t0);

        sw.touch(TouchSample::down(origin(), ms(t0, 3_600)));
        sw.touch(TouchSample::up(origin(), ms(t0, 3_700)));
        assert_eq!(sw.state(), TimerState::Running);
        sw.touch(TouchSample::down(origin(), ms(t0, 7_600)));
        sw.touch(TouchSample::up(origin(), ms(t0, 7_700)));
        assert_eq!(sw.snapshot().splits.len(), 2);

        let mut stop = sw.touch(TouchSample::down(origin(), ms(t0, 10_600)));
        sw.persist_inline(&mut stop);
        let record = stop.solve().unwrap();
        assert_eq!(record.splits.len(), 2);
        assert!((record.splits[0] - 3.0).abs() < 1e-9);
        assert!((record.splits[1] - 7.0).abs() < 1e-9);
        assert!((record.elapsed_secs - 10.0).abs() < 1e-9);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn inspection_precedes_solve_and_penalises_overrun() {
        let (mut sw, sink, _) = stopwatch(StopwatchConfig {
            inspection: true,
            inspection_counts_down: true,
            ..StopwatchConfig::default()
        });
        let t0 = Instant::now();

        // Tap starts inspection.
        sw.touch(TouchSample::down(origin(), t0));
        sw.touch(TouchSample::up(origin(), ms(t0, 100)));
        assert_eq!(sw.state(), TimerState::Inspecting);
        assert!(sw.is_timing());
        sw.tick(ms(t0, 5_100));
        let remaining = sw.snapshot().inspection_secs.unwrap();
        assert!((remaining - 10.0).abs() < 1e-9);

        // Early release during inspection goes back to inspecting.
        sw.touch(TouchSample::down(origin(), ms(t0, 6_000)));
        sw.touch(TouchSample::up(origin(), ms(t0, 6_100)));
        assert_eq!(sw.state(), TimerState::Inspecting);

        // Start at 16.1s of inspection: +2.
        let token = sw
            .touch(TouchSample::down(origin(), ms(t0, 15_000)))
            .hold_token()
            .unwrap();
        sw.hold_elapsed(token, ms(t0, 15_500));
        sw.touch(TouchSample::up(origin(), ms(t0, 16_200)));
        assert_eq!(sw.state(), TimerState::Running);

        let mut stop = sw.touch(TouchSample::down(origin(), ms(t0, 26_200)));
        sw.persist_inline(&mut stop);
        assert_eq!(stop.solve().unwrap().penalty, Penalty::PlusTwo);
        assert_eq!(sink.len(), 1);
        assert!(!sw.is_timing());
    }

    #[test]
    fn haptic_pulse_fires_on_arming() {
        let haptics = Arc::new(RecordingHaptics::default());
        let (mut sw, _) = Stopwatch::new(
            StopwatchConfig {
                haptics: Some(HapticIntensity::Heavy),
                ..StopwatchConfig::default()
            },
            &source,
            Arc::new(MemorySolveSink::new()),
            haptics.clone(),
        )
        .unwrap();
        let t0 = Instant::now();
        sw.touch(TouchSample::down(origin(), t0));
        assert!(haptics.0.lock().unwrap().is_empty());
        sw.hold_elapsed(1, ms(t0, 500));
        assert_eq!(*haptics.0.lock().unwrap(), vec![HapticIntensity::Heavy]);
    }

    #[test]
    fn sink_failure_still_returns_to_idle() {
        struct Failing;
        impl SolveSink for Failing {
            fn record(&self, record: SolveRecord) -> Result<(), crate::error::SinkError> {
                Err(crate::error::SinkError::PersistenceFailure {
                    solve_id: record.id,
                    reason: "disk full".into(),
                })
            }
        }

        let (mut sw, _) =
            Stopwatch::new(StopwatchConfig::default(), &source, Arc::new(Failing), Arc::new(NoHaptics))
                .unwrap();
        let t0 = Instant::now();
        start_solve(&mut sw, t0);
        let mut stop = sw.touch(TouchSample::down(origin(), ms(t0, 4_600)));
        assert_eq!(sw.state(), TimerState::Idle);
        sw.persist_inline(&mut stop);
        assert!(stop
            .events
            .iter()
            .any(|e| matches!(e, Event::PersistenceFailed { reason, .. } if reason.contains("disk full"))));
        assert_eq!(sw.state(), TimerState::Idle);
        assert!((sw.snapshot().elapsed_secs - 4.0).abs() < 1e-9);
    }

    #[test]
    fn persisted_reports_outcome_without_touching_state() {
        let (mut sw, sink, _) = stopwatch(StopwatchConfig::default());
        let t0 = Instant::now();
        start_solve(&mut sw, t0);
        let stop = sw.touch(TouchSample::down(origin(), ms(t0, 2_600)));
        let solve_id = stop.solve().unwrap().id;
        let before = sw.snapshot();

        let ok = sw.persisted(solve_id, Ok(()));
        assert!(matches!(ok.events.as_slice(), [Event::SolvePersisted { .. }]));
        assert!(ok.requests.is_empty());

        let failed = sw.persisted(
            solve_id,
            Err(SinkError::PersistenceFailure {
                solve_id,
                reason: "locked".into(),
            }),
        );
        assert!(matches!(
            failed.events.as_slice(),
            [Event::PersistenceFailed { reason, .. }] if reason.contains("locked")
        ));
        assert_eq!(sw.snapshot(), before);
        // The caller owns the sink call; reporting an outcome stores nothing.
        assert!(sink.is_empty());
    }

    #[test]
    fn stop_without_staged_scramble_keeps_current_and_flags_pending() {
        let (mut sw, _, _) = stopwatch(StopwatchConfig::default());
        let t0 = Instant::now();
        start_solve(&mut sw, t0);
        let stop = sw.touch(TouchSample::down(origin(), ms(t0, 3_600)));

        assert!(stop.solve().is_some());
        assert!(!stop
            .events
            .iter()
            .any(|e| matches!(e, Event::ScrambleChanged { .. })));
        assert_eq!(sw.current_scramble(), "R U R' U'");
        assert!(sw.snapshot().scramble_pending);

        // The refetch fills `current` and announces it.
        let ticket = stop.scramble_ticket().unwrap();
        let r = sw.scramble_fetched(ticket.seq, Ok("D2 B'".into()));
        assert_eq!(sw.current_scramble(), "D2 B'");
        assert!(!sw.snapshot().scramble_pending);
        assert!(r
            .events
            .iter()
            .any(|e| matches!(e, Event::ScrambleChanged { scramble, .. } if scramble == "D2 B'")));
    }

    #[test]
    fn scramble_failure_keeps_current() {
        let (mut sw, _, staged) = stopwatch(StopwatchConfig::default());
        let r = sw.scramble_fetched(
            staged.seq,
            Err(ScrambleError::Unavailable {
                puzzle_type: 3,
                subtype: 0,
                reason: "offline".into(),
            }),
        );
        assert!(matches!(r.events.as_slice(), [Event::ScrambleUnavailable { .. }]));
        assert_eq!(sw.current_scramble(), "R U R' U'");
        assert!(sw.snapshot().scramble_unavailable);
        assert_eq!(sw.state(), TimerState::Idle);
    }

    #[test]
    fn hidden_running_precision_hides_display_only_while_running() {
        let (mut sw, _, _) = stopwatch(StopwatchConfig {
            running_precision: Precision::Hidden,
            ..StopwatchConfig::default()
        });
        let t0 = Instant::now();
        start_solve(&mut sw, t0);
        sw.tick(ms(t0, 1_600));
        assert_eq!(sw.snapshot().display, None);
        sw.touch(TouchSample::down(origin(), ms(t0, 2_600)));
        assert_eq!(sw.snapshot().display.as_deref(), Some("2.000"));
    }

    #[test]
    fn config_is_deferred_until_idle() {
        let (mut sw, _, _) = stopwatch(StopwatchConfig::default());
        let t0 = Instant::now();
        start_solve(&mut sw, t0);
        let r = sw.apply_config(StopwatchConfig {
            phases: 2,
            puzzle: Puzzle::new(4, 0),
            ..StopwatchConfig::default()
        });
        assert!(r.is_empty());
        assert_eq!(sw.config().phases, 1);

        let stop = sw.touch(TouchSample::down(origin(), ms(t0, 3_000)));
        assert!(stop.solve().is_some());
        assert_eq!(sw.config().phases, 2);
        assert_eq!(sw.puzzle(), Puzzle::new(4, 0));
        assert!(stop
            .events
            .iter()
            .any(|e| matches!(e, Event::ConfigApplied { .. })));
    }

    #[test]
    fn deferred_config_lands_on_early_release() {
        let (mut sw, _, _) = stopwatch(StopwatchConfig::default());
        let t0 = Instant::now();
        sw.touch(TouchSample::down(origin(), t0));
        let r = sw.apply_config(StopwatchConfig {
            phases: 2,
            ..StopwatchConfig::default()
        });
        assert!(r.is_empty());

        let release = sw.touch(TouchSample::up(origin(), ms(t0, 100)));
        assert_eq!(sw.state(), TimerState::Idle);
        assert_eq!(sw.config().phases, 2);
        assert!(release
            .events
            .iter()
            .any(|e| matches!(e, Event::ConfigApplied { .. })));

        // The next solve runs with two phases: the first press is a split.
        let t1 = ms(t0, 1_000);
        start_solve(&mut sw, t1);
        sw.touch(TouchSample::down(origin(), ms(t1, 2_600)));
        assert_eq!(sw.state(), TimerState::Running);
        assert_eq!(sw.snapshot().splits.len(), 1);
    }

    #[test]
    fn deferred_config_lands_on_drag_cancel() {
        let (mut sw, _, _) = stopwatch(StopwatchConfig::default());
        let t0 = Instant::now();
        sw.touch(TouchSample::down(origin(), t0));
        sw.hold_elapsed(1, ms(t0, 500));
        sw.apply_config(StopwatchConfig {
            swipe_threshold: 50.0,
            ..StopwatchConfig::default()
        });
        assert_eq!(sw.config().swipe_threshold, 20.0);

        let drag = sw.touch(TouchSample::moved(Point::new(130.0, 100.0), ms(t0, 600)));
        assert_eq!(sw.state(), TimerState::Idle);
        assert_eq!(sw.config().swipe_threshold, 50.0);
        assert!(drag
            .events
            .iter()
            .any(|e| matches!(e, Event::ConfigApplied { .. })));
    }

    #[test]
    fn deferred_config_waits_while_inspection_is_open() {
        let (mut sw, _, _) = stopwatch(StopwatchConfig {
            inspection: true,
            ..StopwatchConfig::default()
        });
        let t0 = Instant::now();
        sw.touch(TouchSample::down(origin(), t0));
        sw.touch(TouchSample::up(origin(), ms(t0, 100)));
        assert_eq!(sw.state(), TimerState::Inspecting);

        sw.apply_config(StopwatchConfig {
            inspection: true,
            phases: 3,
            ..StopwatchConfig::default()
        });
        sw.touch(TouchSample::down(origin(), ms(t0, 1_000)));
        sw.touch(TouchSample::up(origin(), ms(t0, 1_100)));
        assert_eq!(sw.state(), TimerState::Inspecting);
        assert_eq!(sw.config().phases, 1);
    }
}
