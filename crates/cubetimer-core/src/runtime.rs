//! Async host for the [`Stopwatch`].
//!
//! A single task owns the engine and drains one input queue. Touch samples,
//! hold-timer firings, scramble results and config changes all arrive on
//! that queue, so the engine never sees two inputs at once.
//!
//! Outputs:
//! - every [`Event`] is published on a broadcast channel
//! - the latest [`TimerSnapshot`] is kept in a watch channel
//!
//! Scramble generation and solve persistence run on the blocking pool; a
//! slow source or sink never delays touch handling.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::config::StopwatchConfig;
use crate::error::{CoreError, ScrambleError, SinkError};
use crate::events::Event;
use crate::gesture::{Point, TouchSample};
use crate::record::{SessionRef, SolveRecord};
use crate::scramble::{Puzzle, ScrambleSource, ScrambleTicket};
use crate::sink::{Haptics, SolveSink};
use crate::timer::{Reaction, Request, Stopwatch, TimerSnapshot};

const EVENT_CAPACITY: usize = 256;

/// Current time on the runtime clock. Follows tokio's clock so paused-time
/// tests see consistent timestamps.
pub fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

#[derive(Debug)]
enum Input {
    Touch(TouchSample),
    HoldElapsed { token: u64 },
    ScrambleFetched {
        seq: u64,
        result: Result<String, ScrambleError>,
    },
    Persisted {
        solve_id: Uuid,
        result: Result<(), SinkError>,
    },
    ReloadScramble,
    SetPuzzle(Puzzle),
    SetSession(SessionRef),
    Configure(StopwatchConfig),
    Shutdown,
}

/// Cheap, cloneable front end to a running stopwatch task.
#[derive(Clone)]
pub struct StopwatchHandle {
    inputs: mpsc::UnboundedSender<Input>,
    events: broadcast::Sender<Event>,
    snapshots: watch::Receiver<TimerSnapshot>,
}

impl StopwatchHandle {
    fn send(&self, input: Input) -> Result<(), CoreError> {
        self.inputs.send(input).map_err(|_| CoreError::RuntimeClosed)
    }

    pub fn touch(&self, sample: TouchSample) -> Result<(), CoreError> {
        self.send(Input::Touch(sample))
    }

    /// Touch down at `position`, stamped now.
    pub fn press(&self, position: Point) -> Result<(), CoreError> {
        self.touch(TouchSample::down(position, now()))
    }

    pub fn drag(&self, position: Point) -> Result<(), CoreError> {
        self.touch(TouchSample::moved(position, now()))
    }

    pub fn release(&self, position: Point) -> Result<(), CoreError> {
        self.touch(TouchSample::up(position, now()))
    }

    pub fn reload_scramble(&self) -> Result<(), CoreError> {
        self.send(Input::ReloadScramble)
    }

    pub fn set_puzzle(&self, puzzle: Puzzle) -> Result<(), CoreError> {
        self.send(Input::SetPuzzle(puzzle))
    }

    pub fn set_session(&self, session: SessionRef) -> Result<(), CoreError> {
        self.send(Input::SetSession(session))
    }

    pub fn configure(&self, config: StopwatchConfig) -> Result<(), CoreError> {
        self.send(Input::Configure(config))
    }

    /// Stop the task. Pending timers and fetches are abandoned; a sink call
    /// already in flight still completes, but its outcome is not reported.
    pub fn shutdown(&self) -> Result<(), CoreError> {
        self.send(Input::Shutdown)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn snapshots(&self) -> watch::Receiver<TimerSnapshot> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        self.snapshots.borrow().clone()
    }
}

/// Build a stopwatch and spawn its task on the current tokio runtime.
///
/// The first scramble is generated before this returns.
pub fn start(
    config: StopwatchConfig,
    source: Arc<dyn ScrambleSource>,
    sink: Arc<dyn SolveSink>,
    haptics: Arc<dyn Haptics>,
) -> Result<(StopwatchHandle, JoinHandle<Stopwatch>), CoreError> {
    let (stopwatch, initial) = Stopwatch::new(config, source.as_ref(), sink, haptics)?;
    Ok(spawn(stopwatch, initial, source))
}

/// Spawn the task for an existing stopwatch. `initial` is the reaction
/// returned by [`Stopwatch::new`]; its requests are executed first.
///
/// The join handle yields the stopwatch back after shutdown.
pub fn spawn(
    stopwatch: Stopwatch,
    initial: Reaction,
    source: Arc<dyn ScrambleSource>,
) -> (StopwatchHandle, JoinHandle<Stopwatch>) {
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
    let (snapshot_tx, snapshot_rx) = watch::channel(stopwatch.snapshot());

    let driver = Driver {
        sink: stopwatch.sink(),
        stopwatch,
        source,
        inputs: input_tx.clone(),
        events: event_tx.clone(),
        snapshots: snapshot_tx,
    };
    let join = tokio::spawn(driver.run(input_rx, initial));

    let handle = StopwatchHandle {
        inputs: input_tx,
        events: event_tx,
        snapshots: snapshot_rx,
    };
    (handle, join)
}

struct Driver {
    stopwatch: Stopwatch,
    source: Arc<dyn ScrambleSource>,
    sink: Arc<dyn SolveSink>,
    inputs: mpsc::UnboundedSender<Input>,
    events: broadcast::Sender<Event>,
    snapshots: watch::Sender<TimerSnapshot>,
}

impl Driver {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Input>, initial: Reaction) -> Stopwatch {
        self.dispatch(initial);

        let mut tick_interval = self.stopwatch.config().tick_interval;
        let mut ticker = make_ticker(tick_interval);

        loop {
            tokio::select! {
                input = rx.recv() => {
                    let Some(input) = input else { break };
                    if matches!(input, Input::Shutdown) {
                        break;
                    }
                    let was_timing = self.stopwatch.is_timing();
                    let reaction = self.handle(input);
                    self.dispatch(reaction);

                    let configured = self.stopwatch.config().tick_interval;
                    if configured != tick_interval {
                        tick_interval = configured;
                        ticker = make_ticker(tick_interval);
                    } else if !was_timing && self.stopwatch.is_timing() {
                        ticker.reset();
                    }
                }
                _ = ticker.tick(), if self.stopwatch.is_timing() => {
                    self.stopwatch.tick(now());
                    self.publish_snapshot();
                }
            }
        }

        info!("stopwatch runtime stopped");
        self.stopwatch
    }

    fn handle(&mut self, input: Input) -> Reaction {
        trace!(?input, "stopwatch input");
        match input {
            Input::Touch(sample) => self.stopwatch.touch(sample),
            Input::HoldElapsed { token } => self.stopwatch.hold_elapsed(token, now()),
            Input::ScrambleFetched { seq, result } => self.stopwatch.scramble_fetched(seq, result),
            Input::Persisted { solve_id, result } => self.stopwatch.persisted(solve_id, result),
            Input::ReloadScramble => self.stopwatch.reload_scramble(),
            Input::SetPuzzle(puzzle) => self.stopwatch.set_puzzle(puzzle),
            Input::SetSession(session) => {
                self.stopwatch.set_session(session);
                Reaction::default()
            }
            Input::Configure(config) => self.stopwatch.apply_config(config),
            Input::Shutdown => Reaction::default(),
        }
    }

    fn dispatch(&mut self, reaction: Reaction) {
        for request in reaction.requests {
            match request {
                Request::Hold { token, after } => self.schedule_hold(token, after),
                Request::FetchScramble(ticket) => self.fetch_scramble(ticket),
                Request::Persist(record) => self.persist(record),
            }
        }
        self.publish_snapshot();
        for event in reaction.events {
            debug!(event = event.name(), "stopwatch event");
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }

    fn publish_snapshot(&self) {
        self.snapshots.send_replace(self.stopwatch.snapshot());
    }

    fn schedule_hold(&self, token: u64, after: Duration) {
        let inputs = self.inputs.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = inputs.send(Input::HoldElapsed { token });
        });
    }

    fn fetch_scramble(&self, ticket: ScrambleTicket) {
        let inputs = self.inputs.clone();
        let source = Arc::clone(&self.source);
        tokio::spawn(async move {
            let puzzle = ticket.puzzle;
            let result = tokio::task::spawn_blocking(move || source.generate(&puzzle))
                .await
                .unwrap_or_else(|join_err| {
                    Err(ScrambleError::Unavailable {
                        puzzle_type: puzzle.puzzle_type,
                        subtype: puzzle.subtype,
                        reason: join_err.to_string(),
                    })
                });
            let _ = inputs.send(Input::ScrambleFetched {
                seq: ticket.seq,
                result,
            });
        });
    }

    fn persist(&self, record: SolveRecord) {
        let inputs = self.inputs.clone();
        let sink = Arc::clone(&self.sink);
        let solve_id = record.id;
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || sink.record(record))
                .await
                .unwrap_or_else(|join_err| {
                    Err(SinkError::PersistenceFailure {
                        solve_id,
                        reason: join_err.to_string(),
                    })
                });
            let _ = inputs.send(Input::Persisted { solve_id, result });
        });
    }
}

fn make_ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}
