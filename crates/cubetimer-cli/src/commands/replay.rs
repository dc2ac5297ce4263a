//! Scripted replay of a touch session.
//!
//! A script is one step per line, each stamped in milliseconds from the
//! start of the session:
//!
//! ```text
//! # press, hold, release, solve, stop
//! down 100 100 @0
//! up 100 100 @600
//! tick @5000
//! down 100 100 @12940
//! up 100 100 @13000
//! ```
//!
//! Verbs: `down`, `move`, `up` (with a position), `tick` and `reload`.
//! Hold timers fire at their deadline on the virtual clock, while scramble
//! fetches and solve persistence resolve immediately, so a script always
//! replays identically.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use cubetimer_core::{
    Config, Event, MemorySolveSink, NoHaptics, Point, Puzzle, RandomMoveScrambler, Reaction,
    Request, ScrambleError, ScrambleSource, ScrambleTicket, Stopwatch, TimerSnapshot, TouchSample,
};
use serde::Serialize;
use tracing::debug;

#[derive(Args)]
pub struct ReplayArgs {
    /// Script file, one step per line
    script: PathBuf,
    /// Config file to use instead of the built-in defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Seed for the scrambler
    #[arg(long, default_value = "0")]
    seed: u64,
    /// Use this text for every scramble instead of generating one
    #[arg(long)]
    scramble: Option<String>,
    /// Print recorded solves instead of the event stream
    #[arg(long)]
    solves: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Down(Point),
    Move(Point),
    Up(Point),
    Tick,
    Reload,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub at_ms: u64,
    pub action: Action,
}

/// One line of replay output.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Output {
    Event(Event),
    Snapshot { snapshot: TimerSnapshot },
}

pub fn parse_script(text: &str) -> Result<Vec<Step>, String> {
    let mut steps = Vec::new();
    let mut last_ms = 0;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }

        let (body, stamp) = line
            .rsplit_once('@')
            .ok_or_else(|| format!("line {line_no}: missing '@<ms>' timestamp"))?;
        let at_ms: u64 = stamp
            .trim()
            .parse()
            .map_err(|e| format!("line {line_no}: bad timestamp '{}': {e}", stamp.trim()))?;
        if at_ms < last_ms {
            return Err(format!(
                "line {line_no}: timestamp {at_ms} is earlier than {last_ms}"
            ));
        }
        last_ms = at_ms;

        let mut words = body.split_whitespace();
        let verb = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();

        let point = || -> Result<Point, String> {
            match args.as_slice() {
                [x, y] => {
                    let x = x
                        .parse()
                        .map_err(|_| format!("line {line_no}: bad x coordinate '{x}'"))?;
                    let y = y
                        .parse()
                        .map_err(|_| format!("line {line_no}: bad y coordinate '{y}'"))?;
                    Ok(Point::new(x, y))
                }
                _ => Err(format!("line {line_no}: '{verb}' takes an x and y position")),
            }
        };
        let no_args = || -> Result<(), String> {
            if args.is_empty() {
                Ok(())
            } else {
                Err(format!("line {line_no}: '{verb}' takes no arguments"))
            }
        };

        let action = match verb {
            "down" => Action::Down(point()?),
            "move" => Action::Move(point()?),
            "up" => Action::Up(point()?),
            "tick" => no_args().map(|_| Action::Tick)?,
            "reload" => no_args().map(|_| Action::Reload)?,
            other => return Err(format!("line {line_no}: unknown step '{other}'")),
        };
        steps.push(Step { at_ms, action });
    }

    Ok(steps)
}

/// Runs a stopwatch against a virtual clock.
pub struct Replay {
    stopwatch: Stopwatch,
    source: Arc<dyn ScrambleSource>,
    origin: Instant,
    now: Instant,
    holds: Vec<(Instant, u64)>,
    fetches: VecDeque<ScrambleTicket>,
    output: Vec<Output>,
}

impl Replay {
    pub fn new(
        config: &Config,
        source: Arc<dyn ScrambleSource>,
        sink: MemorySolveSink,
    ) -> Result<Self, ScrambleError> {
        let (stopwatch, initial) = Stopwatch::new(
            config.stopwatch(),
            source.as_ref(),
            Arc::new(sink),
            Arc::new(NoHaptics),
        )?;
        let origin = Instant::now();
        let mut replay = Self {
            stopwatch,
            source,
            origin,
            now: origin,
            holds: Vec::new(),
            fetches: VecDeque::new(),
            output: Vec::new(),
        };
        replay.absorb(initial);
        Ok(replay)
    }

    pub fn run(&mut self, steps: &[Step]) {
        for step in steps {
            let at = self.origin + Duration::from_millis(step.at_ms);
            self.advance_to(at);
            let reaction = match step.action {
                Action::Down(p) => self.stopwatch.touch(TouchSample::down(p, at)),
                Action::Move(p) => self.stopwatch.touch(TouchSample::moved(p, at)),
                Action::Up(p) => self.stopwatch.touch(TouchSample::up(p, at)),
                Action::Reload => self.stopwatch.reload_scramble(),
                Action::Tick => {
                    self.stopwatch.tick(at);
                    self.output.push(Output::Snapshot {
                        snapshot: self.stopwatch.snapshot(),
                    });
                    Reaction::default()
                }
            };
            self.absorb(reaction);
        }
    }

    pub fn output(&self) -> &[Output] {
        &self.output
    }

    pub fn stopwatch(&self) -> &Stopwatch {
        &self.stopwatch
    }

    /// Fire every hold timer due by `at`, in deadline order.
    fn advance_to(&mut self, at: Instant) {
        loop {
            let due = self
                .holds
                .iter()
                .enumerate()
                .filter(|(_, (deadline, _))| *deadline <= at)
                .min_by_key(|(_, (deadline, _))| *deadline)
                .map(|(idx, _)| idx);
            let Some(idx) = due else { break };

            let (deadline, token) = self.holds.remove(idx);
            self.now = deadline;
            let reaction = self.stopwatch.hold_elapsed(token, deadline);
            self.absorb(reaction);
        }
        self.now = at;
    }

    fn absorb(&mut self, mut reaction: Reaction) {
        self.stopwatch.persist_inline(&mut reaction);
        self.output
            .extend(reaction.events.into_iter().map(Output::Event));
        for request in reaction.requests {
            match request {
                Request::Hold { token, after } => self.holds.push((self.now + after, token)),
                Request::FetchScramble(ticket) => self.fetches.push_back(ticket),
                Request::Persist(_) => {}
            }
        }
        while let Some(ticket) = self.fetches.pop_front() {
            debug!(seq = ticket.seq, "resolving scramble fetch");
            let result = self.source.generate(&ticket.puzzle);
            let reaction = self.stopwatch.scramble_fetched(ticket.seq, result);
            self.output
                .extend(reaction.events.into_iter().map(Output::Event));
            for request in reaction.requests {
                if let Request::FetchScramble(next) = request {
                    self.fetches.push_back(next);
                }
            }
        }
    }
}

pub fn run(args: ReplayArgs) -> Result<(), Box<dyn std::error::Error>> {
    let script = std::fs::read_to_string(&args.script)?;
    let steps = parse_script(&script)?;

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::default(),
    };
    let source: Arc<dyn ScrambleSource> = match args.scramble {
        Some(text) => Arc::new(move |_: &Puzzle| -> Result<String, ScrambleError> {
            Ok(text.clone())
        }),
        None => Arc::new(RandomMoveScrambler::seeded(args.seed)),
    };

    let sink = MemorySolveSink::new();
    let mut replay = Replay::new(&config, source, sink.clone())?;
    replay.run(&steps);

    if args.solves {
        println!("{}", serde_json::to_string_pretty(&sink.solves())?);
    } else {
        for line in replay.output() {
            println!("{}", serde_json::to_string(line)?);
        }
    }
    Ok(())
}
