//! Double-buffered scramble session.
//!
//! `current` is the scramble for the solve about to happen (or happening).
//! `staged` is the next solve's scramble and is never exposed as current
//! until [`ScramblePipeline::promote`].
//!
//! Every fetch is described by a [`ScrambleTicket`] carrying a monotonic
//! sequence number. Only the response for the latest ticket is applied;
//! anything older is dropped on arrival.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Puzzle, ScrambleSource};
use crate::error::ScrambleError;

/// Which buffer a fetch is meant to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrambleSlot {
    Current,
    Staged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrambleTicket {
    pub seq: u64,
    pub slot: ScrambleSlot,
    pub puzzle: Puzzle,
}

/// Result of feeding a fetch response back into the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// `current` was replaced. A staged fetch follows when nothing is staged.
    Current { follow_up: Option<ScrambleTicket> },
    /// `staged` was filled.
    Staged,
    /// Superseded by a newer ticket; nothing changed.
    Stale,
    /// The source failed; buffers unchanged.
    Failed(ScrambleError),
}

#[derive(Debug, Clone)]
pub struct ScramblePipeline {
    puzzle: Puzzle,
    current: String,
    staged: Option<String>,
    next_seq: u64,
    latest: Option<ScrambleTicket>,
    /// `current` has already been solved and a replacement is on its way.
    pending: bool,
    /// The most recent fetch failed.
    unavailable: bool,
}

impl ScramblePipeline {
    /// Fetch the first scramble synchronously and issue the staged prefetch.
    pub fn new(
        source: &dyn ScrambleSource,
        puzzle: Puzzle,
    ) -> Result<(Self, ScrambleTicket), ScrambleError> {
        let current = source.generate(&puzzle)?;
        let mut pipeline = Self {
            puzzle,
            current,
            staged: None,
            next_seq: 0,
            latest: None,
            pending: false,
            unavailable: false,
        };
        let ticket = pipeline.issue(ScrambleSlot::Staged);
        Ok((pipeline, ticket))
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn staged(&self) -> Option<&str> {
        self.staged.as_deref()
    }

    pub fn puzzle(&self) -> Puzzle {
        self.puzzle
    }

    pub fn latest_ticket(&self) -> Option<ScrambleTicket> {
        self.latest
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn is_unavailable(&self) -> bool {
        self.unavailable
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Move `staged` into `current`, then issue the fetch that refills the
    /// buffer. Promotion always completes before the ticket exists.
    pub fn promote(&mut self) -> ScrambleTicket {
        match self.staged.take() {
            Some(next) => {
                self.current = next;
                self.pending = false;
                self.issue(ScrambleSlot::Staged)
            }
            None => {
                debug!("nothing staged at promotion; refetching current scramble");
                self.pending = true;
                self.issue(ScrambleSlot::Current)
            }
        }
    }

    /// Drop the staged scramble and ask for a fresh current one.
    pub fn reload(&mut self) -> ScrambleTicket {
        self.staged = None;
        self.issue(ScrambleSlot::Current)
    }

    /// Switch puzzles. Both buffers belong to the old puzzle, so this is a
    /// reload against the new one.
    pub fn set_puzzle(&mut self, puzzle: Puzzle) -> ScrambleTicket {
        self.puzzle = puzzle;
        self.reload()
    }

    /// Apply a fetch response.
    ///
    /// `solving` must be true while a solve is in progress: a fresh
    /// `Current` response then lands in `staged` so the scramble being
    /// solved never changes underneath the solver.
    pub fn apply(
        &mut self,
        seq: u64,
        result: Result<String, ScrambleError>,
        solving: bool,
    ) -> Applied {
        let ticket = match self.latest {
            Some(ticket) if ticket.seq == seq => ticket,
            _ => {
                debug!(seq, latest = ?self.latest.map(|t| t.seq), "dropping stale scramble response");
                return Applied::Stale;
            }
        };
        self.latest = None;

        let text = match result {
            Ok(text) => text,
            Err(err) => {
                self.unavailable = true;
                return Applied::Failed(err);
            }
        };
        self.unavailable = false;

        match ticket.slot {
            ScrambleSlot::Staged => {
                self.staged = Some(text);
                Applied::Staged
            }
            ScrambleSlot::Current if solving => {
                self.staged = Some(text);
                Applied::Staged
            }
            ScrambleSlot::Current => {
                self.current = text;
                self.pending = false;
                let follow_up = self
                    .staged
                    .is_none()
                    .then(|| self.issue(ScrambleSlot::Staged));
                Applied::Current { follow_up }
            }
        }
    }

    fn issue(&mut self, slot: ScrambleSlot) -> ScrambleTicket {
        self.next_seq += 1;
        let ticket = ScrambleTicket {
            seq: self.next_seq,
            slot,
            puzzle: self.puzzle,
        };
        self.latest = Some(ticket);
        ticket
    }
}
