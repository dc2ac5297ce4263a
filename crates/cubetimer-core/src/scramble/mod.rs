mod pipeline;
mod random_move;

pub use pipeline::{Applied, ScramblePipeline, ScrambleSlot, ScrambleTicket};
pub use random_move::RandomMoveScrambler;

use serde::{Deserialize, Serialize};

use crate::error::ScrambleError;

/// Puzzle identity. Opaque to the engine; only the scramble source and the
/// solve sink interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Puzzle {
    pub puzzle_type: u32,
    #[serde(default)]
    pub subtype: u32,
}

impl Puzzle {
    pub fn new(puzzle_type: u32, subtype: u32) -> Self {
        Self {
            puzzle_type,
            subtype,
        }
    }
}

impl Default for Puzzle {
    fn default() -> Self {
        Self::new(3, 0)
    }
}

/// Black-box scramble generator.
///
/// Must tolerate repeated calls while earlier calls are still in flight;
/// responses are matched by ticket sequence, never by call identity.
pub trait ScrambleSource: Send + Sync {
    fn generate(&self, puzzle: &Puzzle) -> Result<String, ScrambleError>;
}

impl<F> ScrambleSource for F
where
    F: Fn(&Puzzle) -> Result<String, ScrambleError> + Send + Sync,
{
    fn generate(&self, puzzle: &Puzzle) -> Result<String, ScrambleError> {
        self(puzzle)
    }
}
