//! Generic random-turn scrambler for NxN cubes.
//!
//! `puzzle_type` is read as the cube order (2..=7). This is not a
//! random-state scrambler; it only avoids trivially cancelling turns.

use std::sync::Mutex;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use super::{Puzzle, ScrambleSource};
use crate::error::ScrambleError;

const FACES: [&str; 6] = ["U", "D", "R", "L", "F", "B"];
const SUFFIXES: [&str; 3] = ["", "'", "2"];

pub struct RandomMoveScrambler {
    rng: Mutex<Pcg64>,
}

impl RandomMoveScrambler {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(Pcg64::from_entropy()),
        }
    }

    /// Deterministic output for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(Pcg64::seed_from_u64(seed)),
        }
    }

    fn length_for(order: u32) -> usize {
        match order {
            2 => 11,
            3 => 20,
            n => (n as usize - 2) * 20,
        }
    }
}

impl Default for RandomMoveScrambler {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrambleSource for RandomMoveScrambler {
    fn generate(&self, puzzle: &Puzzle) -> Result<String, ScrambleError> {
        let order = puzzle.puzzle_type;
        if !(2..=7).contains(&order) {
            return Err(ScrambleError::Unavailable {
                puzzle_type: puzzle.puzzle_type,
                subtype: puzzle.subtype,
                reason: "random-move scrambler only supports 2x2 through 7x7".into(),
            });
        }

        let mut rng = self.rng.lock().map_err(|_| ScrambleError::Unavailable {
            puzzle_type: puzzle.puzzle_type,
            subtype: puzzle.subtype,
            reason: "scrambler state poisoned".into(),
        })?;

        let max_depth = (order / 2) as usize;
        let mut moves = Vec::with_capacity(Self::length_for(order));
        // Faces on the same axis share face_index / 2.
        let mut history: [Option<usize>; 2] = [None, None];

        while moves.len() < Self::length_for(order) {
            let face = rng.gen_range(0..FACES.len());
            if history[0] == Some(face) {
                continue;
            }
            let same_axis = |f: Option<usize>| f.map(|f| f / 2) == Some(face / 2);
            if same_axis(history[0]) && same_axis(history[1]) {
                continue;
            }
            history = [Some(face), history[0]];

            let depth = if max_depth > 1 {
                rng.gen_range(1..=max_depth)
            } else {
                1
            };
            let suffix = SUFFIXES[rng.gen_range(0..SUFFIXES.len())];
            let turn = match depth {
                1 => FACES[face].to_string(),
                2 => format!("{}w", FACES[face]),
                d => format!("{d}{}w", FACES[face]),
            };
            moves.push(format!("{turn}{suffix}"));
        }

        Ok(moves.join(" "))
    }
}
