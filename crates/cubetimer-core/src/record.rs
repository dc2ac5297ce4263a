use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scramble::Puzzle;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Penalty {
    #[default]
    None,
    PlusTwo,
    Dnf,
}

impl Penalty {
    /// Penalty for an inspection that lasted `secs` (WCA 15 s rule, 2 s grace).
    pub fn for_inspection(secs: f64) -> Self {
        if secs > 17.0 {
            Penalty::Dnf
        } else if secs > 15.0 {
            Penalty::PlusTwo
        } else {
            Penalty::None
        }
    }
}

/// Reference to the session a solve belongs to. Owned by the sink side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionRef(pub String);

impl SessionRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl Default for SessionRef {
    fn default() -> Self {
        Self::new("default")
    }
}

/// One finished timing cycle. Immutable once handed to a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub scramble: String,
    pub puzzle_type: u32,
    pub puzzle_subtype: u32,
    pub penalty: Penalty,
    /// Cumulative split times for multi-phase solves; empty otherwise.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub splits: Vec<f64>,
    pub session: SessionRef,
}

impl SolveRecord {
    pub(crate) fn new(
        elapsed_secs: f64,
        scramble: String,
        puzzle: Puzzle,
        penalty: Penalty,
        splits: Vec<f64>,
        session: SessionRef,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            elapsed_secs,
            scramble,
            puzzle_type: puzzle.puzzle_type,
            puzzle_subtype: puzzle.subtype,
            penalty,
            splits,
            session,
        }
    }

    /// Time with the penalty applied; `None` for a DNF.
    pub fn effective_secs(&self) -> Option<f64> {
        match self.penalty {
            Penalty::None => Some(self.elapsed_secs),
            Penalty::PlusTwo => Some(self.elapsed_secs + 2.0),
            Penalty::Dnf => None,
        }
    }
}
