//! Persistence and feedback collaborators.
//!
//! The engine only knows these narrow contracts; storage schemas and device
//! drivers live behind them.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::SinkError;
use crate::record::SolveRecord;

/// Durable store for finished solves. Called exactly once per solve.
pub trait SolveSink: Send + Sync {
    fn record(&self, record: SolveRecord) -> Result<(), SinkError>;
}

/// In-memory sink. Cloning shares the underlying list.
#[derive(Debug, Clone, Default)]
pub struct MemorySolveSink {
    solves: Arc<Mutex<Vec<SolveRecord>>>,
}

impl MemorySolveSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn solves(&self) -> Vec<SolveRecord> {
        self.solves
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.solves.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SolveSink for MemorySolveSink {
    fn record(&self, record: SolveRecord) -> Result<(), SinkError> {
        let id = record.id;
        self.solves
            .lock()
            .map_err(|_| SinkError::PersistenceFailure {
                solve_id: id,
                reason: "solve list poisoned".into(),
            })?
            .push(record);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HapticIntensity {
    Light,
    Medium,
    Heavy,
    Soft,
    #[default]
    Rigid,
}

/// Fire-and-forget feedback when the timer arms.
pub trait Haptics: Send + Sync {
    fn pulse(&self, intensity: HapticIntensity);
}

/// Haptics for hosts without a vibration motor.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHaptics;

impl Haptics for NoHaptics {
    fn pulse(&self, _intensity: HapticIntensity) {}
}
