//! Touch gesture classification.
//!
//! A [`GestureTracker`] follows one contact at a time. It turns raw
//! down/move/up samples into [`Intent`]s for the stopwatch:
//!
//! ```text
//! Down -> Press
//! Move (first time past threshold) -> DragPastThreshold
//! Up -> Release(Gesture)
//! ```
//!
//! Release classification looks only at the net displacement between the
//! down and up samples. Timing plays no part in it.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::GestureError;

/// Default swipe distance threshold, in touch-surface units.
pub const DEFAULT_SWIPE_THRESHOLD: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TouchPhase {
    Down,
    Move,
    Up,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One raw sample for the single tracked contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchSample {
    pub phase: TouchPhase,
    pub position: Point,
    pub at: Instant,
}

impl TouchSample {
    pub fn down(position: Point, at: Instant) -> Self {
        Self {
            phase: TouchPhase::Down,
            position,
            at,
        }
    }

    pub fn moved(position: Point, at: Instant) -> Self {
        Self {
            phase: TouchPhase::Move,
            position,
            at,
        }
    }

    pub fn up(position: Point, at: Instant) -> Self {
        Self {
            phase: TouchPhase::Up,
            position,
            at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
    Down,
}

/// How a contact ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "direction")]
pub enum Gesture {
    Tap,
    Swipe(SwipeDirection),
}

impl Gesture {
    pub fn is_swipe(self) -> bool {
        matches!(self, Gesture::Swipe(_))
    }
}

/// Discrete input for the stopwatch state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    /// A new contact touched down.
    Press { at: Instant },
    /// The contact moved past the swipe threshold. Emitted once per contact.
    DragPastThreshold { at: Instant },
    /// The contact lifted.
    Release { gesture: Gesture, at: Instant },
}

/// Classify a net displacement vector.
///
/// Horizontal wins only when strictly larger than vertical, and vice versa,
/// so an exact diagonal is a tap.
pub fn classify(dx: f64, dy: f64, threshold: f64) -> Gesture {
    let (h, v) = (dx.abs(), dy.abs());
    if h > threshold && h > v {
        if dx > 0.0 {
            Gesture::Swipe(SwipeDirection::Right)
        } else {
            Gesture::Swipe(SwipeDirection::Left)
        }
    } else if v > threshold && v > h {
        if dy > 0.0 {
            Gesture::Swipe(SwipeDirection::Down)
        } else {
            Gesture::Swipe(SwipeDirection::Up)
        }
    } else {
        Gesture::Tap
    }
}

#[derive(Debug, Clone, Copy)]
struct Contact {
    origin: Point,
    dragged: bool,
}

/// Single-contact tracker.
#[derive(Debug, Clone)]
pub struct GestureTracker {
    threshold: f64,
    contact: Option<Contact>,
}

impl GestureTracker {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            contact: None,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    pub fn is_pressed(&self) -> bool {
        self.contact.is_some()
    }

    /// Feed one sample.
    ///
    /// Returns `Ok(None)` for samples that carry no intent: a repeated
    /// `Down` on an active contact, or moves inside the threshold.
    pub fn feed(&mut self, sample: TouchSample) -> Result<Option<Intent>, GestureError> {
        match sample.phase {
            TouchPhase::Down => {
                if self.contact.is_some() {
                    return Ok(None);
                }
                self.contact = Some(Contact {
                    origin: sample.position,
                    dragged: false,
                });
                Ok(Some(Intent::Press { at: sample.at }))
            }
            TouchPhase::Move => {
                let threshold = self.threshold;
                let contact = self
                    .contact
                    .as_mut()
                    .ok_or(GestureError::InvalidSequence {
                        phase: TouchPhase::Move,
                    })?;
                if contact.dragged {
                    return Ok(None);
                }
                let dx = sample.position.x - contact.origin.x;
                let dy = sample.position.y - contact.origin.y;
                if dx.abs() > threshold || dy.abs() > threshold {
                    contact.dragged = true;
                    Ok(Some(Intent::DragPastThreshold { at: sample.at }))
                } else {
                    Ok(None)
                }
            }
            TouchPhase::Up => {
                let contact = self.contact.take().ok_or(GestureError::InvalidSequence {
                    phase: TouchPhase::Up,
                })?;
                let gesture = classify(
                    sample.position.x - contact.origin.x,
                    sample.position.y - contact.origin.y,
                    self.threshold,
                );
                Ok(Some(Intent::Release {
                    gesture,
                    at: sample.at,
                }))
            }
        }
    }
}

impl Default for GestureTracker {
    fn default() -> Self {
        Self::new(DEFAULT_SWIPE_THRESHOLD)
    }
}
