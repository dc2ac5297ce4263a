mod clock;
mod engine;

pub use clock::{format_time, TimingClock};
pub use engine::{DisplayColor, Reaction, Request, Stopwatch, TimerSnapshot, TimerState};
