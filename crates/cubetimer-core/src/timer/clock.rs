//! Wall-clock elapsed time.
//!
//! Elapsed time is always `sample - start`, recomputed from scratch on
//! every tick. Tick deltas are never summed, so jitter in tick delivery
//! cannot accumulate into drift.

use std::time::Instant;

use crate::config::Precision;

#[derive(Debug, Clone, Default)]
pub struct TimingClock {
    started_at: Option<Instant>,
    last_sample: Option<Instant>,
    elapsed_secs: f64,
}

impl TimingClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    /// Zero the clock at `at` and start it.
    pub fn start(&mut self, at: Instant) {
        self.started_at = Some(at);
        self.last_sample = Some(at);
        self.elapsed_secs = 0.0;
    }

    /// Recompute elapsed time. Samples older than the last one are clamped
    /// so the value never decreases. No-op while stopped.
    pub fn sample(&mut self, now: Instant) -> f64 {
        if let Some(start) = self.started_at {
            let now = match self.last_sample {
                Some(last) if last > now => last,
                _ => now,
            };
            self.last_sample = Some(now);
            self.elapsed_secs = now.saturating_duration_since(start).as_secs_f64();
        }
        self.elapsed_secs
    }

    /// Take a final sample and stop. The elapsed value is kept for display.
    pub fn stop(&mut self, at: Instant) -> f64 {
        let elapsed = self.sample(at);
        self.started_at = None;
        self.last_sample = None;
        elapsed
    }
}

/// Format a time for display. Digits are truncated, not rounded, so a
/// displayed time never exceeds the measured one.
///
/// Returns `None` when the precision hides the time.
pub fn format_time(secs: f64, precision: Precision) -> Option<String> {
    let decimals = match precision {
        Precision::Hidden => return None,
        Precision::Decimals(d) => u32::from(d.min(3)),
    };

    let ms = (secs.max(0.0) * 1000.0 + 1e-6).floor() as u64;
    let mins = ms / 60_000;
    let whole = (ms % 60_000) / 1000;
    let frac = (ms % 1000) / 10u64.pow(3 - decimals);

    let frac_str = if decimals == 0 {
        String::new()
    } else {
        format!(".{:0width$}", frac, width = decimals as usize)
    };

    Some(if mins > 0 {
        format!("{mins}:{whole:02}{frac_str}")
    } else {
        format!("{whole}{frac_str}")
    })
}
