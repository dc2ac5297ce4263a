//! Integration tests for the stopwatch engine.
//!
//! These tests drive a complete timing cycle through the public API the way
//! a host would: touch samples in, requests executed by hand, results fed
//! back. Persistence runs inline, the way a host without a worker pool does.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cubetimer_core::{
    Event, MemorySolveSink, NoHaptics, Penalty, Point, Puzzle, Reaction, ScrambleError,
    ScrambleSource, SinkError, SolveRecord, SolveSink, Stopwatch, StopwatchConfig, TimerState,
    TouchSample,
};

fn at(t0: Instant, ms: u64) -> Instant {
    t0 + Duration::from_millis(ms)
}

fn p(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn fixed(_: &Puzzle) -> Result<String, ScrambleError> {
    Ok("R U R' U'".to_string())
}

#[test]
fn test_hold_release_press_records_solve_with_start_scramble() {
    let sink = MemorySolveSink::new();
    let (mut sw, _) = Stopwatch::new(
        StopwatchConfig::default(),
        &fixed,
        Arc::new(sink.clone()),
        Arc::new(NoHaptics),
    )
    .unwrap();
    let t0 = Instant::now();

    let press = sw.touch(TouchSample::down(p(100.0, 100.0), t0));
    let token = press.hold_token().unwrap();
    sw.hold_elapsed(token, at(t0, 500));
    sw.touch(TouchSample::up(p(100.0, 100.0), at(t0, 600)));
    assert_eq!(sw.state(), TimerState::Running);

    let mut stop = sw.touch(TouchSample::down(p(100.0, 100.0), at(t0, 600 + 12_340)));
    assert_eq!(sw.state(), TimerState::Idle);
    assert!(sink.is_empty());
    sw.persist_inline(&mut stop);

    let solves = sink.solves();
    assert_eq!(solves.len(), 1);
    assert!((solves[0].elapsed_secs - 12.34).abs() < 1e-9);
    assert_eq!(solves[0].scramble, "R U R' U'");
    assert_eq!(stop.solve(), Some(&solves[0]));
}

#[test]
fn test_swipe_displacement_is_classified_not_tapped() {
    let sink = MemorySolveSink::new();
    let (mut sw, _) = Stopwatch::new(
        StopwatchConfig::default(),
        &fixed,
        Arc::new(sink.clone()),
        Arc::new(NoHaptics),
    )
    .unwrap();
    let t0 = Instant::now();

    sw.touch(TouchSample::down(p(0.0, 0.0), t0));
    sw.hold_elapsed(1, at(t0, 600));
    assert_eq!(sw.state(), TimerState::Armed);

    // Net (40, 5) with threshold 20: a swipe, so the clock never starts.
    let r = sw.touch(TouchSample::up(p(40.0, 5.0), at(t0, 700)));
    assert_eq!(sw.state(), TimerState::Idle);
    assert!(!r.events.iter().any(|e| matches!(e, Event::TimerStarted { .. })));
    assert!(sink.is_empty());
}

#[test]
fn test_late_staged_response_after_reload_is_ignored() {
    let counter = AtomicUsize::new(0);
    let source = move |_: &Puzzle| -> Result<String, ScrambleError> {
        Ok(format!("S{}", counter.fetch_add(1, Ordering::SeqCst)))
    };
    let (mut sw, initial) = Stopwatch::new(
        StopwatchConfig::default(),
        &source,
        Arc::new(MemorySolveSink::new()),
        Arc::new(NoHaptics),
    )
    .unwrap();
    let staged = initial.scramble_ticket().unwrap();
    let reload = sw.reload_scramble().scramble_ticket().unwrap();

    // The reload answers first; the slow staged prefetch arrives afterwards.
    let applied = sw.scramble_fetched(reload.seq, source.generate(&reload.puzzle));
    let follow_up = applied.scramble_ticket().unwrap();
    let current = sw.current_scramble().to_string();

    let late = sw.scramble_fetched(staged.seq, Ok("LATE".into()));
    assert!(late.is_empty());
    assert_eq!(sw.current_scramble(), current);
    assert_ne!(sw.staged_scramble(), Some("LATE"));

    sw.scramble_fetched(follow_up.seq, Ok("NEXT".into()));
    assert_eq!(sw.staged_scramble(), Some("NEXT"));
}

#[test]
fn test_failing_sink_reports_and_returns_to_idle() {
    struct Rejecting;
    impl SolveSink for Rejecting {
        fn record(&self, record: SolveRecord) -> Result<(), SinkError> {
            Err(SinkError::PersistenceFailure {
                solve_id: record.id,
                reason: "read-only store".into(),
            })
        }
    }

    let (mut sw, _) = Stopwatch::new(
        StopwatchConfig::default(),
        &fixed,
        Arc::new(Rejecting),
        Arc::new(NoHaptics),
    )
    .unwrap();
    let t0 = Instant::now();
    sw.touch(TouchSample::down(p(0.0, 0.0), t0));
    sw.hold_elapsed(1, at(t0, 500));
    sw.touch(TouchSample::up(p(0.0, 0.0), at(t0, 500)));
    let mut stop = sw.touch(TouchSample::down(p(0.0, 0.0), at(t0, 3_500)));
    sw.persist_inline(&mut stop);

    let completed = stop.solve().unwrap().id;
    assert!(stop.events.iter().any(|e| matches!(
        e,
        Event::PersistenceFailed { solve_id, .. } if *solve_id == completed
    )));
    assert_eq!(sw.state(), TimerState::Idle);

    // The next cycle works normally.
    let r = sw.touch(TouchSample::up(p(0.0, 0.0), at(t0, 3_600)));
    assert_eq!(r, Reaction::default());
    let next = sw.touch(TouchSample::down(p(0.0, 0.0), at(t0, 5_000)));
    assert!(next.hold_token().is_some());
}

#[test]
fn test_inspection_overrun_marks_dnf() {
    let sink = MemorySolveSink::new();
    let (mut sw, _) = Stopwatch::new(
        StopwatchConfig {
            inspection: true,
            ..StopwatchConfig::default()
        },
        &fixed,
        Arc::new(sink.clone()),
        Arc::new(NoHaptics),
    )
    .unwrap();
    let t0 = Instant::now();

    sw.touch(TouchSample::down(p(0.0, 0.0), t0));
    sw.touch(TouchSample::up(p(0.0, 0.0), at(t0, 50)));
    assert_eq!(sw.state(), TimerState::Inspecting);

    let token = sw
        .touch(TouchSample::down(p(0.0, 0.0), at(t0, 17_000)))
        .hold_token()
        .unwrap();
    sw.hold_elapsed(token, at(t0, 17_500));
    sw.touch(TouchSample::up(p(0.0, 0.0), at(t0, 17_600)));
    let mut stop = sw.touch(TouchSample::down(p(0.0, 0.0), at(t0, 27_600)));
    sw.persist_inline(&mut stop);

    let solves = sink.solves();
    assert_eq!(solves[0].penalty, Penalty::Dnf);
    assert!((solves[0].elapsed_secs - 10.0).abs() < 1e-9);
}

#[test]
fn test_multi_phase_splits_are_non_decreasing() {
    let sink = MemorySolveSink::new();
    let (mut sw, _) = Stopwatch::new(
        StopwatchConfig {
            phases: 4,
            ..StopwatchConfig::default()
        },
        &fixed,
        Arc::new(sink.clone()),
        Arc::new(NoHaptics),
    )
    .unwrap();
    let t0 = Instant::now();
    sw.touch(TouchSample::down(p(0.0, 0.0), t0));
    sw.hold_elapsed(1, at(t0, 500));
    sw.touch(TouchSample::up(p(0.0, 0.0), at(t0, 500)));

    for (i, ms) in [2_000u64, 2_020, 9_000, 15_000].into_iter().enumerate() {
        let mut press = sw.touch(TouchSample::down(p(0.0, 0.0), at(t0, ms)));
        sw.persist_inline(&mut press);
        sw.touch(TouchSample::up(p(0.0, 0.0), at(t0, ms + 10)));
        if i < 3 {
            assert_eq!(sw.state(), TimerState::Running);
        }
    }

    let record = &sink.solves()[0];
    assert_eq!(record.splits.len(), 3);
    assert!(record.splits.windows(2).all(|w| w[0] <= w[1]));
    assert!(record.splits.iter().all(|s| *s <= record.elapsed_secs));
    assert!((record.elapsed_secs - 14.5).abs() < 1e-9);
}
