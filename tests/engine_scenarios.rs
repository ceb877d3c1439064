use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;

use keycadence::control::ControlSignals;
use keycadence::engine::KeystrokeEngine;
use keycadence::model::{EngineState, FailedChar, Observation};
use keycadence::sim::{simulate_typed_text, Press, RecordingInjector};

fn collect(
    text: &str,
    speed: u32,
    signals: &ControlSignals,
    injector: &mut RecordingInjector,
) -> (Vec<Observation>, EngineState, Vec<FailedChar>) {
    let mut run = KeystrokeEngine::with_seed(42).type_text(text, speed, signals, injector);
    let observations = run
        .by_ref()
        .map(|item| item.expect("no fatal error"))
        .collect();
    let state = run.state();
    let failed = run.failed().to_vec();
    (observations, state, failed)
}

#[test]
fn types_short_text_to_completion() {
    let signals = ControlSignals::new();
    let mut injector = RecordingInjector::new();

    let started = Instant::now();
    let (observations, state, failed) = collect("Hi!", 5, &signals, &mut injector);
    let elapsed = started.elapsed();

    assert_eq!(state, EngineState::Completed);
    assert!(failed.is_empty());
    assert_eq!(observations.len(), 3);
    assert_eq!(
        observations.iter().map(|o| o.ch).collect::<String>(),
        "Hi!"
    );
    assert_eq!(observations.last().map(|o| o.progress), Some(1.0));
    assert!(observations.windows(2).all(|w| w[0].progress < w[1].progress));

    // Lower bound of H + i + ! at speed 5 with the minimum variance.
    assert!(elapsed >= Duration::from_millis(250), "{elapsed:?}");

    assert_eq!(
        injector.presses(),
        vec![
            Press::Key("H".to_string()),
            Press::Key("i".to_string()),
            Press::Combo {
                modifier: "shift".to_string(),
                key: "1".to_string()
            },
        ]
    );
}

#[test]
fn stop_after_second_character_halts_run() {
    let signals = ControlSignals::new();
    let mut injector = RecordingInjector::new();

    let mut run = KeystrokeEngine::with_seed(1).type_text("hello", 10, &signals, &mut injector);
    assert!(run.next().is_some());
    assert!(run.next().is_some());
    signals.request_stop();

    assert!(run.next().is_none());
    assert!(run.next().is_none());
    assert_eq!(run.state(), EngineState::Stopped);

    let report = run.into_report();
    assert_eq!(report.state, EngineState::Stopped);
    assert_eq!(report.processed, 2);
    assert_eq!(report.total_chars, 5);
    assert_eq!(injector.presses().len(), 2);
}

#[test]
fn stop_after_last_character_still_completes() {
    let signals = ControlSignals::new();
    let mut injector = RecordingInjector::new();

    let mut run = KeystrokeEngine::new().type_text("ab", 10, &signals, &mut injector);
    assert!(run.next().is_some());
    assert!(run.next().is_some());
    signals.request_stop();

    assert!(run.next().is_none());
    assert_eq!(run.state(), EngineState::Completed);
}

#[test]
fn pause_holds_the_next_character() {
    let signals = Arc::new(ControlSignals::new());
    let mut injector = RecordingInjector::new();
    let hold = Duration::from_millis(300);

    let mut run = KeystrokeEngine::with_seed(3).type_text("abc", 10, &signals, &mut injector);
    assert!(run.next().is_some());

    signals.set_paused(true);
    let resumer = {
        let signals = signals.clone();
        thread::spawn(move || {
            thread::sleep(hold);
            signals.set_paused(false);
        })
    };

    let started = Instant::now();
    let second = run.next().expect("resumes").expect("no fatal error");
    assert!(started.elapsed() >= hold - Duration::from_millis(10));
    assert_eq!(second.ch, 'b');
    resumer.join().unwrap();

    assert!(run.next().is_some());
    assert!(run.next().is_none());
    assert_eq!(run.state(), EngineState::Completed);
}

#[test]
fn stop_while_paused_ends_promptly() {
    let signals = Arc::new(ControlSignals::new());
    let mut injector = RecordingInjector::new();

    let mut run = KeystrokeEngine::new().type_text("abc", 10, &signals, &mut injector);
    assert!(run.next().is_some());

    signals.set_paused(true);
    let stopper = {
        let signals = signals.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            signals.request_stop();
        })
    };

    let started = Instant::now();
    assert!(run.next().is_none());
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(run.state(), EngineState::Stopped);
    stopper.join().unwrap();

    drop(run);
    assert_eq!(injector.presses().len(), 1);
}

#[test]
fn failed_injection_is_recorded_and_typing_continues() {
    let signals = ControlSignals::new();
    let mut injector = RecordingInjector::failing_on([2]);

    let (observations, state, failed) = collect("abcd", 10, &signals, &mut injector);

    assert_eq!(state, EngineState::Completed);
    assert_eq!(failed, vec![FailedChar { position: 2, ch: 'c' }]);
    assert_eq!(
        observations.iter().map(|o| o.success).collect::<Vec<_>>(),
        vec![true, true, false, true]
    );
    // Progress counts failed characters too.
    assert_eq!(observations[2].progress, 0.75);
    assert_eq!(injector.presses().len(), 4);
}

#[test]
fn positions_are_character_indices() {
    let signals = ControlSignals::new();
    let mut injector = RecordingInjector::new();

    let (observations, _, failed) = collect("é a", 10, &signals, &mut injector);

    assert_eq!(
        observations.iter().map(|o| o.position).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(failed, vec![FailedChar { position: 0, ch: 'é' }]);
}

#[test]
fn typed_keys_reproduce_the_text() {
    let text = "Hi! (a+b) {x} <y> \"q\" ~ok?\nend\t: 100% done_";
    let signals = ControlSignals::new();
    let mut injector = RecordingInjector::new();

    let (_, state, failed) = collect(text, 10, &signals, &mut injector);

    assert_eq!(state, EngineState::Completed);
    assert!(failed.is_empty());
    assert_eq!(simulate_typed_text(&injector.presses()).unwrap(), text);
}

#[test]
fn pause_before_start_delays_the_first_character() {
    let signals = Arc::new(ControlSignals::new());
    let mut injector = RecordingInjector::new();
    signals.set_paused(true);

    let resumer = {
        let signals = signals.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            signals.set_paused(false);
        })
    };

    let started = Instant::now();
    let (observations, state, _) = collect("xyz", 10, &signals, &mut injector);
    let elapsed = started.elapsed();
    resumer.join().unwrap();

    assert!(elapsed >= Duration::from_millis(290), "{elapsed:?}");
    assert_eq!(state, EngineState::Completed);
    assert_eq!(
        observations.iter().map(|o| o.ch).collect::<String>(),
        "xyz"
    );
}
