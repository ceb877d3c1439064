use std::collections::VecDeque;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;

use keycadence::focus::{AssumeFocused, FocusProbe};
use keycadence::injector::Injector;
use keycadence::model::{EngineState, FailedChar, SessionReport};
use keycadence::session::{SessionController, SessionEvent, SessionSettings};
use keycadence::sim::{snapshot, RecordingInjector};
use keycadence::TyperError;

fn quick_settings() -> SessionSettings {
    SessionSettings {
        countdown: Duration::ZERO,
        focus_recheck: Duration::from_millis(50),
        clear_clipboard: false,
        seed: Some(7),
        ..Default::default()
    }
}

/// Answers focus checks from a script, then reports focused.
struct ScriptedFocus {
    answers: VecDeque<bool>,
}

impl ScriptedFocus {
    fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
        }
    }
}

impl FocusProbe for ScriptedFocus {
    fn is_target_focused(&mut self, _patterns: &[String]) -> bool {
        self.answers.pop_front().unwrap_or(true)
    }
}

/// Blocks for `stall` on its first press, then records keys.
struct StallingInjector {
    stall: Duration,
    stalled: bool,
    keys: Arc<Mutex<Vec<String>>>,
}

impl Injector for StallingInjector {
    fn press(&mut self, key: &str) -> bool {
        if !self.stalled {
            self.stalled = true;
            thread::sleep(self.stall);
        }
        self.keys.lock().unwrap().push(key.to_string());
        true
    }

    fn press_combo(&mut self, _modifier: &str, key: &str) -> bool {
        self.press(key)
    }
}

struct ExplodingFocus;

impl FocusProbe for ExplodingFocus {
    fn is_target_focused(&mut self, _patterns: &[String]) -> bool {
        panic!("probe exploded");
    }
}

fn final_report(events: &[SessionEvent]) -> SessionReport {
    match events.last() {
        Some(SessionEvent::Finished(report)) => report.clone(),
        other => panic!("expected Finished, got {other:?}"),
    }
}

fn wait_for_observation(rx: &Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    for event in rx.iter() {
        let done = matches!(event, SessionEvent::Observation(_));
        seen.push(event);
        if done {
            break;
        }
    }
    seen
}

#[test]
fn runs_a_session_to_completion() {
    let injector = RecordingInjector::new();
    let log = injector.log();
    let mut controller = SessionController::new(injector, AssumeFocused, quick_settings());

    let rx = controller.start("hello", 10).unwrap().expect("session starts");
    let events: Vec<SessionEvent> = rx.iter().collect();

    assert!(matches!(
        events.first(),
        Some(SessionEvent::Started { total_chars: 5, .. })
    ));
    let observed = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::Observation(_)))
        .count();
    assert_eq!(observed, 5);

    let report = final_report(&events);
    assert_eq!(report.state, EngineState::Completed);
    assert_eq!(report.processed, 5);
    assert!(report.is_clean());
    assert_eq!(snapshot(&log).len(), 5);

    assert!(controller.shutdown());
    assert_eq!(controller.status().state, EngineState::Completed);
}

#[test]
fn rejects_empty_text() {
    let mut controller =
        SessionController::new(RecordingInjector::new(), AssumeFocused, quick_settings());

    assert!(matches!(controller.start("", 5), Err(TyperError::EmptyText)));
    assert!(matches!(
        controller.start(" \n\t ", 5),
        Err(TyperError::EmptyText)
    ));
    assert!(!controller.is_active());
}

#[test]
fn second_start_while_active_is_ignored() {
    let injector = RecordingInjector::new();
    let log = injector.log();
    let mut controller = SessionController::new(injector, AssumeFocused, quick_settings());

    let rx = controller.start("abcdefghij", 1).unwrap().expect("first start");
    wait_for_observation(&rx);

    assert!(controller.is_active());
    assert!(controller.start("zzz", 10).unwrap().is_none());

    controller.stop();
    let report = final_report(&rx.iter().collect::<Vec<_>>());
    assert_eq!(report.state, EngineState::Stopped);
    assert!(report.processed < 10);
    assert!(snapshot(&log).iter().all(|press| {
        !matches!(press, keycadence::sim::Press::Key(k) if k == "z")
    }));
}

#[test]
fn stop_during_countdown_sends_nothing() {
    let injector = RecordingInjector::new();
    let log = injector.log();
    let settings = SessionSettings {
        countdown: Duration::from_secs(3),
        ..quick_settings()
    };
    let mut controller = SessionController::new(injector, AssumeFocused, settings);

    let rx = controller.start("abc", 10).unwrap().expect("session starts");
    assert_eq!(
        rx.recv().unwrap(),
        SessionEvent::Countdown { remaining: 3 }
    );
    controller.stop();

    let events: Vec<SessionEvent> = rx.iter().collect();
    let report = final_report(&events);
    assert_eq!(report.state, EngineState::Stopped);
    assert_eq!(report.processed, 0);
    assert!(!events
        .iter()
        .any(|e| matches!(e, SessionEvent::Started { .. })));
    assert!(snapshot(&log).is_empty());
}

#[test]
fn pause_and_resume_through_the_controller() {
    let mut controller =
        SessionController::new(RecordingInjector::new(), AssumeFocused, quick_settings());

    let rx = controller
        .start(&"a".repeat(30), 10)
        .unwrap()
        .expect("session starts");
    wait_for_observation(&rx);

    controller.pause();
    assert_eq!(controller.status().state, EngineState::Paused);

    // Let an in-flight step finish, then confirm nothing advances.
    thread::sleep(Duration::from_millis(150));
    let held = controller.status().processed;
    thread::sleep(Duration::from_millis(250));
    assert_eq!(controller.status().processed, held);
    assert!(held < 30);

    controller.resume();
    let report = final_report(&rx.iter().collect::<Vec<_>>());
    assert_eq!(report.state, EngineState::Completed);
    assert_eq!(report.processed, 30);
}

#[test]
fn toggle_pause_flips_state() {
    let mut controller =
        SessionController::new(RecordingInjector::new(), AssumeFocused, quick_settings());
    assert!(!controller.toggle_pause(), "no session: nothing to pause");

    let rx = controller
        .start(&"b".repeat(20), 10)
        .unwrap()
        .expect("session starts");
    wait_for_observation(&rx);

    assert!(controller.toggle_pause());
    assert!(controller.signals().is_operator_paused());
    assert!(!controller.toggle_pause());

    let report = final_report(&rx.iter().collect::<Vec<_>>());
    assert_eq!(report.state, EngineState::Completed);
}

#[test]
fn focus_loss_pauses_until_focus_returns() {
    let focus = ScriptedFocus::new([false, false, true]);
    let mut controller = SessionController::new(RecordingInjector::new(), focus, quick_settings());

    let rx = controller
        .start("abcdefghijklmno", 10)
        .unwrap()
        .expect("session starts");
    let events: Vec<SessionEvent> = rx.iter().collect();

    let lost = events
        .iter()
        .position(|e| *e == SessionEvent::FocusLost { position: 9 })
        .expect("focus loss after the tenth character");
    let restored = events
        .iter()
        .position(|e| *e == SessionEvent::FocusRestored)
        .expect("focus restored");
    assert!(lost < restored);

    // Nothing is typed between the loss and the restore.
    assert!(!events[lost..restored]
        .iter()
        .any(|e| matches!(e, SessionEvent::Observation(_))));

    let report = final_report(&events);
    assert_eq!(report.state, EngineState::Completed);
    assert_eq!(report.processed, 15);
    assert!(!controller.signals().is_focus_paused());
}

#[test]
fn stop_while_focus_is_lost_ends_the_session() {
    let focus = ScriptedFocus::new(std::iter::repeat(false).take(1000));
    let mut controller = SessionController::new(RecordingInjector::new(), focus, quick_settings());

    let rx = controller
        .start("abcdefghijklmno", 10)
        .unwrap()
        .expect("session starts");
    for event in rx.iter() {
        if matches!(event, SessionEvent::FocusLost { .. }) {
            break;
        }
    }
    assert_eq!(controller.status().state, EngineState::Paused);
    assert!(controller.status().focus_lost);

    controller.stop();
    let report = final_report(&rx.iter().collect::<Vec<_>>());
    assert_eq!(report.state, EngineState::Stopped);
    assert_eq!(report.processed, 10);
}

#[test]
fn failures_are_reported_in_the_final_report() {
    let mut controller = SessionController::new(
        RecordingInjector::failing_on([1]),
        AssumeFocused,
        quick_settings(),
    );

    let rx = controller.start("abc", 10).unwrap().expect("session starts");
    let report = final_report(&rx.iter().collect::<Vec<_>>());

    assert_eq!(report.state, EngineState::Completed);
    assert_eq!(report.failed, vec![FailedChar { position: 1, ch: 'b' }]);
    assert_eq!(report.typed(), 2);
    assert!(!report.is_clean());
}

#[test]
fn unexpected_worker_panic_aborts_the_session() {
    let mut controller = SessionController::new(
        RecordingInjector::failing_on([1]),
        ExplodingFocus,
        quick_settings(),
    );

    let rx = controller
        .start("abcdefghijkl", 10)
        .unwrap()
        .expect("session starts");
    let events: Vec<SessionEvent> = rx.iter().collect();

    match events.last() {
        Some(SessionEvent::Aborted { error, report }) => {
            assert!(error.contains("probe exploded"), "{error}");
            assert_eq!(report.state, EngineState::Stopped);
            assert_eq!(report.processed, 10);
            assert_eq!(report.failed, vec![FailedChar { position: 1, ch: 'b' }]);
        }
        other => panic!("expected Aborted, got {other:?}"),
    }

    assert!(controller.shutdown());
    assert_eq!(controller.status().state, EngineState::Stopped);
}

#[test]
fn shutdown_stops_an_active_session_promptly() {
    let injector = RecordingInjector::new();
    let log = injector.log();
    let mut controller = SessionController::new(injector, AssumeFocused, quick_settings());

    let rx = controller
        .start(&"slow text ".repeat(10), 1)
        .unwrap()
        .expect("session starts");
    wait_for_observation(&rx);

    assert!(controller.shutdown(), "worker exits within the timeout");
    assert!(!controller.is_active());

    let report = final_report(&rx.iter().collect::<Vec<_>>());
    assert_eq!(report.state, EngineState::Stopped);
    assert!(snapshot(&log).len() < 100);
}

#[test]
fn a_new_session_can_start_after_the_previous_one() {
    let injector = RecordingInjector::new();
    let log = injector.log();
    let mut controller = SessionController::new(injector, AssumeFocused, quick_settings());

    let rx = controller.start("ab", 10).unwrap().expect("first session");
    controller.stop();
    rx.iter().for_each(drop);
    while controller.is_active() {
        thread::sleep(Duration::from_millis(5));
    }

    let rx = controller.start("cd", 10).unwrap().expect("second session");
    let report = final_report(&rx.iter().collect::<Vec<_>>());
    assert_eq!(report.state, EngineState::Completed);
    assert_eq!(report.processed, 2);
    assert!(snapshot(&log).len() >= 2);
}

#[test]
fn restart_waits_for_a_worker_that_outlived_shutdown() {
    let keys = Arc::new(Mutex::new(Vec::new()));
    let injector = StallingInjector {
        stall: Duration::from_millis(800),
        stalled: false,
        keys: keys.clone(),
    };
    let settings = SessionSettings {
        shutdown_timeout: Duration::from_millis(100),
        ..quick_settings()
    };
    let mut controller = SessionController::new(injector, AssumeFocused, settings);

    let first = controller
        .start("aaaaaaaaaa", 10)
        .unwrap()
        .expect("first session");
    match first.recv().unwrap() {
        SessionEvent::Started { .. } => {}
        other => panic!("expected Started, got {other:?}"),
    }
    let old_signals = controller.signals();
    // Let the worker reach its first press.
    thread::sleep(Duration::from_millis(200));

    assert!(!controller.shutdown(), "worker is still stuck in its first press");
    assert!(controller.is_active());
    assert!(controller.start("zz", 10).unwrap().is_none());
    assert!(old_signals.is_stop_requested());

    let deadline = Instant::now() + Duration::from_secs(5);
    while controller.is_active() {
        assert!(Instant::now() < deadline, "stalled worker never exited");
        thread::sleep(Duration::from_millis(10));
    }
    let report = final_report(&first.iter().collect::<Vec<_>>());
    assert_eq!(report.state, EngineState::Stopped);
    assert_eq!(report.processed, 1);

    let second = controller.start("zz", 10).unwrap().expect("second session");
    assert!(!controller.signals().is_stop_requested());
    assert!(old_signals.is_stop_requested());
    let report = final_report(&second.iter().collect::<Vec<_>>());
    assert_eq!(report.state, EngineState::Completed);

    assert_eq!(*keys.lock().unwrap(), vec!["a", "z", "z"]);
}
