//! Tests d'intégration du contrôleur de lecture sur un backend simulé

use std::time::Duration;

use crossbeam_channel::Receiver;
use pmoplayback::{
    CommandOutcome, FailureKind, FormatList, ManualClock, MediaEventKind, Notice,
    PlaybackController, PlaybackEvent, PlaybackStatus, PlayerSettings, SimulatedBackend,
    SimulatedCall, SimulatedLoad, SourceCursor, SourceList,
};

type Controller = PlaybackController<SimulatedBackend, ManualClock>;

fn setup(settings: PlayerSettings) -> (Controller, SimulatedBackend, ManualClock) {
    let backend = SimulatedBackend::new();
    let clock = ManualClock::new();
    let controller = PlaybackController::with_clock(backend.clone(), settings, clock.clone())
        .expect("valid settings");
    (controller, backend, clock)
}

fn sources(uris: &[&str]) -> SourceList {
    SourceList::new(uris.iter().copied()).unwrap()
}

fn drain(rx: &Receiver<PlaybackEvent>) -> Vec<PlaybackEvent> {
    rx.try_iter().collect()
}

fn retry_delays(events: &[PlaybackEvent]) -> Vec<Duration> {
    events
        .iter()
        .filter_map(|e| match e {
            PlaybackEvent::RetryScheduled { delay, .. } => Some(*delay),
            _ => None,
        })
        .collect()
}

/// Advances the clock to the pending deadline and fires the retry.
fn fire_retry(controller: &mut Controller, clock: &ManualClock) -> bool {
    if controller.next_deadline().is_none() {
        return false;
    }
    clock.advance(Duration::from_secs(6));
    let fired = controller.poll_timers();
    controller.process_pending_events();
    fired
}

#[test]
fn test_start_autoplays_primary_source() {
    let (mut ctrl, backend, _clock) = setup(PlayerSettings::default());
    let events = ctrl.subscribe();

    ctrl.start(sources(&["/music/a.mp3", "/music/b.mp3"]));
    assert_eq!(ctrl.status(), PlaybackStatus::Loading);

    ctrl.process_pending_events();
    assert_eq!(ctrl.status(), PlaybackStatus::Playing);
    assert_eq!(backend.opened(), vec!["/music/a.mp3".to_string()]);

    let events = drain(&events);
    assert!(events.contains(&PlaybackEvent::StatusChanged {
        status: PlaybackStatus::Loading
    }));
    assert!(events.contains(&PlaybackEvent::StatusChanged {
        status: PlaybackStatus::Playing
    }));

    let snapshot = ctrl.snapshot().unwrap();
    assert_eq!(snapshot.uri.as_deref(), Some("/music/a.mp3"));
    assert_eq!(snapshot.duration, Some(180.0));
    assert_eq!(snapshot.retry_count, 0);
}

#[test]
fn test_without_autoplay_ready_handle_waits_in_idle() {
    let settings = PlayerSettings {
        autoplay: false,
        ..PlayerSettings::default()
    };
    let (mut ctrl, backend, _clock) = setup(settings);

    ctrl.start(sources(&["a.mp3"]));
    ctrl.process_pending_events();
    assert_eq!(ctrl.status(), PlaybackStatus::Idle);
    assert!(!backend.calls().iter().any(|c| matches!(c, SimulatedCall::Play(_))));

    assert_eq!(ctrl.toggle_play_pause(), CommandOutcome::Applied);
    assert_eq!(ctrl.status(), PlaybackStatus::Playing);
}

#[test]
fn test_decode_error_moves_to_next_source_keeping_format() {
    let (mut ctrl, backend, clock) = setup(PlayerSettings::default());
    backend.script("A.mp3", SimulatedLoad::fail(FailureKind::DecodeError));

    ctrl.start(sources(&["A.mp3", "B.ogg"]));
    ctrl.process_pending_events();
    assert_eq!(ctrl.status(), PlaybackStatus::Stalled);
    assert_eq!(ctrl.live_handle(), None);

    clock.advance(Duration::from_secs(2));
    assert!(ctrl.poll_timers());
    assert_eq!(ctrl.status(), PlaybackStatus::Loading);

    let session = ctrl.session().unwrap();
    assert_eq!(session.cursor(), SourceCursor::new(1, 0));
    assert_eq!(backend.opened(), vec!["A.mp3".to_string(), "B.ogg".to_string()]);

    ctrl.process_pending_events();
    assert_eq!(ctrl.status(), PlaybackStatus::Playing);
}

#[test]
fn test_decode_error_on_last_source_fails() {
    let (mut ctrl, backend, _clock) = setup(PlayerSettings::default());
    backend.script("A.mp3", SimulatedLoad::fail(FailureKind::DecodeError));

    ctrl.start(sources(&["A.mp3"]));
    ctrl.process_pending_events();

    assert_eq!(ctrl.status(), PlaybackStatus::Failed);
    assert!(!ctrl.retry_pending());
    assert_eq!(
        ctrl.session().unwrap().last_error().unwrap().kind,
        FailureKind::DecodeError
    );
    let snapshot = ctrl.snapshot().unwrap();
    assert_eq!(snapshot.retry_count, snapshot.max_retries);
}

#[test]
fn test_format_unsupported_walks_formats_then_sources() {
    let (mut ctrl, backend, clock) = setup(PlayerSettings::default());
    for uri in ["A.mp3", "A.ogg", "A.wav"] {
        backend.script(uri, SimulatedLoad::fail(FailureKind::FormatUnsupported));
    }

    ctrl.start(sources(&["A.mp3", "B.mp3"]));
    ctrl.process_pending_events();

    let mut cursors = vec![ctrl.session().unwrap().cursor()];
    for _ in 0..3 {
        assert_eq!(ctrl.status(), PlaybackStatus::Stalled);
        assert!(fire_retry(&mut ctrl, &clock));
        cursors.push(ctrl.session().unwrap().cursor());
    }

    assert_eq!(
        cursors,
        vec![
            SourceCursor::new(0, 0),
            SourceCursor::new(0, 1),
            SourceCursor::new(0, 2),
            SourceCursor::new(1, 0),
        ]
    );
    assert_eq!(backend.opened(), vec!["A.mp3", "A.ogg", "A.wav", "B.mp3"]);
    assert_eq!(ctrl.status(), PlaybackStatus::Playing);
    assert_eq!(ctrl.session().unwrap().retry_count(), 0);
}

#[test]
fn test_format_unsupported_with_nothing_left_fails() {
    let settings = PlayerSettings {
        formats: FormatList::new(["mp3"]).unwrap(),
        ..PlayerSettings::default()
    };
    let (mut ctrl, backend, _clock) = setup(settings);
    backend.script("A.mp3", SimulatedLoad::fail(FailureKind::FormatUnsupported));

    ctrl.start(sources(&["A.mp3"]));
    ctrl.process_pending_events();
    assert_eq!(ctrl.status(), PlaybackStatus::Failed);
    assert_eq!(ctrl.session().unwrap().retry_count(), 3);
}

#[test]
fn test_format_unsupported_skips_listed_extension() {
    let (mut ctrl, backend, clock) = setup(PlayerSettings::default());
    backend.script_repeat("B.ogg", SimulatedLoad::fail(FailureKind::FormatUnsupported), 2);

    ctrl.start(sources(&["B.ogg"]));
    ctrl.process_pending_events();
    assert_eq!(ctrl.session().unwrap().retry_count(), 0);

    assert!(fire_retry(&mut ctrl, &clock));
    assert_eq!(backend.opened(), vec!["B.ogg", "B.wav"]);
    assert_eq!(ctrl.status(), PlaybackStatus::Playing);
}

#[test]
fn test_network_failures_exhaust_budget_with_increasing_delays() {
    let (mut ctrl, backend, clock) = setup(PlayerSettings::default());
    backend.script_repeat("a.mp3", SimulatedLoad::fail(FailureKind::Network), 4);
    let events = ctrl.subscribe();

    ctrl.start(sources(&["a.mp3"]));
    ctrl.process_pending_events();

    for (attempt, secs) in [(1, 2), (2, 4), (3, 6)] {
        assert_eq!(ctrl.status(), PlaybackStatus::Stalled);

        clock.advance(Duration::from_secs(secs) - Duration::from_millis(1));
        assert!(!ctrl.poll_timers(), "retry fired before its delay");

        clock.advance(Duration::from_millis(1));
        assert!(ctrl.poll_timers());
        assert_eq!(ctrl.session().unwrap().retry_count(), attempt);
        assert!(ctrl.session().unwrap().retry_count() <= ctrl.settings().max_retries);
        ctrl.process_pending_events();
    }

    assert_eq!(ctrl.status(), PlaybackStatus::Failed);
    assert!(!ctrl.retry_pending());
    assert_eq!(backend.opened().len(), 4);

    let events = drain(&events);
    assert_eq!(
        retry_delays(&events),
        vec![
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(6)
        ]
    );
    assert!(events.contains(&PlaybackEvent::Notice(Notice::RetriesExhausted)));

    clock.advance(Duration::from_secs(60));
    assert!(!ctrl.poll_timers());
    assert_eq!(ctrl.status(), PlaybackStatus::Failed);

    assert_eq!(ctrl.manual_retry(), CommandOutcome::Applied);
    assert_eq!(ctrl.status(), PlaybackStatus::Loading);
    let session = ctrl.session().unwrap();
    assert_eq!(session.retry_count(), 0);
    assert_eq!(session.cursor(), SourceCursor::default());
    assert!(session.last_error().is_none());

    ctrl.process_pending_events();
    assert_eq!(ctrl.status(), PlaybackStatus::Playing);
}

/// Runs a session whose loads fail as scripted until it gives up.
/// Returns the number of retries fired and the URIs opened.
fn run_until_failed(uris: &[&str], script: &[(&str, FailureKind)]) -> (usize, Vec<String>) {
    let (mut ctrl, backend, clock) = setup(PlayerSettings::default());
    for (uri, kind) in script {
        backend.script(uri, SimulatedLoad::fail(*kind));
    }

    ctrl.start(sources(uris));
    ctrl.process_pending_events();

    let max = ctrl.settings().max_retries;
    for fired in 0..10 {
        let count = ctrl.session().unwrap().retry_count();
        assert!(count <= max);
        if ctrl.status() == PlaybackStatus::Failed {
            assert_eq!(count, max, "failed before the budget was used up");
            return (fired, backend.opened());
        }
        assert_eq!(ctrl.status(), PlaybackStatus::Stalled);
        assert_eq!(count as usize, fired);
        assert!(fire_retry(&mut ctrl, &clock));
    }
    panic!("session never failed, opened {:?}", backend.opened());
}

#[test]
fn test_retry_count_never_exceeds_budget_for_mixed_failures() {
    use FailureKind::*;

    let (fired, opened) = run_until_failed(
        &["a.mp3"],
        &[
            ("a.mp3", Aborted),
            ("a.mp3", Unknown),
            ("a.mp3", Network),
            ("a.mp3", Aborted),
        ],
    );
    assert_eq!(fired, 3);
    assert_eq!(opened.len(), 4);

    let (fired, opened) = run_until_failed(&["a.mp3"], &[("a.mp3", DecodeError)]);
    assert_eq!(fired, 0);
    assert_eq!(opened, vec!["a.mp3"]);

    let (fired, opened) = run_until_failed(
        &["a.mp3"],
        &[
            ("a.mp3", FormatUnsupported),
            ("a.ogg", FormatUnsupported),
            ("a.wav", FormatUnsupported),
        ],
    );
    assert_eq!(fired, 2);
    assert_eq!(opened, vec!["a.mp3", "a.ogg", "a.wav"]);

    let (fired, opened) = run_until_failed(
        &["a.mp3", "b.mp3"],
        &[
            ("a.mp3", Network),
            ("a.mp3", DecodeError),
            ("b.mp3", FormatUnsupported),
            ("b.ogg", FormatUnsupported),
        ],
    );
    assert_eq!(fired, 3);
    assert_eq!(opened, vec!["a.mp3", "a.mp3", "b.mp3", "b.ogg"]);
}

#[test]
fn test_ready_resets_retry_count() {
    let (mut ctrl, backend, clock) = setup(PlayerSettings::default());
    backend.script_repeat("a.mp3", SimulatedLoad::fail(FailureKind::Network), 2);

    ctrl.start(sources(&["a.mp3"]));
    ctrl.process_pending_events();
    fire_retry(&mut ctrl, &clock);
    assert_eq!(ctrl.session().unwrap().retry_count(), 1);

    fire_retry(&mut ctrl, &clock);
    assert_eq!(ctrl.status(), PlaybackStatus::Playing);
    assert_eq!(ctrl.session().unwrap().retry_count(), 0);

    backend.emit_latest(MediaEventKind::Stalled);
    ctrl.process_pending_events();
    assert_eq!(ctrl.status(), PlaybackStatus::Stalled);
    assert!(ctrl.retry_pending());
}

#[test]
fn test_going_offline_fails_and_cancels_pending_retry() {
    let (mut ctrl, backend, clock) = setup(PlayerSettings::default());
    backend.script("a.mp3", SimulatedLoad::fail(FailureKind::Network));
    let events = ctrl.subscribe();

    ctrl.start(sources(&["a.mp3"]));
    ctrl.process_pending_events();
    assert!(ctrl.retry_pending());

    ctrl.set_online(false);
    assert_eq!(ctrl.status(), PlaybackStatus::Failed);
    assert!(!ctrl.retry_pending());
    let error = ctrl.session().unwrap().last_error().unwrap().clone();
    assert_eq!(error.kind, FailureKind::Network);
    assert_eq!(error.detail, "No Network Connection");

    clock.advance(Duration::from_secs(30));
    assert!(!ctrl.poll_timers());
    assert_eq!(backend.opened().len(), 1);
    assert!(drain(&events).contains(&PlaybackEvent::Notice(Notice::Offline)));
}

#[test]
fn test_going_offline_while_playing_releases_handle() {
    let (mut ctrl, backend, _clock) = setup(PlayerSettings::default());
    ctrl.start(sources(&["a.mp3"]));
    ctrl.process_pending_events();
    assert_eq!(backend.live_handles(), 1);

    ctrl.set_online(false);
    assert_eq!(ctrl.status(), PlaybackStatus::Failed);
    assert_eq!(backend.live_handles(), 0);
    assert!(!ctrl.session().unwrap().is_online());
}

#[test]
fn test_back_online_only_unblocks_manual_retry() {
    let (mut ctrl, backend, _clock) = setup(PlayerSettings::default());
    let events = ctrl.subscribe();
    ctrl.start(sources(&["a.mp3"]));
    ctrl.process_pending_events();

    ctrl.set_online(false);
    assert_eq!(ctrl.manual_retry(), CommandOutcome::Offline);
    assert_eq!(ctrl.toggle_play_pause(), CommandOutcome::Offline);

    ctrl.set_online(true);
    assert_eq!(ctrl.status(), PlaybackStatus::Failed);
    assert_eq!(backend.opened().len(), 1);
    assert!(drain(&events).contains(&PlaybackEvent::Notice(Notice::Online)));

    assert_eq!(ctrl.manual_retry(), CommandOutcome::Applied);
    ctrl.process_pending_events();
    assert_eq!(ctrl.status(), PlaybackStatus::Playing);
}

#[test]
fn test_start_while_offline_fails_immediately() {
    let (mut ctrl, backend, _clock) = setup(PlayerSettings::default());
    ctrl.set_online(false);
    ctrl.start(sources(&["a.mp3"]));

    assert_eq!(ctrl.status(), PlaybackStatus::Failed);
    assert!(backend.opened().is_empty());
}

#[test]
fn test_volume_clamps_and_is_idempotent() {
    let (mut ctrl, backend, _clock) = setup(PlayerSettings::default());
    let events = ctrl.subscribe();
    ctrl.start(sources(&["a.mp3"]));
    ctrl.process_pending_events();
    drain(&events);

    assert!(ctrl.set_volume(-0.3).is_applied());
    assert_eq!(ctrl.volume(), 0.0);
    assert_eq!(ctrl.set_volume(1.7), CommandOutcome::Applied);
    assert_eq!(ctrl.volume(), 1.0);
    assert_eq!(ctrl.set_volume(1.0), CommandOutcome::Applied);
    assert_eq!(ctrl.session().unwrap().volume(), 1.0);

    let changes: Vec<_> = drain(&events)
        .into_iter()
        .filter(|e| matches!(e, PlaybackEvent::VolumeChanged { .. }))
        .collect();
    assert_eq!(
        changes,
        vec![
            PlaybackEvent::VolumeChanged { volume: 0.0 },
            PlaybackEvent::VolumeChanged { volume: 1.0 },
        ]
    );

    let handle = ctrl.live_handle().unwrap();
    assert!(backend.calls().contains(&SimulatedCall::Volume(handle, 1.0)));
}

#[test]
fn test_volume_survives_retries() {
    let (mut ctrl, backend, clock) = setup(PlayerSettings::default());
    backend.script("a.mp3", SimulatedLoad::fail(FailureKind::Network));

    ctrl.start(sources(&["a.mp3"]));
    ctrl.set_volume(0.3);
    ctrl.process_pending_events();
    fire_retry(&mut ctrl, &clock);

    let handle = ctrl.live_handle().unwrap();
    assert!(backend.calls().contains(&SimulatedCall::Volume(handle, 0.3)));
}

#[test]
fn test_toggle_while_loading_is_a_no_op() {
    let (mut ctrl, backend, _clock) = setup(PlayerSettings::default());
    backend.script("a.mp3", SimulatedLoad::Silent);
    let events = ctrl.subscribe();

    ctrl.start(sources(&["a.mp3"]));
    assert_eq!(ctrl.status(), PlaybackStatus::Loading);

    assert_eq!(ctrl.toggle_play_pause(), CommandOutcome::NotReady);
    assert_eq!(ctrl.status(), PlaybackStatus::Loading);
    assert!(drain(&events).contains(&PlaybackEvent::Notice(Notice::NotReady)));
    assert!(!backend.calls().iter().any(|c| matches!(c, SimulatedCall::Play(_))));
}

#[test]
fn test_toggle_pauses_and_resumes() {
    let (mut ctrl, backend, _clock) = setup(PlayerSettings::default());
    ctrl.start(sources(&["a.mp3"]));
    ctrl.process_pending_events();
    let handle = ctrl.live_handle().unwrap();

    assert_eq!(ctrl.toggle_play_pause(), CommandOutcome::Applied);
    assert_eq!(ctrl.status(), PlaybackStatus::Paused);
    assert_eq!(ctrl.toggle_play_pause(), CommandOutcome::Applied);
    assert_eq!(ctrl.status(), PlaybackStatus::Playing);

    let calls: Vec<_> = backend
        .calls()
        .into_iter()
        .filter(|c| matches!(c, SimulatedCall::Play(_) | SimulatedCall::Pause(_)))
        .collect();
    assert_eq!(
        calls,
        vec![
            SimulatedCall::Play(handle),
            SimulatedCall::Pause(handle),
            SimulatedCall::Play(handle),
        ]
    );
}

#[test]
fn test_toggle_while_stalled_or_failed_is_refused() {
    let (mut ctrl, backend, _clock) = setup(PlayerSettings::default());
    backend.script("a.mp3", SimulatedLoad::fail(FailureKind::Network));
    ctrl.start(sources(&["a.mp3"]));
    ctrl.process_pending_events();

    assert_eq!(ctrl.status(), PlaybackStatus::Stalled);
    assert_eq!(ctrl.toggle_play_pause(), CommandOutcome::NotReady);
    assert_eq!(ctrl.status(), PlaybackStatus::Stalled);
}

#[test]
fn test_paused_session_stalls_on_runtime_error() {
    let (mut ctrl, backend, _clock) = setup(PlayerSettings::default());
    ctrl.start(sources(&["a.mp3"]));
    ctrl.process_pending_events();
    ctrl.toggle_play_pause();
    assert_eq!(ctrl.status(), PlaybackStatus::Paused);

    backend.emit_latest(MediaEventKind::Error(pmoplayback::SessionError::from_native_code(2)));
    ctrl.process_pending_events();

    assert_eq!(ctrl.status(), PlaybackStatus::Stalled);
    let error = ctrl.session().unwrap().last_error().unwrap();
    assert_eq!(error.kind, FailureKind::Network);
    assert_eq!(error.native_code, Some(2));
    assert_eq!(error.human_message, "Network Error");
}

#[test]
fn test_stall_while_paused_resumes_paused_at_same_position() {
    let (mut ctrl, backend, clock) = setup(PlayerSettings::default());
    ctrl.start(sources(&["a.mp3"]));
    ctrl.process_pending_events();
    backend.emit_latest(MediaEventKind::Progress {
        position: 42.5,
        duration: Some(180.0),
    });
    ctrl.process_pending_events();
    ctrl.toggle_play_pause();

    backend.emit_latest(MediaEventKind::Stalled);
    ctrl.process_pending_events();
    assert_eq!(ctrl.status(), PlaybackStatus::Stalled);

    assert!(fire_retry(&mut ctrl, &clock));
    let handle = ctrl.live_handle().unwrap();
    assert_eq!(ctrl.status(), PlaybackStatus::Paused);
    assert_eq!(ctrl.session().unwrap().position(), 42.5);
    assert!(backend.calls().contains(&SimulatedCall::Seek(handle, 42.5)));
    assert!(!backend.calls().contains(&SimulatedCall::Play(handle)));

    assert_eq!(ctrl.toggle_play_pause(), CommandOutcome::Applied);
    assert_eq!(ctrl.status(), PlaybackStatus::Playing);
}

#[test]
fn test_failure_while_playing_resumes_at_same_position() {
    let (mut ctrl, backend, clock) = setup(PlayerSettings::default());
    ctrl.start(sources(&["a.mp3"]));
    ctrl.process_pending_events();
    backend.emit_latest(MediaEventKind::Progress {
        position: 90.0,
        duration: Some(180.0),
    });
    backend.emit_latest(MediaEventKind::Error(pmoplayback::SessionError::new(
        FailureKind::Aborted,
    )));
    ctrl.process_pending_events();
    assert_eq!(ctrl.status(), PlaybackStatus::Stalled);

    assert!(fire_retry(&mut ctrl, &clock));
    let handle = ctrl.live_handle().unwrap();
    assert_eq!(ctrl.status(), PlaybackStatus::Playing);
    assert_eq!(ctrl.session().unwrap().position(), 90.0);

    let calls = backend.calls();
    let tail = &calls[calls.len() - 2..];
    assert_eq!(
        tail,
        &[SimulatedCall::Seek(handle, 90.0), SimulatedCall::Play(handle)]
    );
}

#[test]
fn test_seek_moves_to_fraction_of_duration() {
    let (mut ctrl, backend, _clock) = setup(PlayerSettings::default());
    ctrl.start(sources(&["a.mp3"]));
    ctrl.process_pending_events();
    let handle = ctrl.live_handle().unwrap();

    assert_eq!(ctrl.seek(0.5), CommandOutcome::Applied);
    assert_eq!(ctrl.session().unwrap().position(), 90.0);
    assert_eq!(ctrl.seek(4.0), CommandOutcome::Applied);
    assert_eq!(ctrl.session().unwrap().position(), 180.0);

    assert!(backend.calls().contains(&SimulatedCall::Seek(handle, 90.0)));
    assert!(backend.calls().contains(&SimulatedCall::Seek(handle, 180.0)));
}

#[test]
fn test_seek_is_refused_without_duration() {
    let backend = SimulatedBackend::new().with_default_duration(None);
    let clock = ManualClock::new();
    let mut ctrl =
        PlaybackController::with_clock(backend.clone(), PlayerSettings::default(), clock).unwrap();

    ctrl.start(sources(&["http://radio.example/live.mp3"]));
    ctrl.process_pending_events();
    assert_eq!(ctrl.status(), PlaybackStatus::Playing);
    assert_eq!(ctrl.seek(0.5), CommandOutcome::NotReady);
    assert!(!backend.calls().iter().any(|c| matches!(c, SimulatedCall::Seek(..))));
}

#[test]
fn test_progress_updates_position() {
    let (mut ctrl, backend, _clock) = setup(PlayerSettings::default());
    let events = ctrl.subscribe();
    ctrl.start(sources(&["a.mp3"]));
    ctrl.process_pending_events();
    drain(&events);

    backend.emit_latest(MediaEventKind::Progress {
        position: 42.5,
        duration: Some(180.0),
    });
    ctrl.process_pending_events();

    assert_eq!(ctrl.session().unwrap().position(), 42.5);
    assert_eq!(
        drain(&events),
        vec![PlaybackEvent::PositionChanged {
            position: 42.5,
            duration: Some(180.0)
        }]
    );
}

#[test]
fn test_end_of_track_loops() {
    let (mut ctrl, backend, _clock) = setup(PlayerSettings::default());
    ctrl.start(sources(&["a.mp3"]));
    ctrl.process_pending_events();
    let handle = ctrl.live_handle().unwrap();

    backend.emit_latest(MediaEventKind::Ended);
    ctrl.process_pending_events();

    assert_eq!(ctrl.status(), PlaybackStatus::Playing);
    assert_eq!(ctrl.session().unwrap().position(), 0.0);
    let calls = backend.calls();
    let tail = &calls[calls.len() - 2..];
    assert_eq!(
        tail,
        &[SimulatedCall::Seek(handle, 0.0), SimulatedCall::Play(handle)]
    );
}

#[test]
fn test_end_of_track_without_looping_pauses_at_end() {
    let settings = PlayerSettings {
        looping: false,
        ..PlayerSettings::default()
    };
    let (mut ctrl, backend, _clock) = setup(settings);
    ctrl.start(sources(&["a.mp3"]));
    ctrl.process_pending_events();

    backend.emit_latest(MediaEventKind::Ended);
    ctrl.process_pending_events();
    assert_eq!(ctrl.status(), PlaybackStatus::Paused);
    assert_eq!(ctrl.session().unwrap().position(), 180.0);

    assert_eq!(ctrl.toggle_play_pause(), CommandOutcome::Applied);
    assert_eq!(ctrl.status(), PlaybackStatus::Playing);
    assert_eq!(ctrl.session().unwrap().position(), 0.0);
}

#[test]
fn test_rejected_autoplay_pauses_and_notifies() {
    let (mut ctrl, backend, _clock) = setup(PlayerSettings::default());
    let events = ctrl.subscribe();
    backend.reject_next_play();

    ctrl.start(sources(&["a.mp3"]));
    ctrl.process_pending_events();
    assert_eq!(ctrl.status(), PlaybackStatus::Paused);
    assert!(drain(&events).contains(&PlaybackEvent::Notice(Notice::AutoplayBlocked)));

    assert_eq!(ctrl.toggle_play_pause(), CommandOutcome::Applied);
    ctrl.process_pending_events();
    assert_eq!(ctrl.status(), PlaybackStatus::Playing);
}

#[test]
fn test_manual_retry_cancels_pending_timer() {
    let (mut ctrl, backend, clock) = setup(PlayerSettings::default());
    backend.script("A.mp3", SimulatedLoad::fail(FailureKind::DecodeError));
    backend.script("A.mp3", SimulatedLoad::Silent);

    ctrl.start(sources(&["A.mp3", "B.mp3"]));
    ctrl.process_pending_events();
    assert!(ctrl.retry_pending());

    assert_eq!(ctrl.manual_retry(), CommandOutcome::Applied);
    assert!(!ctrl.retry_pending());
    assert_eq!(ctrl.session().unwrap().cursor(), SourceCursor::default());

    clock.advance(Duration::from_secs(10));
    assert!(!ctrl.poll_timers());
    assert_eq!(backend.opened(), vec!["A.mp3", "A.mp3"]);
}

#[test]
fn test_at_most_one_live_handle() {
    let (mut ctrl, backend, clock) = setup(PlayerSettings::default());
    backend.script_repeat("a.mp3", SimulatedLoad::Stall, 2);

    ctrl.start(sources(&["a.mp3"]));
    assert!(backend.live_handles() <= 1);
    ctrl.process_pending_events();
    assert_eq!(backend.live_handles(), 0);

    fire_retry(&mut ctrl, &clock);
    assert!(backend.live_handles() <= 1);
    ctrl.manual_retry();
    assert_eq!(backend.live_handles(), 1);
    ctrl.start(sources(&["b.mp3"]));
    assert_eq!(backend.live_handles(), 1);
    assert_eq!(ctrl.live_handle(), backend.latest_handle());
}

#[test]
fn test_events_from_released_handle_are_ignored() {
    let (mut ctrl, backend, _clock) = setup(PlayerSettings::default());
    ctrl.start(sources(&["a.mp3"]));
    ctrl.process_pending_events();
    let old = ctrl.live_handle().unwrap();

    ctrl.start(sources(&["b.mp3"]));
    assert!(!backend.emit(old, MediaEventKind::Ended));

    ctrl.handle_media_event(pmoplayback::MediaEvent {
        handle: old,
        kind: MediaEventKind::Error(pmoplayback::SessionError::new(FailureKind::DecodeError)),
    });
    ctrl.process_pending_events();
    assert_eq!(ctrl.status(), PlaybackStatus::Playing);
    assert!(ctrl.session().unwrap().last_error().is_none());
}

#[test]
fn test_dispose_is_idempotent_and_final() {
    let (mut ctrl, backend, clock) = setup(PlayerSettings::default());
    backend.script("a.mp3", SimulatedLoad::fail(FailureKind::Network));
    let events = ctrl.subscribe();

    ctrl.start(sources(&["a.mp3"]));
    ctrl.process_pending_events();
    assert!(ctrl.retry_pending());

    ctrl.dispose();
    ctrl.dispose();
    assert!(ctrl.is_disposed());
    assert!(!ctrl.retry_pending());
    assert_eq!(backend.live_handles(), 0);
    assert!(ctrl.session().is_none());

    clock.advance(Duration::from_secs(10));
    assert!(!ctrl.poll_timers());
    assert_eq!(backend.opened().len(), 1);

    assert_eq!(ctrl.toggle_play_pause(), CommandOutcome::Disposed);
    assert_eq!(ctrl.manual_retry(), CommandOutcome::Disposed);
    assert_eq!(ctrl.seek(0.1), CommandOutcome::Disposed);

    let disposed = drain(&events)
        .into_iter()
        .filter(|e| *e == PlaybackEvent::Disposed)
        .count();
    assert_eq!(disposed, 1);
}

#[test]
fn test_snapshot_serializes_to_json() {
    let (mut ctrl, backend, _clock) = setup(PlayerSettings::default());
    backend.script("a.mp3", SimulatedLoad::fail(FailureKind::FormatUnsupported));
    ctrl.start(sources(&["a.mp3"]));
    ctrl.process_pending_events();

    let json = ctrl.snapshot().unwrap().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["status"], "stalled");
    assert_eq!(value["last_error"]["kind"], "format_unsupported");
    assert_eq!(value["max_retries"], 3);
}
