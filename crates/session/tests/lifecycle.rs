mod common;

use common::{offline, settle, CountingFetcher, FlakyFetcher, GatedFetcher};
use looptrack_core::{CallbackEvent, EventObserver, EventRecorder, SessionState};
use looptrack_graph::{AudioNode, SourceState};
use looptrack_session::{BufferSession, ElementSession, GraphSession, Platform, Session};
use parking_lot::Mutex;
use std::sync::mpsc;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

fn every_variant(platform: Arc<dyn Platform>) -> Vec<Box<dyn Session>> {
    vec![
        Box::new(ElementSession::new(platform.as_ref(), "bgm.wav")),
        Box::new(BufferSession::new(platform.clone(), "bgm.wav", 1.0)),
        Box::new(GraphSession::new(platform, "bgm.wav", 1.0)),
    ]
}

#[test]
fn test_play_and_stop_before_load_do_nothing() {
    let platform = offline(Arc::new(CountingFetcher::default()));
    for session in every_variant(platform) {
        session.play().unwrap();
        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Unloaded, "{}", session.kind());
        assert!(!session.is_playing());
    }
}

#[test]
fn test_play_while_loading_does_nothing() {
    for index in 0..3 {
        let (fetcher, gate) = GatedFetcher::new();
        let platform = offline(Arc::new(fetcher));
        let session = every_variant(platform).remove(index);

        let pending = session.load();
        assert_eq!(session.state(), SessionState::Loading);
        session.play().unwrap();
        assert!(!session.is_playing(), "{}", session.kind());

        gate.send(()).unwrap();
        settle(pending).unwrap();
        assert_eq!(session.state(), SessionState::Loaded);
    }
}

#[test]
fn test_loaded_never_reverts() {
    let platform = offline(Arc::new(CountingFetcher::default()));
    for session in every_variant(platform) {
        settle(session.load()).unwrap();
        assert!(session.is_loaded());

        session.play().unwrap();
        assert!(session.is_loaded());
        session.stop().unwrap();
        assert!(session.is_loaded());
        assert!(session.load().is_none());
        session.play().unwrap();
        session.play().unwrap();
        assert!(session.is_loaded() && session.is_playing(), "{}", session.kind());
    }
}

#[test]
fn test_second_load_fetches_once() {
    let fetcher = Arc::new(CountingFetcher::default());
    let platform = offline(fetcher.clone());

    let element = ElementSession::new(platform.as_ref(), "bgm.wav");
    settle(element.load()).unwrap();
    assert!(element.load().is_none());
    assert_eq!(fetcher.fetches(), 1);
    assert_eq!(platform.elements_mounted(), 1);

    let buffer = BufferSession::new(platform.clone(), "bgm.wav", 1.0);
    settle(buffer.load()).unwrap();
    assert!(buffer.load().is_none());
    assert_eq!(fetcher.fetches(), 2);
    assert_eq!(platform.contexts_created(), 1);

    let graph = GraphSession::new(platform.clone(), "bgm.wav", 1.0);
    let pending = graph.load();
    // Already loading: also a no-op
    assert!(graph.load().is_none());
    settle(pending).unwrap();
    assert!(graph.load().is_none());
    assert_eq!(fetcher.fetches(), 3);
    assert_eq!(platform.contexts_created(), 2);
}

#[test]
fn test_failed_load_resets_and_retries() {
    let fetcher = Arc::new(FlakyFetcher::default());
    let platform = offline(fetcher.clone());
    let sessions = every_variant(platform.clone());

    for session in &sessions {
        let recorder = Arc::new(EventRecorder::new());
        session.add_observer(recorder.clone());

        assert!(settle(session.load()).is_err());
        assert_eq!(session.state(), SessionState::Unloaded, "{}", session.kind());
        assert_eq!(
            recorder.count(|e| matches!(e, CallbackEvent::LoadFailed { .. })),
            1
        );

        // The failure is reported, not fatal
        session.play().unwrap();
        assert!(!session.is_playing());
    }

    fetcher.heal();
    for session in &sessions {
        let attempts = fetcher.attempts();
        settle(session.load()).unwrap();
        assert!(session.is_loaded(), "{}", session.kind());
        assert_eq!(fetcher.attempts(), attempts + 1);
    }
    // Each failed attempt discarded its context, each retry opened a new one
    assert_eq!(platform.contexts_created(), 4);
    assert_eq!(platform.live_contexts(), 2);
    assert_eq!(platform.elements_mounted(), 1);
}

#[test]
fn test_buffer_replay_retires_previous_node() {
    let platform = offline(Arc::new(CountingFetcher::default()));
    let session = BufferSession::new(platform, "bgm.wav", 1.0);
    let recorder = Arc::new(EventRecorder::new());
    session.add_observer(recorder.clone());
    settle(session.load()).unwrap();

    session.play().unwrap();
    let first = session.current_node().unwrap();
    session.play().unwrap();
    let second = session.current_node().unwrap();

    assert_ne!(first.id(), second.id());
    assert_eq!(first.state(), SourceState::Stopped);
    assert_eq!(second.state(), SourceState::Started);
    assert_eq!(session.context().unwrap().active_source_count(), 1);

    let events = recorder.events();
    let stopped_first = events
        .iter()
        .position(|e| *e == CallbackEvent::NodeStopped { node_id: first.id().as_u64() })
        .unwrap();
    let started_second = events
        .iter()
        .position(|e| *e == CallbackEvent::NodeStarted { node_id: second.id().as_u64() })
        .unwrap();
    assert!(stopped_first < started_second);
}

/// Reads the session back from inside its own event callbacks
#[derive(Default)]
struct ReadBackObserver {
    session: Mutex<Weak<BufferSession>>,
    reads: Mutex<usize>,
}

impl EventObserver for ReadBackObserver {
    fn on_event(&self, _event: CallbackEvent) {
        let session = self.session.lock().upgrade();
        if let Some(session) = session {
            let _ = session.current_node();
            let _ = session.buffer();
            let _ = session.context();
            *self.reads.lock() += 1;
        }
    }
}

#[test]
fn test_buffer_observer_can_read_session_during_transport() {
    let platform = offline(Arc::new(CountingFetcher::default()));
    let session = Arc::new(BufferSession::new(platform, "bgm.wav", 1.0));
    settle(session.load()).unwrap();

    let observer = Arc::new(ReadBackObserver::default());
    *observer.session.lock() = Arc::downgrade(&session);
    session.add_observer(observer.clone());

    let (done_tx, done_rx) = mpsc::channel();
    let worker = session.clone();
    thread::spawn(move || {
        let result = worker
            .play()
            .and_then(|_| worker.play())
            .and_then(|_| worker.stop());
        let _ = done_tx.send(result);
    });

    let result = done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("transport deadlocked while an observer read the session");
    result.unwrap();
    assert!(*observer.reads.lock() > 0);
    assert_eq!(session.state(), SessionState::Loaded);
}

#[test]
fn test_buffer_loop_spans_whole_track() {
    let platform = offline(Arc::new(CountingFetcher::default()));
    let session = BufferSession::new(platform, "bgm.wav", 1.0);
    settle(session.load()).unwrap();
    session.play().unwrap();

    let duration = session.buffer().unwrap().duration();
    let node = session.current_node().unwrap();
    assert!(node.is_looping());
    assert_eq!(node.loop_bounds(), Some((0.0, duration)));
}

#[test]
fn test_buffer_stop_then_play_uses_fresh_node() {
    let platform = offline(Arc::new(CountingFetcher::default()));
    let session = BufferSession::new(platform, "bgm.wav", 1.0);
    settle(session.load()).unwrap();

    session.play().unwrap();
    let first = session.current_node().unwrap();
    session.stop().unwrap();
    // The retired node stays referenced
    assert_eq!(session.current_node().unwrap().id(), first.id());
    assert!(!session.is_playing());

    session.play().unwrap();
    let second = session.current_node().unwrap();
    assert_ne!(first.id(), second.id());
    assert_eq!(second.state(), SourceState::Started);
}

#[test]
fn test_buffer_scenario_event_trail() {
    let platform = offline(Arc::new(CountingFetcher::default()));
    let session = BufferSession::new(platform, "bgm.wav", 1.0);
    let recorder = Arc::new(EventRecorder::new());
    session.add_observer(recorder.clone());

    settle(session.load()).unwrap();
    session.play().unwrap();
    session.play().unwrap();
    session.stop().unwrap();

    assert_eq!(
        recorder.state_trail(),
        vec![
            SessionState::Loading,
            SessionState::Loaded,
            SessionState::Playing,
            SessionState::Playing,
            SessionState::Loaded,
        ]
    );
    assert_eq!(
        recorder.count(|e| matches!(e, CallbackEvent::NodeStarted { .. })),
        2
    );
    assert_eq!(
        recorder.count(|e| matches!(e, CallbackEvent::NodeStopped { .. })),
        2
    );
}

#[test]
fn test_stop_rewinds_element_variants() {
    let platform = offline(Arc::new(CountingFetcher::default()));
    let sessions: Vec<Box<dyn Session>> = vec![
        Box::new(ElementSession::new(platform.as_ref(), "bgm.wav")),
        Box::new(GraphSession::new(platform.clone(), "bgm.wav", 1.0)),
    ];

    for session in sessions {
        settle(session.load()).unwrap();
        assert_eq!(session.position(), Some(0.0));

        session.play().unwrap();
        platform.pump(800);
        let position = session.position().unwrap();
        assert!(position > 0.05, "{} at {}", session.kind(), position);

        session.stop().unwrap();
        assert_eq!(session.position(), Some(0.0));
        assert!(!session.is_playing());

        // Paused: time no longer advances
        platform.pump(800);
        assert_eq!(session.position(), Some(0.0));
    }
}

#[test]
fn test_graph_variant_loops_track() {
    let platform = offline(Arc::new(CountingFetcher::default()));
    let session = GraphSession::new(platform.clone(), "bgm.wav", 1.0);
    settle(session.load()).unwrap();
    session.play().unwrap();

    // 1.5 s into a 1 s track
    for _ in 0..15 {
        platform.pump(800);
    }
    let position = session.position().unwrap();
    assert!((position - 0.5).abs() < 0.01, "position {}", position);
    assert!(session.is_playing());
}

#[test]
fn test_element_session_without_element() {
    let session = ElementSession::with_element(None, "bgm.wav");
    assert!(session.load().is_none());
    session.play().unwrap();
    session.stop().unwrap();
    assert_eq!(session.state(), SessionState::Unloaded);
    assert_eq!(session.position(), None);
}

#[test]
fn test_node_events_reach_platform_observers() {
    let platform = offline(Arc::new(CountingFetcher::default()));
    let recorder = Arc::new(EventRecorder::new());
    platform.observe_contexts(recorder.clone());

    let session = BufferSession::new(platform, "bgm.wav", 1.0);
    settle(session.load()).unwrap();
    session.play().unwrap();
    session.stop().unwrap();

    assert_eq!(
        recorder.count(|e| matches!(e, CallbackEvent::NodeStarted { .. })),
        1
    );
    assert_eq!(
        recorder.count(|e| matches!(e, CallbackEvent::NodeStopped { .. })),
        1
    );
}
