use super::*;
use crate::capture::tests::{DisplayBehavior, MicrophoneBehavior, MockCapturePlatform};
use crate::capture::{compose, AudioMixer, CaptureOptions, CaptureSourceResolver};
use crate::config::{DisplayConstraints, MicrophoneConstraints};
use crate::events::tests::MockEventEmitter;
use crate::recording::encoder::tests::MockEncoderFactory;
use std::sync::atomic::Ordering;

const MIME: &str = "video/webm;codecs=vp9,opus";

struct Harness {
    platform: Arc<MockCapturePlatform>,
    factory: MockEncoderFactory,
    emitter: Arc<MockEventEmitter>,
    tx: mpsc::UnboundedSender<SessionEvent>,
    rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Harness {
    fn new(platform: MockCapturePlatform) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            platform: Arc::new(platform),
            factory: MockEncoderFactory::supporting(&[MIME]),
            emitter: Arc::new(MockEventEmitter::new()),
            tx,
            rx,
        }
    }

    fn session(&self) -> RecordingSession {
        RecordingSession::new(
            MIME.to_string(),
            "REC_SR1".to_string(),
            Arc::new(ArtifactIdGenerator::new()),
            self.emitter.clone(),
        )
    }

    async fn capture(&self, options: CaptureOptions) -> CaptureStream {
        let resolver = CaptureSourceResolver::new(
            self.platform.clone(),
            DisplayConstraints::default(),
            MicrophoneConstraints::default(),
        );
        let tx = self.tx.clone();
        let acquisition = resolver
            .acquire(options, move || {
                let _ = tx.send(SessionEvent::SourceEnded);
            })
            .await
            .expect("capture should be granted");
        let mixer = AudioMixer::new(self.platform.clone());
        compose(acquisition.bundle, &mixer).0
    }

    async fn recording(&self, options: CaptureOptions) -> RecordingSession {
        let mut session = self.session();
        session.begin_acquiring().unwrap();
        let capture = self.capture(options).await;
        session
            .begin_recording(
                capture,
                &self.factory,
                &encoder_config(),
                Duration::from_millis(100),
                EncoderSink::new(self.tx.clone()),
            )
            .expect("encoder should start");
        session
    }

    /// Feed every queued event to the session
    fn drain(&mut self, session: &mut RecordingSession) -> Option<SessionOutcome> {
        while let Ok(event) = self.rx.try_recv() {
            if let Some(outcome) = session.handle(event) {
                return Some(outcome);
            }
        }
        None
    }
}

fn encoder_config() -> EncoderConfig {
    EncoderConfig {
        mime_type: MIME.to_string(),
        video_bits_per_second: 8_000_000,
    }
}

fn video_only() -> CaptureOptions {
    CaptureOptions {
        want_microphone: false,
        want_system_audio: false,
    }
}

fn expect_artifact(outcome: Option<SessionOutcome>) -> Artifact {
    match outcome {
        Some(SessionOutcome::Completed(artifact)) => artifact,
        other => panic!("expected a completed artifact, got {:?}", other),
    }
}

#[tokio::test]
async fn test_segments_accumulate_into_artifact() {
    let mut h = Harness::new(MockCapturePlatform::granting());
    let mut session = h.recording(video_only()).await;
    assert_eq!(session.state(), SessionState::Recording);

    h.factory.emit(vec![0xAA; 500]);
    h.factory.emit(vec![0xBB; 700]);
    assert!(h.drain(&mut session).is_none());
    assert_eq!(session.buffered_bytes(), 1200);

    session.handle(SessionEvent::StopRequested);
    assert_eq!(session.state(), SessionState::Finalizing);

    let artifact = expect_artifact(h.drain(&mut session));
    assert_eq!(session.state(), SessionState::Completed);
    assert_eq!(artifact.size_bytes, 1200);
    assert_eq!(artifact.mime_type, MIME);
    assert!(artifact.name.starts_with("REC_SR1_"));
    assert!(artifact.name.ends_with(".webm"));

    let mut expected = vec![0xAA; 500];
    expected.extend(vec![0xBB; 700]);
    assert_eq!(artifact.payload, expected);
}

#[tokio::test]
async fn test_final_segment_delivered_on_stop_is_kept() {
    let mut h = Harness::new(MockCapturePlatform::granting());
    let mut session = h.recording(video_only()).await;

    h.factory.emit(vec![1; 10]);
    h.factory.set_final_segment(vec![2; 5]);
    session.handle(SessionEvent::StopRequested);

    let artifact = expect_artifact(h.drain(&mut session));
    assert_eq!(artifact.size_bytes, 15);
    assert_eq!(&artifact.payload[10..], &[2; 5]);
}

#[tokio::test]
async fn test_encoder_receives_config_and_timeslice() {
    let h = Harness::new(MockCapturePlatform::granting());
    let _session = h.recording(video_only()).await;

    assert_eq!(h.factory.created(), 1);
    assert_eq!(h.factory.state.configs.lock()[0], encoder_config());
    assert_eq!(
        *h.factory.state.timeslice.lock(),
        Some(Duration::from_millis(100))
    );
}

#[tokio::test]
async fn test_stop_releases_tracks_and_graph() {
    let mut h = Harness::new(MockCapturePlatform::new(
        DisplayBehavior::Grant { system_audio: true },
        MicrophoneBehavior::Grant,
    ));
    let options = CaptureOptions {
        want_microphone: true,
        want_system_audio: true,
    };
    let mut session = h.recording(options).await;

    session.handle(SessionEvent::StopRequested);
    assert!(h.platform.all_tracks_stopped());
    assert!(h.platform.last_graph().unwrap().closed.load(Ordering::SeqCst));

    expect_artifact(h.drain(&mut session));
}

#[tokio::test]
async fn test_source_ended_matches_explicit_stop() {
    // Explicit stop
    let mut h1 = Harness::new(MockCapturePlatform::granting());
    let mut stopped = h1.recording(video_only()).await;
    h1.factory.emit(vec![7; 300]);
    h1.drain(&mut stopped);
    stopped.handle(SessionEvent::StopRequested);
    let by_stop = expect_artifact(h1.drain(&mut stopped));

    // Platform ends the share
    let mut h2 = Harness::new(MockCapturePlatform::granting());
    let mut ended = h2.recording(video_only()).await;
    h2.factory.emit(vec![7; 300]);
    h2.drain(&mut ended);
    h2.platform.track("screen").unwrap().end();
    let by_source = expect_artifact(h2.drain(&mut ended));

    assert_eq!(by_stop.payload, by_source.payload);
    assert_eq!(by_stop.size_bytes, by_source.size_bytes);
    assert_eq!(by_stop.mime_type, by_source.mime_type);
    assert_eq!(ended.state(), SessionState::Completed);
    assert!(h2.platform.all_tracks_stopped());
}

#[tokio::test]
async fn test_repeated_stop_is_a_no_op() {
    let mut h = Harness::new(MockCapturePlatform::granting());
    let mut session = h.recording(video_only()).await;

    assert!(session.handle(SessionEvent::StopRequested).is_none());
    assert!(session.handle(SessionEvent::StopRequested).is_none());
    assert!(session.handle(SessionEvent::SourceEnded).is_none());
    assert_eq!(h.factory.stop_count(), 1);

    expect_artifact(h.drain(&mut session));
    // After completion stop is still harmless
    assert!(session.handle(SessionEvent::StopRequested).is_none());
    assert_eq!(session.state(), SessionState::Completed);
}

#[tokio::test]
async fn test_empty_and_early_segments_are_ignored() {
    let mut h = Harness::new(MockCapturePlatform::granting());
    let mut session = h.session();
    session.begin_acquiring().unwrap();

    // Not recording yet
    assert!(session
        .handle(SessionEvent::SegmentAvailable(vec![1, 2, 3]))
        .is_none());
    assert_eq!(session.buffered_bytes(), 0);

    let capture = h.capture(video_only()).await;
    session
        .begin_recording(
            capture,
            &h.factory,
            &encoder_config(),
            Duration::from_millis(100),
            EncoderSink::new(h.tx.clone()),
        )
        .unwrap();
    session.handle(SessionEvent::SegmentAvailable(Vec::new()));
    assert_eq!(session.buffered_bytes(), 0);
    assert!(h.drain(&mut session).is_none());
}

#[tokio::test]
async fn test_encoder_error_fails_and_releases() {
    let mut h = Harness::new(MockCapturePlatform::granting());
    let mut session = h.recording(video_only()).await;
    h.factory.emit(vec![1; 50]);
    h.factory.raise_error("disk full");

    let outcome = h.drain(&mut session);
    assert!(matches!(outcome, Some(SessionOutcome::Failed(ref m)) if m.contains("disk full")));
    assert_eq!(session.state(), SessionState::Failed);
    assert!(h.platform.all_tracks_stopped());
    assert_eq!(h.emitter.error_events.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_encoder_start_failure_releases_capture() {
    let h = Harness::new(MockCapturePlatform::granting());
    h.factory.state.fail_start.store(true, Ordering::SeqCst);

    let mut session = h.session();
    session.begin_acquiring().unwrap();
    let capture = h.capture(video_only()).await;
    let result = session.begin_recording(
        capture,
        &h.factory,
        &encoder_config(),
        Duration::from_millis(100),
        EncoderSink::new(h.tx.clone()),
    );

    assert!(matches!(result, Err(EncoderError::Start(_))));
    assert_eq!(session.state(), SessionState::Failed);
    assert!(h.platform.all_tracks_stopped());
}

#[tokio::test]
async fn test_cancel_during_acquisition_returns_to_idle() {
    let h = Harness::new(MockCapturePlatform::granting());
    let mut session = h.session();
    session.begin_acquiring().unwrap();

    let outcome = session.cancel().unwrap();
    assert_eq!(outcome, SessionOutcome::Cancelled);
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(h.factory.created(), 0);
}

#[tokio::test]
async fn test_state_changes_are_published() {
    let mut h = Harness::new(MockCapturePlatform::granting());
    let mut session = h.recording(video_only()).await;
    let watch = session.subscribe();
    assert_eq!(*watch.borrow(), SessionState::Recording);

    session.handle(SessionEvent::StopRequested);
    expect_artifact(h.drain(&mut session));

    assert_eq!(*watch.borrow(), SessionState::Completed);
    assert_eq!(
        h.emitter.states(),
        vec![
            SessionState::Acquiring,
            SessionState::Recording,
            SessionState::Finalizing,
            SessionState::Completed
        ]
    );
    let ids: Vec<_> = h
        .emitter
        .state_events
        .lock()
        .unwrap()
        .iter()
        .map(|p| p.session_id)
        .collect();
    assert!(ids.iter().all(|id| *id == Some(session.id())));
}

#[tokio::test]
async fn test_run_completes_on_stop() {
    let h = Harness::new(MockCapturePlatform::granting());
    let session = h.recording(video_only()).await;
    let Harness {
        factory, tx, rx, ..
    } = h;

    let task = tokio::spawn(session.run(rx));
    factory.emit(vec![3; 500]);
    factory.emit(vec![4; 700]);
    tx.send(SessionEvent::StopRequested).unwrap();

    let outcome = task.await.unwrap();
    let artifact = outcome.artifact().expect("artifact");
    assert_eq!(artifact.size_bytes, 1200);
}

#[tokio::test(start_paused = true)]
async fn test_run_finalizes_when_encoder_never_stops() {
    let h = Harness::new(MockCapturePlatform::granting());
    h.factory.state.silent_stop.store(true, Ordering::SeqCst);
    let session = h.recording(video_only()).await;
    let Harness {
        factory, tx, rx, ..
    } = h;

    factory.emit(vec![9; 64]);
    tx.send(SessionEvent::StopRequested).unwrap();

    let outcome = session.run(rx).await;
    assert_eq!(outcome.artifact().map(|a| a.size_bytes), Some(64));
}
