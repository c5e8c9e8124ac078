// Session manager
//
// Owns the single active recording slot, drives sessions from start intent to
// a terminal state, hands finished artifacts to the history store and keeps
// the artifact currently shown in preview.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::artifact::{Artifact, ArtifactId, ArtifactIdGenerator, ArtifactSummary, PreviewSource};
use super::encoder::{EncoderConfig, EncoderError, EncoderFactory, EncoderSink};
use super::session::{RecordingSession, SessionEvent, SessionOutcome};
use super::state::SessionState;
use crate::capture::{
    compose, AudioMixer, CaptureError, CaptureOptions, CapturePlatform, CaptureSourceResolver,
};
use crate::config::RecorderConfig;
use crate::download::ArtifactSink;
use crate::events::{
    current_timestamp, ArtifactReadyPayload, HistoryUpdatedPayload, MicrophoneWarningPayload,
    RecorderEventEmitter, RecordingErrorPayload, SessionStateChangedPayload,
};
use crate::format::select_format;
use crate::history::{HistoryStore, PersistenceError};

/// Reasons a start intent is rejected or a start attempt fails
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("A recording session is already active ({0:?})")]
    AlreadyActive(SessionState),
    #[error("No supported recording format is available")]
    FormatUnsupported,
    #[error("Screen capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("Encoder failed: {0}")]
    Encoder(#[from] EncoderError),
    #[error("Recording was stopped before capture began")]
    Cancelled,
}

/// The artifact currently offered for viewing and download
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub artifact: Artifact,
    pub source: PreviewSource,
}

struct ActiveSession {
    id: Uuid,
    state: watch::Receiver<SessionState>,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel_requested: Arc<AtomicBool>,
    outcome: watch::Receiver<Option<SessionOutcome>>,
}

#[derive(Default)]
struct ManagerShared {
    active: Mutex<Option<ActiveSession>>,
    preview: Mutex<Option<Preview>>,
}

/// Occupies the active slot until the session's outcome is published.
/// Dropping it unfinished frees the slot and wakes waiters with no outcome.
struct SessionSlot {
    id: Uuid,
    shared: Arc<ManagerShared>,
    emitter: Arc<dyn RecorderEventEmitter>,
    state: watch::Receiver<SessionState>,
    outcome_tx: watch::Sender<Option<SessionOutcome>>,
    finished: bool,
}

impl SessionSlot {
    fn vacate(&self) {
        let mut active = self.shared.active.lock();
        if active.as_ref().map(|a| a.id) == Some(self.id) {
            *active = None;
        }
    }

    fn finish(mut self, outcome: SessionOutcome) {
        self.finished = true;
        self.vacate();
        // A cancelled session has already announced Idle
        if *self.state.borrow() != SessionState::Idle {
            self.emitter
                .emit_session_state_changed(SessionStateChangedPayload {
                    session_id: None,
                    state: SessionState::Idle,
                    timestamp: current_timestamp(),
                });
        }
        crate::debug!("Session {} finished, recorder idle", self.id);
        self.outcome_tx.send_replace(Some(outcome));
    }
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        if !self.finished {
            crate::warn!("Session {} abandoned before finishing", self.id);
            self.vacate();
        }
    }
}

/// Entry point for the presentation layer
pub struct SessionManager {
    platform: Arc<dyn CapturePlatform>,
    encoders: Arc<dyn EncoderFactory>,
    history: HistoryStore,
    emitter: Arc<dyn RecorderEventEmitter>,
    config: RecorderConfig,
    selected_format: Option<String>,
    ids: Arc<ArtifactIdGenerator>,
    shared: Arc<ManagerShared>,
}

impl SessionManager {
    /// Build a manager. The recording format is selected here, once.
    pub fn new(
        platform: Arc<dyn CapturePlatform>,
        encoders: Arc<dyn EncoderFactory>,
        history: HistoryStore,
        emitter: Arc<dyn RecorderEventEmitter>,
        config: RecorderConfig,
    ) -> Self {
        let selected_format = select_format(&config.format_preferences, |mime_type| {
            encoders.is_type_supported(mime_type)
        });
        Self {
            platform,
            encoders,
            history,
            emitter,
            config,
            selected_format,
            ids: Arc::new(ArtifactIdGenerator::new()),
            shared: Arc::new(ManagerShared::default()),
        }
    }

    pub fn selected_format(&self) -> Option<&str> {
        self.selected_format.as_deref()
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// State of the active session, `Idle` when there is none
    pub fn state(&self) -> SessionState {
        self.shared
            .active
            .lock()
            .as_ref()
            .map(|a| *a.state.borrow())
            .unwrap_or(SessionState::Idle)
    }

    pub fn active_session_id(&self) -> Option<Uuid> {
        self.shared.active.lock().as_ref().map(|a| a.id)
    }

    /// Start a recording.
    ///
    /// Returns once the encoder is running (or the attempt failed). The
    /// session then runs on its own task until stopped or the source ends.
    ///
    /// # Errors
    /// - `FormatUnsupported` before anything is acquired
    /// - `AlreadyActive` while another session occupies the slot
    /// - `Capture`, `Encoder` when the session failed
    /// - `Cancelled` when `stop` was called during acquisition
    pub async fn start(&self, options: CaptureOptions) -> Result<Uuid, SessionError> {
        let Some(mime_type) = self.selected_format.clone() else {
            let err = SessionError::FormatUnsupported;
            self.emitter.emit_recording_error(RecordingErrorPayload {
                message: err.to_string(),
            });
            return Err(err);
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let cancel_requested = Arc::new(AtomicBool::new(false));

        let mut session = RecordingSession::new(
            mime_type.clone(),
            self.config.file_name_prefix.clone(),
            self.ids.clone(),
            self.emitter.clone(),
        );
        let id = session.id();

        {
            let mut active = self.shared.active.lock();
            if let Some(current) = active.as_ref() {
                let state = *current.state.borrow();
                crate::warn!("Start rejected, session {} is {:?}", current.id, state);
                return Err(SessionError::AlreadyActive(state));
            }
            *active = Some(ActiveSession {
                id,
                state: session.subscribe(),
                events: events_tx.clone(),
                cancel_requested: cancel_requested.clone(),
                outcome: outcome_rx,
            });
        }
        let slot = SessionSlot {
            id,
            shared: self.shared.clone(),
            emitter: self.emitter.clone(),
            state: session.subscribe(),
            outcome_tx,
            finished: false,
        };

        if let Err(e) = session.begin_acquiring() {
            crate::warn!("Session {}: {}", id, e);
        }
        crate::info!("Session {} starting: {:?}", id, options);

        let resolver = CaptureSourceResolver::new(
            self.platform.clone(),
            self.config.display.clone(),
            self.config.microphone.clone(),
        );
        let ended_tx = events_tx.clone();
        let acquired = resolver
            .acquire(options, move || {
                crate::info!("Capture source ended by the platform");
                let _ = ended_tx.send(SessionEvent::SourceEnded);
            })
            .await;

        let acquisition = match acquired {
            Ok(acquisition) => acquisition,
            Err(e) => {
                let outcome = session.fail(format!("Screen capture failed: {}", e));
                slot.finish(outcome);
                return Err(SessionError::Capture(e));
            }
        };

        if cancel_requested.load(Ordering::SeqCst) {
            acquisition.bundle.stop_all();
            let outcome = match session.cancel() {
                Ok(outcome) => outcome,
                Err(e) => session.fail(e.to_string()),
            };
            slot.finish(outcome);
            return Err(SessionError::Cancelled);
        }

        let mixer = AudioMixer::new(self.platform.clone());
        let (capture, mixing_error) = compose(acquisition.bundle, &mixer);
        if let Some(e) = acquisition.microphone_error.or(mixing_error) {
            self.emitter
                .emit_microphone_warning(MicrophoneWarningPayload {
                    message: format!("Recording without microphone: {}", e),
                    timestamp: current_timestamp(),
                });
        }

        let encoder_config = EncoderConfig {
            mime_type,
            video_bits_per_second: self.config.video_bits_per_second,
        };
        if let Err(e) = session.begin_recording(
            capture,
            self.encoders.as_ref(),
            &encoder_config,
            self.config.timeslice(),
            EncoderSink::new(events_tx),
        ) {
            slot.finish(SessionOutcome::Failed(e.to_string()));
            return Err(SessionError::Encoder(e));
        }

        let shared = self.shared.clone();
        let history = self.history.clone();
        let emitter = self.emitter.clone();
        tokio::spawn(async move {
            let outcome = session.run(events_rx).await;
            if let SessionOutcome::Completed(artifact) = &outcome {
                publish_artifact(&shared, &history, emitter.as_ref(), artifact).await;
            }
            slot.finish(outcome);
        });

        Ok(id)
    }

    /// Stop the active session and wait for its outcome.
    ///
    /// A no-op returning `None` when nothing is active. Calling it again
    /// while a stop is in flight waits for the same outcome.
    pub async fn stop(&self) -> Option<SessionOutcome> {
        let (events, cancel_requested, mut outcome) = {
            let active = self.shared.active.lock();
            let Some(current) = active.as_ref() else {
                crate::debug!("Stop ignored, no active session");
                return None;
            };
            (
                current.events.clone(),
                current.cancel_requested.clone(),
                current.outcome.clone(),
            )
        };

        cancel_requested.store(true, Ordering::SeqCst);
        let _ = events.send(SessionEvent::StopRequested);
        wait_for_outcome(&mut outcome).await
    }

    /// Wait for the active session to end on its own (e.g. the source ended)
    pub async fn wait_for_finish(&self) -> Option<SessionOutcome> {
        let mut outcome = {
            let active = self.shared.active.lock();
            active.as_ref()?.outcome.clone()
        };
        wait_for_outcome(&mut outcome).await
    }

    pub fn current_preview(&self) -> Option<Preview> {
        self.shared.preview.lock().clone()
    }

    /// Close the preview
    pub fn clear_preview(&self) {
        self.shared.preview.lock().take();
    }

    /// Most recent recordings first, at most `limit`
    pub async fn list_history(&self, limit: usize) -> Result<Vec<ArtifactSummary>, PersistenceError> {
        self.history.list(limit).await
    }

    pub async fn history_item(&self, id: ArtifactId) -> Result<Option<Artifact>, PersistenceError> {
        self.history.get_by_id(id).await
    }

    /// Load a history entry into the preview.
    ///
    /// Returns `None` when the entry no longer exists.
    pub async fn open_from_history(
        &self,
        id: ArtifactId,
    ) -> Result<Option<ArtifactSummary>, PersistenceError> {
        let Some(artifact) = self.history.get_by_id(id).await? else {
            crate::debug!("History entry {} not found", id);
            return Ok(None);
        };
        let summary = artifact.summary();
        show_preview(&self.shared, self.emitter.as_ref(), artifact, PreviewSource::History);
        Ok(Some(summary))
    }

    /// Save the previewed artifact. Returns false when nothing is previewed.
    pub fn download_current(&self, sink: &dyn ArtifactSink) -> bool {
        let Some(preview) = self.current_preview() else {
            crate::debug!("Download ignored, nothing in preview");
            return false;
        };
        sink.save(preview.artifact.payload, &preview.artifact.name);
        true
    }

    /// Save a history entry. Returns false when the entry does not exist.
    pub async fn download_from_history(
        &self,
        id: ArtifactId,
        sink: &dyn ArtifactSink,
    ) -> Result<bool, PersistenceError> {
        match self.history.get_by_id(id).await? {
            Some(artifact) => {
                sink.save(artifact.payload, &artifact.name);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

async fn wait_for_outcome(
    outcome: &mut watch::Receiver<Option<SessionOutcome>>,
) -> Option<SessionOutcome> {
    match outcome.wait_for(Option::is_some).await {
        Ok(value) => (*value).clone(),
        Err(_) => None,
    }
}

fn show_preview(
    shared: &ManagerShared,
    emitter: &dyn RecorderEventEmitter,
    artifact: Artifact,
    source: PreviewSource,
) {
    let summary = artifact.summary();
    *shared.preview.lock() = Some(Preview { artifact, source });
    emitter.emit_artifact_ready(ArtifactReadyPayload {
        artifact: summary,
        source,
    });
}

/// Preview a fresh recording and persist it. Persistence failures are logged
/// and leave the preview intact.
async fn publish_artifact(
    shared: &ManagerShared,
    history: &HistoryStore,
    emitter: &dyn RecorderEventEmitter,
    artifact: &Artifact,
) {
    show_preview(shared, emitter, artifact.clone(), PreviewSource::Recording);

    match history.insert(artifact).await {
        Ok(evicted) => emitter.emit_history_updated(HistoryUpdatedPayload {
            action: "insert".to_string(),
            artifact_id: artifact.id,
            evicted,
        }),
        Err(e) => crate::warn!("Recording {} not saved to history: {}", artifact.name, e),
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
