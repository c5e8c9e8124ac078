// Recording session
//
// Owns the capture stream and the encoder of one recording. Every platform
// callback arrives as a `SessionEvent` and is applied by `handle`, so the
// state machine has a single consumer and segments keep their arrival order.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::artifact::{derive_file_name, Artifact, ArtifactIdGenerator};
use super::encoder::{EncoderConfig, EncoderError, EncoderFactory, EncoderSink, MediaEncoder};
use super::state::{SessionState, SessionStateError, SessionStateMachine};
use crate::capture::CaptureStream;
use crate::events::{
    current_timestamp, RecorderEventEmitter, RecordingErrorPayload, SessionStateChangedPayload,
};

/// How long to wait for the encoder's final segment once a stop was issued
pub const FINALIZE_TIMEOUT: Duration = Duration::from_secs(5);

/// Inputs to the session state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Periodic encoder output
    SegmentAvailable(Vec<u8>),
    /// Encoder delivered its last segment
    EncoderStopped,
    EncoderError(String),
    /// The platform ended the shared source (native "stop sharing")
    SourceEnded,
    /// Explicit stop intent from the collaborator
    StopRequested,
}

/// How a session ended
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Completed(Artifact),
    Failed(String),
    /// Stopped before a stream was recorded
    Cancelled,
}

impl SessionOutcome {
    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            SessionOutcome::Completed(artifact) => Some(artifact),
            _ => None,
        }
    }
}

/// A single recording from start intent to Completed or Failed
pub struct RecordingSession {
    id: Uuid,
    machine: SessionStateMachine,
    capture: Option<CaptureStream>,
    encoder: Option<Box<dyn MediaEncoder>>,
    segments: Vec<Vec<u8>>,
    mime_type: String,
    file_name_prefix: String,
    ids: Arc<ArtifactIdGenerator>,
    state_tx: watch::Sender<SessionState>,
    emitter: Arc<dyn RecorderEventEmitter>,
}

impl RecordingSession {
    pub fn new(
        mime_type: String,
        file_name_prefix: String,
        ids: Arc<ArtifactIdGenerator>,
        emitter: Arc<dyn RecorderEventEmitter>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            id: Uuid::new_v4(),
            machine: SessionStateMachine::new(),
            capture: None,
            encoder: None,
            segments: Vec::new(),
            mime_type,
            file_name_prefix,
            ids,
            state_tx,
            emitter,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.machine.get_state()
    }

    /// Receiver that observes every state the session moves through
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Total bytes buffered so far
    pub fn buffered_bytes(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }

    fn transition(&mut self, next: SessionState) -> Result<(), SessionStateError> {
        let from = self.machine.get_state();
        self.machine.transition_to(next)?;
        self.state_tx.send_replace(next);
        crate::debug!("Session {}: {:?} -> {:?}", self.id, from, next);
        self.emitter
            .emit_session_state_changed(SessionStateChangedPayload {
                session_id: Some(self.id),
                state: next,
                timestamp: current_timestamp(),
            });
        Ok(())
    }

    /// Idle -> Acquiring
    pub fn begin_acquiring(&mut self) -> Result<(), SessionStateError> {
        self.transition(SessionState::Acquiring)
    }

    /// Acquiring -> Idle, for a stop that arrived before a stream existed
    pub fn cancel(&mut self) -> Result<SessionOutcome, SessionStateError> {
        self.release();
        self.transition(SessionState::Idle)?;
        crate::info!("Session {} cancelled during acquisition", self.id);
        Ok(SessionOutcome::Cancelled)
    }

    /// Any active state -> Failed. Releases every resource first.
    pub fn fail(&mut self, message: impl Into<String>) -> SessionOutcome {
        let message = message.into();
        if let Some(mut encoder) = self.encoder.take() {
            if encoder.is_active() {
                encoder.stop();
            }
        }
        self.release();
        self.segments.clear();

        if let Err(e) = self.transition(SessionState::Failed) {
            crate::warn!("Session {}: {}", self.id, e);
        }
        crate::error!("Session {} failed: {}", self.id, message);
        self.emitter.emit_recording_error(RecordingErrorPayload {
            message: message.clone(),
        });
        SessionOutcome::Failed(message)
    }

    /// Acquiring -> Recording: build the encoder over the composed stream and
    /// start it with the chunking interval.
    ///
    /// On error the capture is released and the session is Failed.
    pub fn begin_recording(
        &mut self,
        capture: CaptureStream,
        factory: &dyn EncoderFactory,
        config: &EncoderConfig,
        timeslice: Duration,
        sink: EncoderSink,
    ) -> Result<(), EncoderError> {
        self.capture = Some(capture);

        let created = match self.capture.as_ref() {
            Some(capture) => factory.create(capture.stream(), config, sink),
            None => Err(EncoderError::Construction("capture stream missing".to_string())),
        };
        let mut encoder = match created {
            Ok(encoder) => encoder,
            Err(e) => {
                self.fail(e.to_string());
                return Err(e);
            }
        };

        if let Err(e) = encoder.start(timeslice) {
            self.fail(e.to_string());
            return Err(e);
        }
        self.encoder = Some(encoder);

        if let Err(e) = self.transition(SessionState::Recording) {
            let message = e.to_string();
            self.fail(message.clone());
            return Err(EncoderError::Start(message));
        }
        crate::info!(
            "Session {} recording as {} ({} ms segments)",
            self.id,
            config.mime_type,
            timeslice.as_millis()
        );
        Ok(())
    }

    /// Apply one event. Returns the outcome once the session is terminal.
    pub fn handle(&mut self, event: SessionEvent) -> Option<SessionOutcome> {
        let state = self.machine.get_state();
        match event {
            SessionEvent::SegmentAvailable(data) => {
                if matches!(state, SessionState::Recording | SessionState::Finalizing)
                    && !data.is_empty()
                {
                    crate::trace!("Session {}: segment of {} bytes", self.id, data.len());
                    self.segments.push(data);
                } else {
                    crate::trace!("Session {}: segment ignored in {:?}", self.id, state);
                }
                None
            }
            // Both stop paths share one finalization procedure; repeats are no-ops
            SessionEvent::StopRequested => {
                if state == SessionState::Recording {
                    self.begin_finalizing("stop requested");
                }
                None
            }
            SessionEvent::SourceEnded => {
                if state == SessionState::Recording {
                    self.begin_finalizing("source ended");
                }
                None
            }
            SessionEvent::EncoderStopped => match state {
                SessionState::Recording => {
                    self.begin_finalizing("encoder stopped");
                    Some(self.finalize())
                }
                SessionState::Finalizing => Some(self.finalize()),
                _ => None,
            },
            SessionEvent::EncoderError(message) => {
                if matches!(state, SessionState::Recording | SessionState::Finalizing) {
                    Some(self.fail(format!("Encoder error: {}", message)))
                } else {
                    None
                }
            }
        }
    }

    /// Recording -> Finalizing: halt the encoder and release the capture
    fn begin_finalizing(&mut self, reason: &str) {
        if let Err(e) = self.transition(SessionState::Finalizing) {
            crate::warn!("Session {}: {}", self.id, e);
            return;
        }
        crate::info!("Session {} finalizing ({})", self.id, reason);
        if let Some(encoder) = self.encoder.as_mut() {
            encoder.stop();
        }
        self.release();
    }

    /// Finalizing -> Completed: concatenate segments into the artifact
    pub fn finalize(&mut self) -> SessionOutcome {
        self.encoder = None;
        self.release();

        if let Err(e) = self.transition(SessionState::Completed) {
            return self.fail(e.to_string());
        }

        let created_at = Utc::now();
        let id = self.ids.next_id(created_at);
        let name = derive_file_name(
            &self.file_name_prefix,
            &self.mime_type,
            created_at.with_timezone(&Local).naive_local(),
        );
        let segments = std::mem::take(&mut self.segments);
        let count = segments.len();
        let artifact = Artifact::from_segments(id, name, created_at, self.mime_type.clone(), segments);

        crate::info!(
            "Session {} completed: {} ({} segments, {} bytes)",
            self.id,
            artifact.name,
            count,
            artifact.size_bytes
        );
        SessionOutcome::Completed(artifact)
    }

    fn release(&mut self) {
        if let Some(capture) = self.capture.as_mut() {
            capture.release();
        }
    }

    /// Consume events until the session is terminal.
    ///
    /// While finalizing, an encoder that never reports its stop is given
    /// `FINALIZE_TIMEOUT` before the buffered segments are finalized anyway.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SessionEvent>) -> SessionOutcome {
        loop {
            let next = if self.state() == SessionState::Finalizing {
                match tokio::time::timeout(FINALIZE_TIMEOUT, rx.recv()).await {
                    Ok(event) => event,
                    Err(_) => {
                        crate::warn!(
                            "Session {}: encoder did not stop within {:?}, finalizing buffered data",
                            self.id,
                            FINALIZE_TIMEOUT
                        );
                        return self.finalize();
                    }
                }
            } else {
                rx.recv().await
            };

            let Some(event) = next else {
                return self.fail("session event channel closed");
            };
            if let Some(outcome) = self.handle(event) {
                return outcome;
            }
        }
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if let Some(encoder) = self.encoder.as_mut() {
            if encoder.is_active() {
                encoder.stop();
            }
        }
        self.release();
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
