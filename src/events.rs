// Recorder events for the presentation layer
// Defines event payloads and the emission trait for testability

use serde::Serialize;
use uuid::Uuid;

use crate::recording::{ArtifactId, ArtifactSummary, PreviewSource, SessionState};

/// Event names as constants for consistency
pub mod event_names {
    pub const SESSION_STATE_CHANGED: &str = "session_state_changed";
    pub const MICROPHONE_WARNING: &str = "microphone_warning";
    pub const HISTORY_UPDATED: &str = "history_updated";
    pub const ARTIFACT_READY: &str = "artifact_ready";
    pub const RECORDING_ERROR: &str = "recording_error";
}

/// Payload for session_state_changed event
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStateChangedPayload {
    /// Session the change belongs to, absent once the slot is idle again
    pub session_id: Option<Uuid>,
    pub state: SessionState,
    /// ISO 8601 timestamp of the transition
    pub timestamp: String,
}

/// Payload for microphone_warning event
///
/// Emitted at most once per session, when the microphone was requested but
/// the recording continues without it.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MicrophoneWarningPayload {
    pub message: String,
    pub timestamp: String,
}

/// Payload for history_updated event
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryUpdatedPayload {
    /// Type of mutation, currently always "insert"
    pub action: String,
    pub artifact_id: ArtifactId,
    /// Number of old entries removed to stay within capacity
    pub evicted: usize,
}

/// Payload for artifact_ready event
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactReadyPayload {
    pub artifact: ArtifactSummary,
    pub source: PreviewSource,
}

/// Payload for recording_error event
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecordingErrorPayload {
    /// Descriptive error message
    pub message: String,
}

/// Trait for emitting recorder events
/// Allows mocking in tests while a UI bridge is used in production
pub trait RecorderEventEmitter: Send + Sync {
    fn emit_session_state_changed(&self, payload: SessionStateChangedPayload);

    fn emit_microphone_warning(&self, payload: MicrophoneWarningPayload);

    fn emit_history_updated(&self, payload: HistoryUpdatedPayload);

    fn emit_artifact_ready(&self, payload: ArtifactReadyPayload);

    fn emit_recording_error(&self, payload: RecordingErrorPayload);
}

/// Log an event as JSON, warning if the payload cannot be serialized
macro_rules! emit_or_warn {
    ($event:expr, $payload:expr) => {
        match serde_json::to_string(&$payload) {
            Ok(json) => crate::info!("[event] {}: {}", $event, json),
            Err(e) => crate::warn!("Failed to emit event '{}': {}", $event, e),
        }
    };
}

/// Emitter that writes every event to the log
///
/// Used when no presentation layer is attached, e.g. headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEventEmitter;

impl RecorderEventEmitter for LoggingEventEmitter {
    fn emit_session_state_changed(&self, payload: SessionStateChangedPayload) {
        emit_or_warn!(event_names::SESSION_STATE_CHANGED, payload);
    }

    fn emit_microphone_warning(&self, payload: MicrophoneWarningPayload) {
        emit_or_warn!(event_names::MICROPHONE_WARNING, payload);
    }

    fn emit_history_updated(&self, payload: HistoryUpdatedPayload) {
        emit_or_warn!(event_names::HISTORY_UPDATED, payload);
    }

    fn emit_artifact_ready(&self, payload: ArtifactReadyPayload) {
        emit_or_warn!(event_names::ARTIFACT_READY, payload);
    }

    fn emit_recording_error(&self, payload: RecordingErrorPayload) {
        emit_or_warn!(event_names::RECORDING_ERROR, payload);
    }
}

/// Get the current timestamp in ISO 8601 format
pub fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
#[path = "events_test.rs"]
pub(crate) mod tests;
