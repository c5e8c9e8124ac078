use super::*;
use chrono::TimeZone;
use std::sync::{Arc, Mutex};

/// Mock emitter that records all emitted events for testing
#[derive(Default)]
pub struct MockEventEmitter {
    pub state_events: Arc<Mutex<Vec<SessionStateChangedPayload>>>,
    pub microphone_warnings: Arc<Mutex<Vec<MicrophoneWarningPayload>>>,
    pub history_events: Arc<Mutex<Vec<HistoryUpdatedPayload>>>,
    pub artifact_events: Arc<Mutex<Vec<ArtifactReadyPayload>>>,
    pub error_events: Arc<Mutex<Vec<RecordingErrorPayload>>>,
}

impl MockEventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// States in emission order
    pub fn states(&self) -> Vec<SessionState> {
        self.state_events
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.state)
            .collect()
    }

    pub fn warning_count(&self) -> usize {
        self.microphone_warnings.lock().unwrap().len()
    }
}

impl RecorderEventEmitter for MockEventEmitter {
    fn emit_session_state_changed(&self, payload: SessionStateChangedPayload) {
        self.state_events.lock().unwrap().push(payload);
    }

    fn emit_microphone_warning(&self, payload: MicrophoneWarningPayload) {
        self.microphone_warnings.lock().unwrap().push(payload);
    }

    fn emit_history_updated(&self, payload: HistoryUpdatedPayload) {
        self.history_events.lock().unwrap().push(payload);
    }

    fn emit_artifact_ready(&self, payload: ArtifactReadyPayload) {
        self.artifact_events.lock().unwrap().push(payload);
    }

    fn emit_recording_error(&self, payload: RecordingErrorPayload) {
        self.error_events.lock().unwrap().push(payload);
    }
}

#[test]
fn test_state_changed_payload_serialization() {
    let id = Uuid::nil();
    let payload = SessionStateChangedPayload {
        session_id: Some(id),
        state: SessionState::Recording,
        timestamp: "2024-01-05T14:30:12Z".to_string(),
    };
    let json = serde_json::to_value(&payload).unwrap();
    assert_eq!(json["sessionId"], id.to_string());
    assert_eq!(json["state"], "Recording");
    assert_eq!(json["timestamp"], "2024-01-05T14:30:12Z");
}

#[test]
fn test_history_updated_payload_uses_camel_case() {
    let payload = HistoryUpdatedPayload {
        action: "insert".to_string(),
        artifact_id: 1704465012000,
        evicted: 1,
    };
    let json = serde_json::to_string(&payload).unwrap();
    assert!(json.contains("\"artifactId\":1704465012000"));
    assert!(json.contains("\"evicted\":1"));
}

#[test]
fn test_artifact_ready_payload_carries_source() {
    let payload = ArtifactReadyPayload {
        artifact: ArtifactSummary {
            id: 7,
            name: "REC_SR1_20240105_143012.webm".to_string(),
            created_at: chrono::Utc.with_ymd_and_hms(2024, 1, 5, 14, 30, 12).unwrap(),
            mime_type: "video/webm".to_string(),
            size_bytes: 1200,
        },
        source: PreviewSource::Recording,
    };
    let json = serde_json::to_value(&payload).unwrap();
    assert_eq!(json["source"], "recording");
    assert_eq!(json["artifact"]["sizeBytes"], 1200);
}

#[test]
fn test_mock_emitter_records_events() {
    let emitter = MockEventEmitter::new();
    emitter.emit_session_state_changed(SessionStateChangedPayload {
        session_id: None,
        state: SessionState::Idle,
        timestamp: current_timestamp(),
    });
    emitter.emit_microphone_warning(MicrophoneWarningPayload {
        message: "denied".to_string(),
        timestamp: current_timestamp(),
    });

    assert_eq!(emitter.states(), vec![SessionState::Idle]);
    assert_eq!(emitter.warning_count(), 1);
}

#[test]
fn test_logging_emitter_accepts_all_events() {
    let emitter = LoggingEventEmitter;
    emitter.emit_recording_error(RecordingErrorPayload {
        message: "boom".to_string(),
    });
    emitter.emit_history_updated(HistoryUpdatedPayload {
        action: "insert".to_string(),
        artifact_id: 1,
        evicted: 0,
    });
}

#[test]
fn test_current_timestamp_is_rfc3339() {
    let ts = current_timestamp();
    assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
}
