// Recording module: session state machine, encoder boundary, artifacts and the
// manager that owns the single active session

mod artifact;
pub use artifact::{
    derive_file_name, format_bytes, format_created_at, Artifact, ArtifactId,
    ArtifactIdGenerator, ArtifactSummary, PreviewSource,
};

pub(crate) mod encoder;
pub use encoder::{EncoderConfig, EncoderError, EncoderFactory, EncoderSink, MediaEncoder};

mod manager;
pub use manager::{Preview, SessionError, SessionManager};

mod session;
pub use session::{RecordingSession, SessionEvent, SessionOutcome, FINALIZE_TIMEOUT};

mod state;
pub use state::{SessionState, SessionStateError, SessionStateMachine};
