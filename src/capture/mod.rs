// Capture boundary: media tracks, streams and the platform capture API
//
// The platform (browser, desktop shell, test double) implements
// `CapturePlatform`; the core never talks to capture hardware directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::{DisplayConstraints, MicrophoneConstraints};

mod mixer;
pub use mixer::{compose, AudioMixer, CaptureStream, MixingGraph};

mod resolver;
pub use resolver::{Acquisition, CaptureSourceResolver};

/// What the user asked to capture alongside the screen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOptions {
    pub want_microphone: bool,
    pub want_system_audio: bool,
}

/// Kind of a media track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

/// Where an audio track came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioOrigin {
    Microphone,
    System,
}

/// A single live media track owned by the platform.
///
/// `stop` must be idempotent. `on_ended` registers a one-shot observer that
/// fires when the platform terminates the track on its own (for example the
/// user pressing the native "stop sharing" control); stopping the track
/// through `stop` does not fire it.
pub trait MediaTrack: Send + Sync {
    fn id(&self) -> &str;
    fn kind(&self) -> TrackKind;
    fn stop(&self);
    fn on_ended(&self, callback: Box<dyn FnOnce() + Send + 'static>);
}

impl fmt::Debug for dyn MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.kind(), self.id())
    }
}

/// Shared handle to a platform track
pub type TrackRef = Arc<dyn MediaTrack>;

/// An ordered set of tracks
#[derive(Debug, Clone, Default)]
pub struct MediaStream {
    tracks: Vec<TrackRef>,
}

impl MediaStream {
    pub fn new(tracks: Vec<TrackRef>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[TrackRef] {
        &self.tracks
    }

    pub fn video_tracks(&self) -> Vec<TrackRef> {
        self.tracks_of(TrackKind::Video)
    }

    pub fn audio_tracks(&self) -> Vec<TrackRef> {
        self.tracks_of(TrackKind::Audio)
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Stop every track in the stream
    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    fn tracks_of(&self, kind: TrackKind) -> Vec<TrackRef> {
        self.tracks
            .iter()
            .filter(|t| t.kind() == kind)
            .cloned()
            .collect()
    }
}

/// An audio track tagged with its origin
#[derive(Debug, Clone)]
pub struct TaggedTrack {
    pub origin: AudioOrigin,
    pub track: TrackRef,
}

/// Raw tracks obtained from screen and microphone acquisition, before mixing
#[derive(Debug)]
pub struct CaptureBundle {
    /// Stream returned by display capture (video plus any system audio)
    pub display: MediaStream,
    /// Stream returned by microphone capture, when it succeeded
    pub microphone: Option<MediaStream>,
    /// Primary video track
    pub video: TrackRef,
    /// Audio tracks from all sources, tagged by origin
    pub audio: Vec<TaggedTrack>,
}

impl CaptureBundle {
    pub fn has_microphone(&self) -> bool {
        self.microphone.is_some()
    }

    pub fn has_system_audio(&self) -> bool {
        self.audio.iter().any(|t| t.origin == AudioOrigin::System)
    }

    /// Stop every raw track in the bundle
    pub fn stop_all(&self) {
        self.display.stop_all();
        if let Some(mic) = &self.microphone {
            mic.stop_all();
        }
    }
}

/// Screen capture request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayMediaRequest {
    pub video: DisplayConstraints,
    pub audio: bool,
}

/// Microphone capture request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMediaRequest {
    pub audio: MicrophoneConstraints,
}

/// Fatal screen-capture failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// User or policy denied the screen-share prompt
    #[error("Screen capture permission denied")]
    Denied,
    /// User dismissed the screen-share prompt
    #[error("Screen capture cancelled by user")]
    Cancelled,
    /// Platform granted a stream without any video
    #[error("Screen capture returned no video track")]
    NoVideoTrack,
    /// Any other platform failure
    #[error("Screen capture failed: {0}")]
    Platform(String),
}

/// Non-fatal microphone failures; recording continues without the mic
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MicrophoneError {
    #[error("Microphone permission denied")]
    Denied,
    #[error("Microphone unavailable: {0}")]
    Unavailable(String),
    /// The audio mixing graph could not be built
    #[error("Audio mixing failed: {0}")]
    Mixing(String),
}

/// Audio processing graph mixing several sources into one destination
pub trait AudioGraph: Send {
    /// Create a source node for the stream's audio and connect it to the destination
    fn connect_source(&mut self, stream: &MediaStream) -> Result<(), MicrophoneError>;
    /// Tracks carried by the mixing destination
    fn output_tracks(&self) -> Vec<TrackRef>;
    /// Tear down source nodes and the processing context
    fn close(&mut self);
}

/// Host capture capabilities
#[async_trait]
pub trait CapturePlatform: Send + Sync {
    /// Ask the user to share a screen; may grant zero audio tracks even if asked
    async fn get_display_media(
        &self,
        request: &DisplayMediaRequest,
    ) -> Result<MediaStream, CaptureError>;

    /// Acquire the microphone
    async fn get_user_media(&self, request: &UserMediaRequest)
        -> Result<MediaStream, MicrophoneError>;

    /// Create a fresh audio processing context
    fn create_audio_graph(&self) -> Result<Box<dyn AudioGraph>, MicrophoneError>;
}

#[cfg(test)]
#[path = "mod_test.rs"]
pub(crate) mod tests;
