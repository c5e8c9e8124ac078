// Audio mixing and final stream composition

use std::sync::Arc;

use super::{AudioGraph, CaptureBundle, CapturePlatform, MediaStream, MicrophoneError, TrackRef};

/// Owned audio processing graph. Closing stops the destination's tracks,
/// is idempotent and also happens on drop.
pub struct MixingGraph {
    graph: Option<Box<dyn AudioGraph>>,
}

impl MixingGraph {
    fn new(graph: Box<dyn AudioGraph>) -> Self {
        Self { graph: Some(graph) }
    }

    pub fn close(&mut self) {
        if let Some(mut graph) = self.graph.take() {
            for track in graph.output_tracks() {
                track.stop();
            }
            graph.close();
            crate::debug!("Audio mixing graph closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.graph.is_none()
    }
}

impl Drop for MixingGraph {
    fn drop(&mut self) {
        self.close();
    }
}

/// Mixes every available audio source into a single track
pub struct AudioMixer {
    platform: Arc<dyn CapturePlatform>,
}

impl AudioMixer {
    pub fn new(platform: Arc<dyn CapturePlatform>) -> Self {
        Self { platform }
    }

    /// Build the mixing graph for a bundle with a microphone.
    ///
    /// Returns the composed stream (video tracks plus the mixed track) and the
    /// graph that must live as long as the recording.
    pub fn mix(&self, bundle: &CaptureBundle) -> Result<(MediaStream, MixingGraph), MicrophoneError> {
        let Some(microphone) = &bundle.microphone else {
            return Err(MicrophoneError::Mixing(
                "no microphone stream to mix".to_string(),
            ));
        };

        let mut graph = MixingGraph::new(self.platform.create_audio_graph()?);
        if let Some(inner) = graph.graph.as_mut() {
            inner.connect_source(microphone)?;
            // Display audio may be absent even if requested
            if bundle.has_system_audio() {
                inner.connect_source(&bundle.display)?;
            }
        }

        let mixed: Vec<TrackRef> = graph
            .graph
            .as_ref()
            .map(|g| g.output_tracks())
            .unwrap_or_default();
        if mixed.is_empty() {
            return Err(MicrophoneError::Mixing(
                "mixing destination produced no audio track".to_string(),
            ));
        }

        let mut tracks = bundle.display.video_tracks();
        tracks.extend(mixed);
        crate::debug!(
            "Mixed {} audio source(s) into one track",
            if bundle.has_system_audio() { 2 } else { 1 }
        );
        Ok((MediaStream::new(tracks), graph))
    }
}

/// The stream handed to the encoder plus every resource that must be released
/// when recording ends.
pub struct CaptureStream {
    stream: MediaStream,
    owned: Vec<TrackRef>,
    graph: Option<MixingGraph>,
    released: bool,
}

impl CaptureStream {
    pub fn stream(&self) -> &MediaStream {
        &self.stream
    }

    pub fn is_mixed(&self) -> bool {
        self.graph.is_some()
    }

    /// Stop every underlying track and close the mixing graph. Idempotent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        for track in self.owned.iter().chain(self.stream.tracks()) {
            track.stop();
        }
        if let Some(graph) = self.graph.as_mut() {
            graph.close();
        }
        crate::debug!("Capture stream released ({} tracks)", self.owned.len());
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        self.release();
    }
}

/// Turn an acquired bundle into the stream to record.
///
/// Mixing only happens when the microphone was acquired. If mixing fails the
/// microphone is dropped and the display stream is used as is; the error is
/// returned alongside so it can be surfaced as a warning.
pub fn compose(bundle: CaptureBundle, mixer: &AudioMixer) -> (CaptureStream, Option<MicrophoneError>) {
    let mut owned: Vec<TrackRef> = bundle.display.tracks().to_vec();

    if bundle.has_microphone() {
        match mixer.mix(&bundle) {
            Ok((stream, graph)) => {
                if let Some(mic) = &bundle.microphone {
                    owned.extend(mic.tracks().iter().cloned());
                }
                return (
                    CaptureStream {
                        stream,
                        owned,
                        graph: Some(graph),
                        released: false,
                    },
                    None,
                );
            }
            Err(e) => {
                crate::warn!("Audio mixing unavailable, recording without microphone: {}", e);
                if let Some(mic) = &bundle.microphone {
                    mic.stop_all();
                }
                return (
                    CaptureStream {
                        stream: bundle.display.clone(),
                        owned,
                        graph: None,
                        released: false,
                    },
                    Some(e),
                );
            }
        }
    }

    (
        CaptureStream {
            stream: bundle.display.clone(),
            owned,
            graph: None,
            released: false,
        },
        None,
    )
}

#[cfg(test)]
#[path = "mixer_test.rs"]
mod tests;
