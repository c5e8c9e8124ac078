// Capture source resolver
//
// Negotiates the screen stream and, optionally, the microphone. A failing
// microphone degrades the capture instead of aborting it.

use std::sync::Arc;

use super::{
    AudioOrigin, CaptureBundle, CaptureError, CaptureOptions, CapturePlatform,
    DisplayMediaRequest, MicrophoneError, TaggedTrack, UserMediaRequest,
};
use crate::config::{DisplayConstraints, MicrophoneConstraints};

/// Result of a successful acquisition
#[derive(Debug)]
pub struct Acquisition {
    pub bundle: CaptureBundle,
    /// Set when the microphone was requested but could not be acquired
    pub microphone_error: Option<MicrophoneError>,
}

/// Negotiates capture streams with the platform
pub struct CaptureSourceResolver {
    platform: Arc<dyn CapturePlatform>,
    display: DisplayConstraints,
    microphone: MicrophoneConstraints,
}

impl CaptureSourceResolver {
    pub fn new(
        platform: Arc<dyn CapturePlatform>,
        display: DisplayConstraints,
        microphone: MicrophoneConstraints,
    ) -> Self {
        Self {
            platform,
            display,
            microphone,
        }
    }

    /// Acquire the screen (and optionally the microphone).
    ///
    /// `on_source_ended` is registered on the primary video track and fires
    /// when the platform ends sharing out-of-band.
    ///
    /// # Errors
    /// Returns `CaptureError` when the screen stream itself cannot be obtained.
    /// Microphone failures are reported through `Acquisition::microphone_error`.
    pub async fn acquire<F>(
        &self,
        options: CaptureOptions,
        on_source_ended: F,
    ) -> Result<Acquisition, CaptureError>
    where
        F: FnOnce() + Send + 'static,
    {
        let request = DisplayMediaRequest {
            video: self.display.clone(),
            audio: options.want_system_audio,
        };
        crate::debug!("Requesting display media: {:?}", request);

        let display = self.platform.get_display_media(&request).await?;

        let Some(video) = display.video_tracks().into_iter().next() else {
            crate::error!("Display capture granted without a video track");
            display.stop_all();
            return Err(CaptureError::NoVideoTrack);
        };
        video.on_ended(Box::new(on_source_ended));

        // The platform may ignore the audio flag; trust the tracks, not the request
        let mut audio: Vec<TaggedTrack> = display
            .audio_tracks()
            .into_iter()
            .map(|track| TaggedTrack {
                origin: AudioOrigin::System,
                track,
            })
            .collect();
        if options.want_system_audio && audio.is_empty() {
            crate::debug!("System audio requested but the platform granted none");
        }

        let mut microphone = None;
        let mut microphone_error = None;
        if options.want_microphone {
            let request = UserMediaRequest {
                audio: self.microphone.clone(),
            };
            match self.platform.get_user_media(&request).await {
                Ok(stream) => {
                    audio.extend(stream.audio_tracks().into_iter().map(|track| TaggedTrack {
                        origin: AudioOrigin::Microphone,
                        track,
                    }));
                    microphone = Some(stream);
                }
                Err(e) => {
                    crate::warn!("Microphone acquisition failed, continuing without it: {}", e);
                    microphone_error = Some(e);
                }
            }
        }

        crate::info!(
            "Capture acquired: video={}, audio tracks={}, microphone={}",
            video.id(),
            audio.len(),
            microphone.is_some()
        );

        Ok(Acquisition {
            bundle: CaptureBundle {
                display,
                microphone,
                video,
                audio,
            },
            microphone_error,
        })
    }
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod tests;
