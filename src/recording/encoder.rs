// Encoder abstraction
//
// The platform encoder reports through callbacks. `EncoderSink` turns those
// callbacks into session events so a single task owns the session state.

use std::time::Duration;

use tokio::sync::mpsc;

use super::session::SessionEvent;
use crate::capture::MediaStream;

/// Parameters fixed for the lifetime of one encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub mime_type: String,
    pub video_bits_per_second: u32,
}

/// Errors raised while constructing or starting an encoder
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncoderError {
    #[error("Encoder does not support {0}")]
    Unsupported(String),
    #[error("Failed to construct encoder: {0}")]
    Construction(String),
    #[error("Failed to start encoder: {0}")]
    Start(String),
}

/// A running platform encoder
pub trait MediaEncoder: Send {
    /// Begin encoding, emitting a segment roughly every `timeslice`
    fn start(&mut self, timeslice: Duration) -> Result<(), EncoderError>;

    /// Request a stop. The encoder delivers its final segment and then
    /// reports `stopped` through its sink. Calling stop twice is harmless.
    fn stop(&mut self);

    fn is_active(&self) -> bool;
}

/// Creates encoders and answers format support queries
pub trait EncoderFactory: Send + Sync {
    fn is_type_supported(&self, mime_type: &str) -> bool;

    fn create(
        &self,
        stream: &MediaStream,
        config: &EncoderConfig,
        sink: EncoderSink,
    ) -> Result<Box<dyn MediaEncoder>, EncoderError>;
}

/// Callback target handed to an encoder
#[derive(Debug, Clone)]
pub struct EncoderSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EncoderSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { tx }
    }

    /// A segment of encoded data is ready. Empty segments are dropped.
    pub fn data_available(&self, data: Vec<u8>) {
        if data.is_empty() {
            return;
        }
        self.send(SessionEvent::SegmentAvailable(data));
    }

    /// The encoder has delivered its last segment
    pub fn stopped(&self) {
        self.send(SessionEvent::EncoderStopped);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(SessionEvent::EncoderError(message.into()));
    }

    fn send(&self, event: SessionEvent) {
        // The session task is gone once it reached a terminal state
        if self.tx.send(event).is_err() {
            crate::trace!("Encoder event dropped, session already finished");
        }
    }
}

#[cfg(test)]
#[path = "encoder_test.rs"]
pub(crate) mod tests;
