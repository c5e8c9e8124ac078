// Screen recording session core: capture negotiation, audio mixing, encoder
// orchestration and a capacity-bounded recording history.

// Enable coverage attribute on nightly for explicit exclusions
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod app;
pub mod capture;
pub mod config;
pub mod download;
pub mod events;
pub mod format;
pub mod history;
pub mod recording;
pub mod turso;

pub use app::setup::{open_history_store, setup};
pub use capture::{CaptureOptions, CapturePlatform};
pub use config::RecorderConfig;
pub use events::{LoggingEventEmitter, RecorderEventEmitter};
pub use history::HistoryStore;
pub use recording::{Artifact, ArtifactSummary, SessionManager, SessionOutcome, SessionState};

// Re-export log macros for use throughout the crate
pub use log::{debug, error, info, trace, warn};

/// Install the process-wide logger.
///
/// Reads `RUST_LOG` when set; otherwise logs at Debug in debug builds and
/// Info in release builds. Safe to call more than once.
#[cfg_attr(coverage_nightly, coverage(off))]
pub fn init_logging() {
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let result = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();

    if result.is_ok() {
        info!("Logging initialised at {}", level);
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
