//! Recorder setup and initialization.
//!
//! Opens the history database and wires the session manager to the platform
//! capture and encoder implementations supplied by the host.

use std::sync::Arc;

use crate::capture::CapturePlatform;
use crate::config::{HistoryConfig, RecorderConfig};
use crate::events::RecorderEventEmitter;
use crate::history::HistoryStore;
use crate::recording::{EncoderFactory, SessionManager};
use crate::turso;

/// Main setup function.
///
/// Never fails: without a usable history database the recorder still works,
/// it just keeps no history across sessions.
pub async fn setup(
    config: RecorderConfig,
    platform: Arc<dyn CapturePlatform>,
    encoders: Arc<dyn EncoderFactory>,
    emitter: Arc<dyn RecorderEventEmitter>,
) -> Arc<SessionManager> {
    crate::info!("Setting up recorder...");

    let history = open_history_store(&config.history).await;
    let manager = SessionManager::new(platform, encoders, history, emitter, config);

    match manager.selected_format() {
        Some(format) => crate::info!("Setup complete! Recording as {}", format),
        None => crate::warn!("Setup complete, but no supported recording format was found"),
    }
    Arc::new(manager)
}

/// Open the libsql-backed history store.
///
/// Falls back to an unavailable store, logging why, when the database
/// cannot be opened or initialized.
pub async fn open_history_store(config: &HistoryConfig) -> HistoryStore {
    let Some(data_dir) = config.resolved_dir() else {
        crate::warn!("No data directory available, recording history disabled");
        return HistoryStore::unavailable();
    };

    let client = match turso::TursoClient::new(data_dir).await {
        Ok(client) => client,
        Err(e) => {
            crate::warn!("Failed to open history database, history disabled: {}", e);
            return HistoryStore::unavailable();
        }
    };
    crate::info!("History database initialized at: {:?}", client.db_path());

    if let Err(e) = turso::initialize_schema(&client).await {
        crate::error!("Failed to initialize history schema: {}", e);
        return HistoryStore::unavailable();
    }
    crate::debug!("History database schema initialized");

    HistoryStore::new(Arc::new(client), config.effective_capacity())
}

#[cfg(test)]
#[path = "setup_test.rs"]
mod tests;
