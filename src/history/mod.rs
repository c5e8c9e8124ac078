// History store: a capacity-bounded, most-recent-first collection of
// finalized recordings kept across sessions.
//
// The store itself holds no data. It enforces ordering and capacity over a
// `HistoryBackend`, which is the persistence boundary.

use std::sync::Arc;

use async_trait::async_trait;

use crate::recording::{Artifact, ArtifactId, ArtifactSummary};

mod memory;
pub use memory::MemoryBackend;

/// Errors from the persistence layer. Never fatal to a recording.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistenceError {
    #[error("History storage is not available")]
    Unavailable,
    #[error("Failed to connect to history storage: {0}")]
    Connection(String),
    #[error("History query failed: {0}")]
    Query(String),
    #[error("Corrupt history entry: {0}")]
    Corrupt(String),
}

/// Keyed storage with a creation-time index
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Insert or overwrite the entry keyed by `artifact.id`
    async fn put(&self, artifact: &Artifact) -> Result<(), PersistenceError>;

    /// Full entry including the payload
    async fn get(&self, id: ArtifactId) -> Result<Option<Artifact>, PersistenceError>;

    async fn delete(&self, ids: &[ArtifactId]) -> Result<(), PersistenceError>;

    /// Metadata for every readable entry, newest first. Entries with equal
    /// creation times are ordered by later insertion first.
    async fn read_all_desc(&self) -> Result<Vec<ArtifactSummary>, PersistenceError>;

    /// Keys of every entry in `read_all_desc` order, including entries whose
    /// metadata can no longer be decoded
    async fn ids_desc(&self) -> Result<Vec<ArtifactId>, PersistenceError>;
}

/// Bounded history over a persistence backend
#[derive(Clone)]
pub struct HistoryStore {
    backend: Option<Arc<dyn HistoryBackend>>,
    capacity: usize,
}

impl HistoryStore {
    /// Capacity below 1 is raised to 1
    pub fn new(backend: Arc<dyn HistoryBackend>, capacity: usize) -> Self {
        Self {
            backend: Some(backend),
            capacity: capacity.max(1),
        }
    }

    /// Store for an environment without persistence. Every operation fails
    /// with `PersistenceError::Unavailable`.
    pub fn unavailable() -> Self {
        Self {
            backend: None,
            capacity: 0,
        }
    }

    /// Ephemeral store backed by memory
    pub fn in_memory(capacity: usize) -> Self {
        Self::new(Arc::new(MemoryBackend::new()), capacity)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    fn backend(&self) -> Result<&Arc<dyn HistoryBackend>, PersistenceError> {
        self.backend.as_ref().ok_or(PersistenceError::Unavailable)
    }

    /// Add or overwrite an artifact, then trim to capacity.
    ///
    /// Returns the number of entries evicted.
    pub async fn insert(&self, artifact: &Artifact) -> Result<usize, PersistenceError> {
        self.backend()?.put(artifact).await?;
        crate::debug!(
            "History insert: {} ({} bytes)",
            artifact.name,
            artifact.size_bytes
        );
        self.evict_excess().await
    }

    /// Delete every entry beyond the `capacity` most recent.
    ///
    /// A no-op when the store is already within capacity.
    pub async fn evict_excess(&self) -> Result<usize, PersistenceError> {
        let backend = self.backend()?;
        let ids = backend.ids_desc().await?;
        if ids.len() <= self.capacity {
            return Ok(0);
        }

        let excess = &ids[self.capacity..];
        backend.delete(excess).await?;
        crate::info!(
            "History trimmed to {} entries ({} evicted)",
            self.capacity,
            excess.len()
        );
        Ok(excess.len())
    }

    /// Most recent entries first, without payloads
    pub async fn list(&self, limit: usize) -> Result<Vec<ArtifactSummary>, PersistenceError> {
        let mut entries = self.backend()?.read_all_desc().await?;
        entries.truncate(limit);
        Ok(entries)
    }

    pub async fn get_by_id(&self, id: ArtifactId) -> Result<Option<Artifact>, PersistenceError> {
        self.backend()?.get(id).await
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
