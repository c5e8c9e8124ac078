// In-memory history backend

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{HistoryBackend, PersistenceError};
use crate::recording::{Artifact, ArtifactId, ArtifactSummary};

struct StoredArtifact {
    artifact: Artifact,
    /// Insertion counter used to order equal creation times
    seq: u64,
}

/// Backend that keeps every entry in process memory
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<ArtifactId, StoredArtifact>>,
    next_seq: Mutex<u64>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl HistoryBackend for MemoryBackend {
    async fn put(&self, artifact: &Artifact) -> Result<(), PersistenceError> {
        let seq = {
            let mut next = self.next_seq.lock();
            *next += 1;
            *next
        };
        self.entries.lock().insert(
            artifact.id,
            StoredArtifact {
                artifact: artifact.clone(),
                seq,
            },
        );
        Ok(())
    }

    async fn get(&self, id: ArtifactId) -> Result<Option<Artifact>, PersistenceError> {
        Ok(self.entries.lock().get(&id).map(|s| s.artifact.clone()))
    }

    async fn delete(&self, ids: &[ArtifactId]) -> Result<(), PersistenceError> {
        let mut entries = self.entries.lock();
        for id in ids {
            entries.remove(id);
        }
        Ok(())
    }

    async fn read_all_desc(&self) -> Result<Vec<ArtifactSummary>, PersistenceError> {
        let entries = self.entries.lock();
        Ok(newest_first(&entries)
            .into_iter()
            .map(|s| s.artifact.summary())
            .collect())
    }

    async fn ids_desc(&self) -> Result<Vec<ArtifactId>, PersistenceError> {
        let entries = self.entries.lock();
        Ok(newest_first(&entries)
            .into_iter()
            .map(|s| s.artifact.id)
            .collect())
    }
}

fn newest_first(entries: &HashMap<ArtifactId, StoredArtifact>) -> Vec<&StoredArtifact> {
    let mut stored: Vec<&StoredArtifact> = entries.values().collect();
    stored.sort_by(|a, b| {
        b.artifact
            .created_at
            .cmp(&a.artifact.created_at)
            .then(b.seq.cmp(&a.seq))
    });
    stored
}
