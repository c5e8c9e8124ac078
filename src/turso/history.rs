// Recording history persistence using Turso/libsql

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{params, Row};

use super::client::{TursoClient, TursoError};
use crate::history::{HistoryBackend, PersistenceError};
use crate::recording::{format_created_at, Artifact, ArtifactId, ArtifactSummary};

impl From<TursoError> for PersistenceError {
    fn from(error: TursoError) -> Self {
        match error {
            TursoError::Connection(msg) => PersistenceError::Connection(msg),
            TursoError::Query(msg) | TursoError::Execute(msg) | TursoError::Constraint(msg) => {
                PersistenceError::Query(msg)
            }
        }
    }
}

fn column_error(e: libsql::Error) -> PersistenceError {
    PersistenceError::Corrupt(e.to_string())
}

fn parse_created_at(raw: &str) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PersistenceError::Corrupt(format!("created_at '{}': {}", raw, e)))
}

fn size_from_column(raw: i64) -> Result<u64, PersistenceError> {
    u64::try_from(raw).map_err(|_| PersistenceError::Corrupt(format!("size_bytes {}", raw)))
}

/// Columns: id, name, created_at, mime_type, size_bytes
fn summary_from_row(row: &Row) -> Result<ArtifactSummary, PersistenceError> {
    let created_at: String = row.get(2).map_err(column_error)?;
    Ok(ArtifactSummary {
        id: row.get(0).map_err(column_error)?,
        name: row.get(1).map_err(column_error)?,
        created_at: parse_created_at(&created_at)?,
        mime_type: row.get(3).map_err(column_error)?,
        size_bytes: size_from_column(row.get(4).map_err(column_error)?)?,
    })
}

#[async_trait]
impl HistoryBackend for TursoClient {
    async fn put(&self, artifact: &Artifact) -> Result<(), PersistenceError> {
        self.execute(
            r#"INSERT OR REPLACE INTO recording
               (id, name, created_at, mime_type, size_bytes, payload, seq)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6,
                       (SELECT COALESCE(MAX(seq), 0) + 1 FROM recording))"#,
            params![
                artifact.id,
                artifact.name.clone(),
                format_created_at(&artifact.created_at),
                artifact.mime_type.clone(),
                artifact.size_bytes as i64,
                artifact.payload.clone()
            ],
        )
        .await?;
        Ok(())
    }

    async fn get(&self, id: ArtifactId) -> Result<Option<Artifact>, PersistenceError> {
        let mut rows = self
            .query(
                r#"SELECT id, name, created_at, mime_type, size_bytes, payload
                   FROM recording WHERE id = ?1"#,
                params![id],
            )
            .await?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| PersistenceError::Query(e.to_string()))?
        else {
            return Ok(None);
        };

        let summary = summary_from_row(&row)?;
        let payload: Vec<u8> = row.get(5).map_err(column_error)?;
        Ok(Some(Artifact {
            id: summary.id,
            name: summary.name,
            created_at: summary.created_at,
            mime_type: summary.mime_type,
            size_bytes: summary.size_bytes,
            payload,
        }))
    }

    async fn delete(&self, ids: &[ArtifactId]) -> Result<(), PersistenceError> {
        if ids.is_empty() {
            return Ok(());
        }
        let list = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let deleted = self
            .execute(&format!("DELETE FROM recording WHERE id IN ({})", list), ())
            .await?;
        crate::debug!("Deleted {} recording(s) from history", deleted);
        Ok(())
    }

    async fn read_all_desc(&self) -> Result<Vec<ArtifactSummary>, PersistenceError> {
        let mut rows = self
            .query(
                r#"SELECT id, name, created_at, mime_type, size_bytes
                   FROM recording ORDER BY created_at DESC, seq DESC"#,
                (),
            )
            .await?;

        let mut entries = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| PersistenceError::Query(e.to_string()))?
        {
            match summary_from_row(&row) {
                Ok(summary) => entries.push(summary),
                Err(e) => crate::warn!("Skipping unreadable history row: {}", e),
            }
        }
        Ok(entries)
    }

    async fn ids_desc(&self) -> Result<Vec<ArtifactId>, PersistenceError> {
        let mut rows = self
            .query(
                "SELECT id FROM recording ORDER BY created_at DESC, seq DESC",
                (),
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| PersistenceError::Query(e.to_string()))?
        {
            let id: ArtifactId = row.get(0).map_err(column_error)?;
            ids.push(id);
        }
        Ok(ids)
    }
}

#[cfg(test)]
#[path = "history_test.rs"]
mod tests;
