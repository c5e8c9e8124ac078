// Database schema definitions
//
// This module defines the SQLite schema for the recording history and
// records its version in `schema_version`.

use super::client::{TursoClient, TursoError};

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// SQL statements to create all tables (each as a separate string)
const CREATE_TABLES: &[&str] = &[
    // Finalized recordings, payload included
    r#"CREATE TABLE IF NOT EXISTS recording (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL,
        mime_type TEXT NOT NULL,
        size_bytes INTEGER NOT NULL,
        payload BLOB NOT NULL,
        seq INTEGER NOT NULL
    )"#,
    // Listing and eviction walk recordings by creation time
    r#"CREATE INDEX IF NOT EXISTS idx_recording_created_at ON recording(created_at)"#,
];

/// Initialize the database schema.
///
/// Creates all tables on a fresh database and stamps the schema version.
/// Call once after the TursoClient is created.
pub async fn initialize_schema(client: &TursoClient) -> Result<(), TursoError> {
    // First, ensure schema_version table exists (needed for version checking)
    client
        .execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
            (),
        )
        .await?;

    let current_version = get_schema_version(client).await?;

    if current_version == 0 {
        crate::info!("Initializing history database schema (version {})", SCHEMA_VERSION);

        for statement in CREATE_TABLES {
            client.execute(statement, ()).await?;
        }

        set_schema_version(client, SCHEMA_VERSION).await?;

        crate::info!("History database schema initialized successfully");
    } else if current_version > SCHEMA_VERSION {
        crate::warn!(
            "History database has schema version {}, newer than supported version {}",
            current_version,
            SCHEMA_VERSION
        );
    } else {
        crate::debug!("History database schema is up to date (version {})", current_version);
    }

    Ok(())
}

/// Current schema version, 0 for a fresh database
pub async fn get_schema_version(client: &TursoClient) -> Result<i32, TursoError> {
    let mut rows = client
        .query("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1", ())
        .await?;

    match rows.next().await.map_err(|e| TursoError::Query(e.to_string()))? {
        Some(row) => {
            let version: i32 = row.get(0).map_err(|e| TursoError::Query(e.to_string()))?;
            Ok(version)
        }
        None => Ok(0),
    }
}

async fn set_schema_version(client: &TursoClient, version: i32) -> Result<(), TursoError> {
    client
        .execute(
            "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
            libsql::params![version],
        )
        .await?;
    Ok(())
}

#[cfg(test)]
#[path = "schema_test.rs"]
mod tests;
