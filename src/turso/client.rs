// Turso/libsql client wrapper
//
// Owns the embedded database and a single connection. Raw driver errors are
// mapped into `TursoError` here so callers never see libsql types.

use std::path::{Path, PathBuf};

use libsql::params::IntoParams;
use libsql::{Builder, Connection, Database, Rows};

/// Database file created inside the data directory
pub const DATABASE_FILE_NAME: &str = "history.db";

const IN_MEMORY_PATH: &str = ":memory:";

/// Errors from the database layer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TursoError {
    #[error("Failed to open database: {0}")]
    Connection(String),
    #[error("Query failed: {0}")]
    Query(String),
    #[error("Statement failed: {0}")]
    Execute(String),
    #[error("Constraint violation: {0}")]
    Constraint(String),
}

impl TursoError {
    fn from_execute(error: libsql::Error) -> Self {
        let message = error.to_string();
        if message.contains("constraint failed") {
            TursoError::Constraint(message)
        } else {
            TursoError::Execute(message)
        }
    }
}

/// Embedded libsql database with one shared connection
pub struct TursoClient {
    // Kept alive for the lifetime of the connection
    _db: Database,
    conn: Connection,
    db_path: PathBuf,
}

impl TursoClient {
    /// Open (or create) `history.db` inside `data_dir`
    pub async fn new(data_dir: PathBuf) -> Result<Self, TursoError> {
        tokio::fs::create_dir_all(&data_dir).await.map_err(|e| {
            TursoError::Connection(format!(
                "Failed to create data directory {:?}: {}",
                data_dir, e
            ))
        })?;

        let db_path = data_dir.join(DATABASE_FILE_NAME);
        Self::open(db_path).await
    }

    /// Database that lives only as long as this client
    pub async fn in_memory() -> Result<Self, TursoError> {
        Self::open(PathBuf::from(IN_MEMORY_PATH)).await
    }

    async fn open(db_path: PathBuf) -> Result<Self, TursoError> {
        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| TursoError::Connection(e.to_string()))?;
        let conn = db
            .connect()
            .map_err(|e| TursoError::Connection(e.to_string()))?;

        crate::debug!("Opened libsql database at {:?}", db_path);
        Ok(Self {
            _db: db,
            conn,
            db_path,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Execute a statement, returning the number of affected rows
    pub async fn execute(&self, sql: &str, params: impl IntoParams) -> Result<u64, TursoError> {
        self.conn
            .execute(sql, params)
            .await
            .map_err(TursoError::from_execute)
    }

    pub async fn query(&self, sql: &str, params: impl IntoParams) -> Result<Rows, TursoError> {
        self.conn
            .query(sql, params)
            .await
            .map_err(|e| TursoError::Query(e.to_string()))
    }
}
