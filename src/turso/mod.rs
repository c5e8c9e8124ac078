// Turso/libsql persistence for the recording history

mod client;
pub use client::{TursoClient, TursoError, DATABASE_FILE_NAME};

mod history;

mod schema;
pub use schema::{get_schema_version, initialize_schema};
