//! SQLite persistence: connection defaults, schema management, the
//! realtime writer, and ground-truth upserts.

pub mod arrivals;
pub mod schema;
pub mod writer;

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use sqlx::{ConnectOptions, SqliteConnection};
use thiserror::Error;

pub use writer::{PredictionRecord, RealtimeStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Connection defaults for concurrent read/write: WAL keeps readers off
/// the writer's back, the busy timeout rides out brief locks.
pub fn connect_options(db_path: &Path, busy_timeout: Duration) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(busy_timeout)
}

/// Open a connection, creating the parent directory if needed.
pub async fn connect(db_path: &Path, busy_timeout: Duration) -> Result<SqliteConnection, StoreError> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = connect_options(db_path, busy_timeout).connect().await?;
    Ok(conn)
}
