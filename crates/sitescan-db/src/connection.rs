//! `SQLite` connection pool setup.

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;

const MAX_CONNECTIONS: u32 = 5;

/// Open (creating if missing) the database at `path`, or `:memory:`.
pub async fn connect(path: impl AsRef<Path>) -> Result<Pool<Sqlite>> {
    let path_str = path.as_ref().to_str().ok_or_else(|| {
        DatabaseError::Open("invalid database path: not valid UTF-8".to_string())
    })?;

    let mut options = SqliteConnectOptions::from_str(path_str)
        .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
        .foreign_keys(true)
        .create_if_missing(true);
    if path_str != ":memory:" {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
        .map_err(|e| DatabaseError::Open(format!("{path_str}: {e}")))?;

    tracing::info!("Database pool created at {}", path_str);
    Ok(pool)
}
