#![forbid(unsafe_code)]

mod error;
mod info;
mod jobs;

pub use error::StoreError;
pub use info::{InfoStorage, LEGACY_PAYLOAD_KEY, LEGACY_PROGRESS_KEY};

use rusqlite::{Connection, Transaction};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join("sidelog.db");
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;

        install_schema(&conn)?;

        Ok(Self { conn, storage_dir })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Hands out the transaction every info-store operation runs inside.
    /// Committing or dropping (rollback) it is the caller's decision; the
    /// store performs neither on the caller's behalf.
    pub fn transaction(&mut self) -> Result<Transaction<'_>, StoreError> {
        Ok(self.conn.transaction()?)
    }
}

fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        PRAGMA foreign_keys=ON;

        CREATE TABLE IF NOT EXISTS jobs (
          id INTEGER PRIMARY KEY,
          claim_session BLOB,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS job_info (
          job_id INTEGER NOT NULL,
          info_key BLOB NOT NULL,
          written INTEGER NOT NULL,
          value BLOB NOT NULL,
          PRIMARY KEY (job_id, info_key, written),
          FOREIGN KEY (job_id) REFERENCES jobs(id) ON DELETE CASCADE
        );
        "#,
    )?;
    Ok(())
}

fn now_ms() -> i64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    now.as_millis() as i64
}
