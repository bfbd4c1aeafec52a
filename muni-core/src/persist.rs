use crate::error::PersistError;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Keyed JSON snapshots in a local SQLite file. Stands in for the browser's
/// local storage: each store owns one key and overwrites it on every change.
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    db_path: Arc<PathBuf>,
}

impl SnapshotStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            CREATE TABLE IF NOT EXISTS snapshots (
                key TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;

        Ok(Self {
            db_path: Arc::new(path.to_path_buf()),
        })
    }

    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), PersistError> {
        let conn = Connection::open(&*self.db_path)?;
        let body = serde_json::to_string(value)?;
        conn.execute(
            "INSERT INTO snapshots (key, body, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            params![key, body, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, PersistError> {
        let conn = Connection::open(&*self.db_path)?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM snapshots WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|b| serde_json::from_str(&b))
            .transpose()
            .map_err(PersistError::from)
    }

    pub fn clear(&self, key: &str) -> Result<(), PersistError> {
        let conn = Connection::open(&*self.db_path)?;
        conn.execute("DELETE FROM snapshots WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn temp_store(name: &str) -> SnapshotStore {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    SnapshotStore::open(format!("/tmp/muni-tests/{name}-{nanos}.db")).expect("open store")
}
