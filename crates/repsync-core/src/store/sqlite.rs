//! SQLite-backed document store

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};
use serde_json::Value;

use super::LocalStore;
use crate::error::{Error, Result};
use crate::util::unix_millis_now;

/// `SQLite` implementation of [`LocalStore`]
///
/// Documents live in a single `(collection, id, body)` table; ids are UUID v7
/// strings, so the primary-key order doubles as insertion order.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a store at the given path, creating the file and schema if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an in-memory store (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        let version = schema_version(&conn)?;
        if version < 1 {
            migrate_v1(&conn)?;
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Store("store mutex poisoned".to_string()))
    }
}

impl LocalStore for SqliteStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT body FROM documents WHERE collection = ? AND id = ?",
            params![collection, id],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(body) => Ok(Some(serde_json::from_str(&body)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, collection: &str, id: &str, value: &Value) -> Result<()> {
        let body = serde_json::to_string(value)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO documents (collection, id, body) VALUES (?, ?, ?)",
            params![collection, id, body],
        )?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM documents WHERE collection = ? AND id = ?",
            params![collection, id],
        )?;
        Ok(())
    }

    async fn get_all(&self, collection: &str) -> Result<Vec<Value>> {
        let bodies = {
            let conn = self.lock()?;
            let mut stmt = conn
                .prepare("SELECT body FROM documents WHERE collection = ? ORDER BY id")?;
            let rows = stmt
                .query_map(params![collection], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            rows
        };

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(Error::from))
            .collect()
    }
}

/// Get the current schema version
fn schema_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get::<_, i32>(0).map(|v| v != 0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
             version INTEGER PRIMARY KEY,
             applied_at INTEGER NOT NULL
         );
         CREATE TABLE IF NOT EXISTS documents (
             collection TEXT NOT NULL,
             id TEXT NOT NULL,
             body TEXT NOT NULL,
             PRIMARY KEY (collection, id)
         );",
    )?;
    conn.execute(
        "INSERT INTO schema_version (version, applied_at) VALUES (?, ?)",
        params![1, unix_millis_now()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalStore;
    use serde_json::json;

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();

        store
            .put("workouts", "w1", &json!({"id": "w1", "name": "Push"}))
            .await
            .unwrap();
        let fetched = store.get("workouts", "w1").await.unwrap().unwrap();
        assert_eq!(fetched["name"], "Push");

        store.delete("workouts", "w1").await.unwrap();
        assert!(store.get("workouts", "w1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_overwrites_existing_document() {
        let store = SqliteStore::open_in_memory().unwrap();

        store.put("settings", "s1", &json!({"id": "s1", "units": "kg"})).await.unwrap();
        store.put("settings", "s1", &json!({"id": "s1", "units": "lb"})).await.unwrap();

        let fetched = store.get("settings", "s1").await.unwrap().unwrap();
        assert_eq!(fetched["units"], "lb");
        assert_eq!(store.get_all("settings").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_all_orders_by_id_and_scopes_by_collection() {
        let store = SqliteStore::open_in_memory().unwrap();

        store.put("workouts", "b", &json!({"id": "b"})).await.unwrap();
        store.put("workouts", "a", &json!({"id": "a"})).await.unwrap();
        store.put("exercises", "c", &json!({"id": "c"})).await.unwrap();

        let workouts = store.get_all("workouts").await.unwrap();
        assert_eq!(workouts.len(), 2);
        assert_eq!(workouts[0]["id"], "a");
        assert_eq!(workouts[1]["id"], "b");
    }

    #[tokio::test]
    async fn deleting_absent_document_is_not_an_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.delete("workouts", "missing").await.unwrap();
    }

    #[tokio::test]
    async fn documents_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repsync.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .put("profiles", "p1", &json!({"id": "p1", "name": "Alex"}))
                .await
                .unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        let fetched = reopened.get("profiles", "p1").await.unwrap().unwrap();
        assert_eq!(fetched["name"], "Alex");
    }
}
