//! SQLite-backed document store
//!
//! Documents live in a single table keyed by id, with the JSON body stored
//! as text. Bulk operations run inside one transaction each.

use super::{Document, DocumentStore, ScanPage, StoreError};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Persistent store in a single SQLite file
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "Opened SQLite document store");
        Self::from_connection(conn)
    }

    /// Fresh private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.db
            .lock()
            .map_err(|e| StoreError::Backend(format!("Failed to acquire database lock: {}", e)))
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY NOT NULL,
            body TEXT NOT NULL
        )
        "#,
        [],
    )?;
    Ok(())
}

fn select_ids(
    conn: &Connection,
    start: &str,
    end: &str,
    limit: usize,
) -> Result<Vec<String>, StoreError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare_cached(
        "SELECT id FROM documents WHERE id >= ?1 AND id <= ?2 ORDER BY id LIMIT ?3",
    )?;
    let ids = stmt
        .query_map(params![start, end, limit], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn decode_body(id: &str, body: &str) -> Result<Map<String, Value>, StoreError> {
    match serde_json::from_str::<Value>(body)? {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::Corrupt {
            id: id.to_string(),
            reason: format!("expected a JSON object, found {}", other),
        }),
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get(&self, id: &str) -> Result<Document, StoreError> {
        let conn = self.lock()?;
        let body: Option<String> = conn
            .query_row("SELECT body FROM documents WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;

        match body {
            Some(body) => Ok(Document::new(id, decode_body(id, &body)?)),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn put(&self, document: Document) -> Result<(), StoreError> {
        let body = serde_json::to_string(&document.fields)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO documents (id, body) VALUES (?1, ?2)",
            params![document.id, body],
        )?;
        Ok(())
    }

    async fn bulk_put(&self, documents: Vec<Document>) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt =
                tx.prepare_cached("INSERT OR REPLACE INTO documents (id, body) VALUES (?1, ?2)")?;
            for document in &documents {
                let body = serde_json::to_string(&document.fields)?;
                stmt.execute(params![document.id, body])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn range_scan(
        &self,
        start: &str,
        end: &str,
        limit: usize,
    ) -> Result<ScanPage, StoreError> {
        let conn = self.lock()?;

        let total_matching: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE id >= ?1 AND id <= ?2",
            params![start, end],
            |row| row.get(0),
        )?;

        Ok(ScanPage {
            ids: select_ids(&conn, start, end, limit)?,
            total_matching: total_matching.max(0) as u64,
        })
    }

    async fn range_ids(
        &self,
        start: &str,
        end: &str,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        select_ids(&conn, start, end, limit)
    }

    async fn bulk_delete(&self, ids: &[String]) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached("DELETE FROM documents WHERE id = ?1")?;
            for id in ids {
                stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
