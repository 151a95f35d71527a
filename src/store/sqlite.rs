//! SQLite-backed store.
//!
//! A single connection behind a mutex; every call runs on the blocking pool.
//! Status/origin/language filters are pushed into SQL; the free-text search is
//! applied afterwards so it matches the in-memory store's case folding exactly.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use tracing::{debug, info, instrument};

use super::{materialize, new_riddle_id, RiddleStore};
use crate::domain::{NewRiddle, Riddle, RiddleDraft, RiddleFilter, RiddleStatus};
use crate::error::StoreError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS riddles (
  seq      INTEGER PRIMARY KEY AUTOINCREMENT,
  id       TEXT NOT NULL UNIQUE,
  question TEXT NOT NULL,
  answer   TEXT NOT NULL,
  origin   TEXT NOT NULL DEFAULT '',
  language TEXT NOT NULL DEFAULT '',
  category TEXT,
  status   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_riddles_status ON riddles(status);
";

const COLUMNS: &str = "id, question, answer, origin, language, category, status";

fn to_store_err(e: rusqlite::Error) -> StoreError {
  StoreError::Backend(e.to_string())
}

fn row_to_riddle(row: &Row<'_>) -> rusqlite::Result<Riddle> {
  let status_raw: String = row.get(6)?;
  let status = RiddleStatus::parse(&status_raw).ok_or_else(|| {
    rusqlite::Error::FromSqlConversionFailure(
      6,
      Type::Text,
      Box::new(StoreError::Backend(format!("unknown status '{status_raw}'"))),
    )
  })?;
  Ok(Riddle {
    id: row.get(0)?,
    question: row.get(1)?,
    answer: row.get(2)?,
    origin: row.get(3)?,
    language: row.get(4)?,
    category: row.get(5)?,
    status,
  })
}

fn insert_row(conn: &Connection, r: &Riddle) -> Result<(), StoreError> {
  conn
    .execute(
      "INSERT INTO riddles (id, question, answer, origin, language, category, status)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      params![r.id, r.question, r.answer, r.origin, r.language, r.category, r.status.as_str()],
    )
    .map_err(to_store_err)?;
  Ok(())
}

#[derive(Clone)]
pub struct SqliteStore {
  conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
    let path = path.as_ref();
    let conn = Connection::open(path).map_err(to_store_err)?;
    info!(target: "devinettenet", path = %path.display(), "Opened SQLite riddle store");
    Self::init(conn)
  }

  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self, StoreError> {
    Self::init(Connection::open_in_memory().map_err(to_store_err)?)
  }

  fn init(conn: Connection) -> Result<Self, StoreError> {
    conn.execute_batch(SCHEMA).map_err(to_store_err)?;
    Ok(Self { conn: Arc::new(Mutex::new(conn)) })
  }

  async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
  where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
  {
    let conn = Arc::clone(&self.conn);
    tokio::task::spawn_blocking(move || {
      let mut guard = conn
        .lock()
        .map_err(|_| StoreError::Backend("sqlite connection lock poisoned".into()))?;
      f(&mut guard)
    })
    .await
    .map_err(|e| StoreError::Backend(format!("sqlite task failed: {e}")))?
  }

  /// Insert prebuilt rows in one transaction; any failure rolls back all of them.
  async fn commit_rows(&self, rows: Vec<Riddle>) -> Result<Vec<Riddle>, StoreError> {
    self
      .with_conn(move |conn| {
        let tx = conn.transaction().map_err(to_store_err)?;
        for r in &rows {
          // Dropping `tx` on the error path rolls back.
          insert_row(&tx, r)?;
        }
        tx.commit().map_err(to_store_err)?;
        Ok(rows)
      })
      .await
  }
}

#[async_trait]
impl RiddleStore for SqliteStore {
  #[instrument(level = "debug", skip(self))]
  async fn list(&self, filter: &RiddleFilter) -> Result<Vec<Riddle>, StoreError> {
    let filter = filter.clone();
    self
      .with_conn(move |conn| {
        let sql = format!(
          "SELECT {COLUMNS} FROM riddles
           WHERE (?1 IS NULL OR status = ?1)
             AND (?2 IS NULL OR origin = ?2)
             AND (?3 IS NULL OR language = ?3)
           ORDER BY seq"
        );
        let mut stmt = conn.prepare(&sql).map_err(to_store_err)?;
        let rows = stmt
          .query_map(
            params![
              filter.status.map(|s| s.as_str()),
              filter.origin.as_deref(),
              filter.language.as_deref()
            ],
            row_to_riddle,
          )
          .map_err(to_store_err)?;
        let mut out = Vec::new();
        for row in rows {
          let r = row.map_err(to_store_err)?;
          if filter.matches_search(&r) {
            out.push(r);
          }
        }
        Ok(out)
      })
      .await
  }

  async fn get_by_id(&self, id: &str) -> Result<Option<Riddle>, StoreError> {
    let id = id.to_string();
    self
      .with_conn(move |conn| {
        conn
          .query_row(&format!("SELECT {COLUMNS} FROM riddles WHERE id = ?1"), params![id], row_to_riddle)
          .optional()
          .map_err(to_store_err)
      })
      .await
  }

  #[instrument(level = "debug", skip(self, batch), fields(batch_len = batch.len()))]
  async fn commit_batch(&self, batch: Vec<NewRiddle>) -> Result<Vec<Riddle>, StoreError> {
    let rows: Vec<Riddle> = batch.into_iter().map(|n| materialize(new_riddle_id(), n)).collect();
    let stored = self.commit_rows(rows).await?;
    debug!(target: "riddle", committed = stored.len(), "Batch committed (sqlite)");
    Ok(stored)
  }

  async fn create_pending(&self, draft: RiddleDraft) -> Result<Riddle, StoreError> {
    let r = materialize(new_riddle_id(), draft.into_pending());
    self
      .with_conn(move |conn| {
        insert_row(conn, &r)?;
        Ok(r)
      })
      .await
  }
}
