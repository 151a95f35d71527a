//! Riddle persistence behind a narrow trait.
//!
//! Two backends:
//!   - `MemoryStore`: process-local, used when no database path is configured.
//!   - `SqliteStore`: durable, file or in-memory SQLite.
//!
//! `commit_batch` is all-or-nothing in both.

use async_trait::async_trait;

use crate::domain::{NewRiddle, Riddle, RiddleDraft, RiddleFilter};
use crate::error::StoreError;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait RiddleStore: Send + Sync {
  /// Riddles matching `filter`, in insertion order.
  async fn list(&self, filter: &RiddleFilter) -> Result<Vec<Riddle>, StoreError>;

  /// Any riddle by id, regardless of status.
  async fn get_by_id(&self, id: &str) -> Result<Option<Riddle>, StoreError>;

  /// Write every riddle of `batch` or none of them. Returns the stored riddles with their new ids.
  async fn commit_batch(&self, batch: Vec<NewRiddle>) -> Result<Vec<Riddle>, StoreError>;

  /// Create a user submission; the stored status is always pending.
  async fn create_pending(&self, draft: RiddleDraft) -> Result<Riddle, StoreError>;
}

pub(crate) fn new_riddle_id() -> String {
  uuid::Uuid::new_v4().to_string()
}

pub(crate) fn materialize(id: String, n: NewRiddle) -> Riddle {
  Riddle {
    id,
    question: n.question,
    answer: n.answer,
    origin: n.origin,
    language: n.language,
    category: None,
    status: n.status,
  }
}
