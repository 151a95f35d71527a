//! In-memory store: id map plus insertion order, guarded by a single lock.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::{materialize, new_riddle_id, RiddleStore};
use crate::domain::{NewRiddle, Riddle, RiddleDraft, RiddleFilter};
use crate::error::StoreError;

#[derive(Default)]
struct Inner {
  by_id: HashMap<String, Riddle>,
  order: Vec<String>,
}

#[derive(Default)]
pub struct MemoryStore {
  inner: RwLock<Inner>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// Insert fully-formed riddles (ids included), skipping ids already present.
  #[cfg(test)]
  pub async fn with_riddles(riddles: Vec<Riddle>) -> Self {
    let store = Self::new();
    {
      let mut inner = store.inner.write().await;
      for r in riddles {
        if inner.by_id.contains_key(&r.id) { continue; }
        inner.order.push(r.id.clone());
        inner.by_id.insert(r.id.clone(), r);
      }
    }
    store
  }
}

#[async_trait]
impl RiddleStore for MemoryStore {
  #[instrument(level = "debug", skip(self))]
  async fn list(&self, filter: &RiddleFilter) -> Result<Vec<Riddle>, StoreError> {
    let inner = self.inner.read().await;
    Ok(inner
      .order
      .iter()
      .filter_map(|id| inner.by_id.get(id))
      .filter(|r| filter.matches(r))
      .cloned()
      .collect())
  }

  async fn get_by_id(&self, id: &str) -> Result<Option<Riddle>, StoreError> {
    Ok(self.inner.read().await.by_id.get(id).cloned())
  }

  #[instrument(level = "debug", skip(self, batch), fields(batch_len = batch.len()))]
  async fn commit_batch(&self, batch: Vec<NewRiddle>) -> Result<Vec<Riddle>, StoreError> {
    // Build everything before taking the write lock, then insert in one critical section.
    let stored: Vec<Riddle> = batch.into_iter().map(|n| materialize(new_riddle_id(), n)).collect();
    let mut inner = self.inner.write().await;
    if let Some(dup) = stored.iter().find(|r| inner.by_id.contains_key(&r.id)) {
      return Err(StoreError::Rejected(format!("duplicate id {}", dup.id)));
    }
    for r in &stored {
      inner.order.push(r.id.clone());
      inner.by_id.insert(r.id.clone(), r.clone());
    }
    debug!(target: "riddle", committed = stored.len(), total = inner.order.len(), "Batch committed (memory)");
    Ok(stored)
  }

  async fn create_pending(&self, draft: RiddleDraft) -> Result<Riddle, StoreError> {
    let r = materialize(new_riddle_id(), draft.into_pending());
    let mut inner = self.inner.write().await;
    inner.order.push(r.id.clone());
    inner.by_id.insert(r.id.clone(), r.clone());
    Ok(r)
  }
}
