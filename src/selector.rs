//! Adaptive riddle selection.
//!
//! Policy:
//!   1) Candidate universe = validated riddles; available = those not in the history.
//!   2) Nothing available => history is exhausted; every validated riddle is eligible again.
//!   3) Ask the advisor (if configured) for an id.
//!   4) Advisor picked something already seen while unseen riddles exist => random unseen instead.
//!   5) Advisor missing, failing, or pointing at nothing usable => random eligible riddle.
//!
//! Always returns a riddle when at least one validated riddle exists.

use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::domain::{Riddle, RiddleFilter};
use crate::error::{RemoteError, SelectError};
use crate::history::ViewHistory;
use crate::remote::{AdviceRequest, RiddleAdvisor};
use crate::store::RiddleStore;

/// Which branch of the policy produced the riddle.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPath {
  Advisor,
  /// Advisor chose an already-seen riddle; replaced by a random unseen one.
  Override,
  /// Advisor unavailable or unusable; random pick.
  Fallback,
}

#[derive(Clone, Debug)]
pub struct Selection {
  pub riddle: Riddle,
  pub path: SelectionPath,
  pub reason: Option<String>,
  /// Every validated riddle had been seen; the caller should clear its history.
  pub history_exhausted: bool,
}

#[instrument(level = "info", skip(store, advisor, seen), fields(%user_id, seen = seen.len()))]
pub async fn select_next(
  store: &dyn RiddleStore,
  advisor: Option<&dyn RiddleAdvisor>,
  user_id: &str,
  seen: &ViewHistory,
  origin_hint: Option<&str>,
) -> Result<Selection, SelectError> {
  let validated = store.list(&RiddleFilter::validated()).await?;
  if validated.is_empty() {
    return Err(SelectError::EmptyCorpus);
  }

  let available: Vec<Riddle> = validated.iter().filter(|r| !seen.contains(&r.id)).cloned().collect();
  let history_exhausted = available.is_empty();
  if history_exhausted {
    info!(target: "riddle", %user_id, total = validated.len(), "History exhausted; soft reset for this pick");
  }
  let eligible: &[Riddle] = if history_exhausted { &validated } else { &available };

  let advised = match advisor {
    Some(a) => {
      let req = AdviceRequest {
        user_id: user_id.to_string(),
        available_ids: validated.iter().map(|r| r.id.clone()).collect(),
        seen_ids: seen.ids().to_vec(),
        origin_hint: origin_hint.map(str::to_string),
      };
      match a.advise(&req).await {
        Ok(advice) => match store.get_by_id(&advice.selected_id).await {
          Ok(Some(r)) if r.is_validated() => Ok((r, advice.reason)),
          Ok(_) => Err(RemoteError::Malformed(format!("advisor chose unknown riddle '{}'", advice.selected_id))),
          Err(e) => Err(RemoteError::Transport(format!("resolving advised riddle: {e}"))),
        },
        Err(e) => Err(e),
      }
    }
    None => Err(RemoteError::Unavailable),
  };

  let selection = match advised {
    Ok((riddle, reason)) if seen.contains(&riddle.id) => match pick_random(&available) {
      Some(unseen) => {
        warn!(target: "riddle", %user_id, advised = %riddle.id, "Advisor picked a seen riddle; overriding with a random unseen one");
        Selection { riddle: unseen, path: SelectionPath::Override, reason: Some(reason), history_exhausted }
      }
      // Nothing unseen is left, so the advised riddle stands.
      None => Selection { riddle, path: SelectionPath::Advisor, reason: Some(reason), history_exhausted },
    },
    Ok((riddle, reason)) => Selection { riddle, path: SelectionPath::Advisor, reason: Some(reason), history_exhausted },
    Err(e) => {
      match e {
        RemoteError::Unavailable => info!(target: "riddle", %user_id, "No advisor configured; random pick"),
        e => warn!(target: "riddle", %user_id, error = %e, "Advisor failed; falling back to random pick"),
      }
      let riddle = pick_random(eligible)
        .or_else(|| validated.first().cloned())
        .ok_or(SelectError::EmptyCorpus)?;
      Selection { riddle, path: SelectionPath::Fallback, reason: None, history_exhausted }
    }
  };

  info!(target: "riddle", %user_id, chosen = %selection.riddle.id, path = ?selection.path, "Riddle selected");
  Ok(selection)
}

fn pick_random(pool: &[Riddle]) -> Option<Riddle> {
  pool.choose(&mut rand::thread_rng()).cloned()
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;

  use async_trait::async_trait;

  use crate::domain::RiddleStatus;
  use crate::remote::Advice;
  use crate::store::MemoryStore;

  fn riddle(id: &str, status: RiddleStatus) -> Riddle {
    Riddle {
      id: id.into(),
      question: format!("Question for {id}?"),
      answer: format!("answer {id}"),
      origin: "Cameroon".into(),
      language: "French".into(),
      category: None,
      status,
    }
  }

  async fn corpus(ids: &[&str]) -> MemoryStore {
    MemoryStore::with_riddles(ids.iter().map(|id| riddle(id, RiddleStatus::Validated)).collect()).await
  }

  /// Always answers with a fixed id and records the requests it saw.
  struct FixedAdvisor {
    pick: String,
    seen_requests: Mutex<Vec<AdviceRequest>>,
  }

  impl FixedAdvisor {
    fn new(pick: &str) -> Self {
      Self { pick: pick.into(), seen_requests: Mutex::new(Vec::new()) }
    }
  }

  #[async_trait]
  impl RiddleAdvisor for FixedAdvisor {
    async fn advise(&self, req: &AdviceRequest) -> Result<Advice, RemoteError> {
      self.seen_requests.lock().unwrap().push(req.clone());
      Ok(Advice { selected_id: self.pick.clone(), reason: "fixed".into() })
    }
  }

  struct BrokenAdvisor;

  #[async_trait]
  impl RiddleAdvisor for BrokenAdvisor {
    async fn advise(&self, _req: &AdviceRequest) -> Result<Advice, RemoteError> {
      Err(RemoteError::Transport("connection refused".into()))
    }
  }

  #[tokio::test]
  async fn empty_corpus_is_a_distinct_error() {
    let store = MemoryStore::with_riddles(vec![riddle("p1", RiddleStatus::Pending)]).await;
    let err = select_next(&store, None, "u", &ViewHistory::new(), None).await.unwrap_err();
    assert!(matches!(err, SelectError::EmptyCorpus));
  }

  #[tokio::test]
  async fn advisor_choice_is_used_when_unseen() {
    let store = corpus(&["r1", "r2", "r3"]).await;
    let advisor = FixedAdvisor::new("r2");
    let seen = ViewHistory::from(vec!["r1".to_string()]);
    let sel = select_next(&store, Some(&advisor), "user-1", &seen, Some("Cameroon")).await.unwrap();
    assert_eq!(sel.riddle.id, "r2");
    assert_eq!(sel.path, SelectionPath::Advisor);
    assert_eq!(sel.reason.as_deref(), Some("fixed"));

    let reqs = advisor.seen_requests.lock().unwrap();
    assert_eq!(reqs[0].available_ids, vec!["r1", "r2", "r3"]);
    assert_eq!(reqs[0].seen_ids, vec!["r1"]);
    assert_eq!(reqs[0].origin_hint.as_deref(), Some("Cameroon"));
  }

  #[tokio::test]
  async fn seen_advice_is_overridden_when_unseen_exists() {
    let store = corpus(&["r1", "r2", "r3"]).await;
    let advisor = FixedAdvisor::new("r1");
    let seen = ViewHistory::from(vec!["r1".to_string(), "r2".to_string()]);
    for _ in 0..20 {
      let sel = select_next(&store, Some(&advisor), "u", &seen, None).await.unwrap();
      assert_eq!(sel.riddle.id, "r3");
      assert_eq!(sel.path, SelectionPath::Override);
    }
  }

  #[tokio::test]
  async fn failing_advisor_falls_back_to_unseen() {
    let store = corpus(&["r1", "r2", "r3"]).await;
    let seen = ViewHistory::from(vec!["r1".to_string(), "r3".to_string()]);
    let sel = select_next(&store, Some(&BrokenAdvisor), "u", &seen, None).await.unwrap();
    assert_eq!(sel.riddle.id, "r2");
    assert_eq!(sel.path, SelectionPath::Fallback);
    assert!(!sel.history_exhausted);
  }

  #[tokio::test]
  async fn unknown_or_pending_advice_falls_back() {
    let store = MemoryStore::with_riddles(vec![
      riddle("r1", RiddleStatus::Validated),
      riddle("hidden", RiddleStatus::Pending),
    ])
    .await;
    for pick in ["does-not-exist", "hidden"] {
      let advisor = FixedAdvisor::new(pick);
      let sel = select_next(&store, Some(&advisor), "u", &ViewHistory::new(), None).await.unwrap();
      assert_eq!(sel.riddle.id, "r1");
      assert_eq!(sel.path, SelectionPath::Fallback);
      assert!(sel.riddle.is_validated());
    }
  }

  #[tokio::test]
  async fn single_seen_riddle_is_served_again_after_soft_reset() {
    let store = corpus(&["r1"]).await;
    let seen = ViewHistory::from(vec!["r1".to_string()]);

    let sel = select_next(&store, None, "u", &seen, None).await.unwrap();
    assert_eq!(sel.riddle.id, "r1");
    assert!(sel.history_exhausted);

    // With an advisor, the seen pick is accepted because nothing unseen exists.
    let advisor = FixedAdvisor::new("r1");
    let sel = select_next(&store, Some(&advisor), "u", &seen, None).await.unwrap();
    assert_eq!(sel.riddle.id, "r1");
    assert_eq!(sel.path, SelectionPath::Advisor);
    // The advisor still sees the pre-reset history.
    assert_eq!(advisor.seen_requests.lock().unwrap()[0].seen_ids, vec!["r1"]);
  }

  #[tokio::test]
  async fn without_advisor_every_pick_is_validated_and_unseen() {
    let store = MemoryStore::with_riddles(vec![
      riddle("a", RiddleStatus::Validated),
      riddle("b", RiddleStatus::Pending),
      riddle("c", RiddleStatus::Validated),
      riddle("d", RiddleStatus::Validated),
    ])
    .await;
    let seen = ViewHistory::from(vec!["a".to_string()]);
    for _ in 0..30 {
      let sel = select_next(&store, None, "u", &seen, None).await.unwrap();
      assert!(sel.riddle.is_validated());
      assert_ne!(sel.riddle.id, "a");
    }
  }
}
