//! Bulk population of the validated corpus from the riddle generator.
//!
//! `advance_population` runs exactly one batch: generate, normalize, commit atomically,
//! and only then report the advanced counter. It never loops; `run_population` is the
//! driver that repeats it with a cooldown until the target is reached or a batch fails.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, instrument, warn};

use crate::domain::{NewRiddle, RiddleStatus};
use crate::remote::{GeneratedRiddle, RiddleGenerator};
use crate::store::RiddleStore;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchOutcome {
  AlreadyComplete,
  Committed { added: usize },
  GeneratorFailed,
  GeneratorEmpty,
  PersistenceFailed,
  InvalidRequest,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
  pub success: bool,
  pub message: String,
  pub new_count: usize,
  pub outcome: BatchOutcome,
}

impl BatchResult {
  fn failed(count: usize, outcome: BatchOutcome, message: String) -> Self {
    Self { success: false, message, new_count: count, outcome }
  }
}

/// Turn a generator candidate into a validated riddle; blank question/answer is unusable.
pub fn normalize_candidate(candidate: GeneratedRiddle) -> Option<NewRiddle> {
  let question = candidate.question.trim().to_string();
  let answer = candidate.answer.trim().to_string();
  if question.is_empty() || answer.is_empty() {
    return None;
  }
  Some(NewRiddle {
    question,
    answer,
    origin: candidate.origin.map(|s| s.trim().to_string()).unwrap_or_default(),
    language: candidate.language.map(|s| s.trim().to_string()).unwrap_or_default(),
    status: RiddleStatus::Validated,
  })
}

/// Run one population batch toward `target`.
#[instrument(level = "info", skip(store, generator, target), fields(goal = target))]
pub async fn advance_population(
  store: &dyn RiddleStore,
  generator: &dyn RiddleGenerator,
  current_count: usize,
  target: usize,
  batch_size: usize,
) -> BatchResult {
  if current_count >= target {
    return BatchResult {
      success: true,
      message: format!("Population already complete ({}/{}).", current_count, target),
      new_count: current_count,
      outcome: BatchOutcome::AlreadyComplete,
    };
  }
  if batch_size == 0 {
    return BatchResult::failed(current_count, BatchOutcome::InvalidRequest, "Batch size must be at least 1.".into());
  }

  let need = batch_size.min(target - current_count);
  info!(target: "population", need, current_count, goal = target, "Requesting riddle batch");

  let generated = match generator.generate(need).await {
    Ok(b) => b,
    Err(e) => {
      error!(target: "population", error = %e, "Generator call failed");
      return BatchResult::failed(current_count, BatchOutcome::GeneratorFailed, format!("Riddle generation failed: {}", e));
    }
  };

  let returned = generated.riddles.len();
  if returned > need {
    warn!(target: "population", returned, need, "Generator returned more than requested; truncating");
  }
  let batch: Vec<NewRiddle> = generated.riddles.into_iter().take(need).filter_map(normalize_candidate).collect();
  if batch.is_empty() {
    warn!(target: "population", returned, "Generator returned no usable riddles");
    return BatchResult::failed(
      current_count,
      BatchOutcome::GeneratorEmpty,
      format!("The generator returned no usable riddles ({} received).", returned),
    );
  }

  let added = batch.len();
  match store.commit_batch(batch).await {
    Ok(_) => {
      let new_count = current_count + added;
      info!(target: "population", added, new_count, goal = target, "Batch committed");
      BatchResult {
        success: true,
        message: format!("Successfully added {} new riddles. Total: {}/{}", added, new_count, target),
        new_count,
        outcome: BatchOutcome::Committed { added },
      }
    }
    Err(e) => {
      error!(target: "population", error = %e, "Batch commit failed; counter unchanged");
      BatchResult::failed(current_count, BatchOutcome::PersistenceFailed, e.to_string())
    }
  }
}

// ---------------- Driver ----------------

#[derive(Clone, Debug)]
pub struct PopulationPlan {
  pub target: usize,
  pub batch_size: usize,
  /// Pause between batches, to stay under the generator's rate limits.
  pub cooldown: Duration,
  /// Upper bound on batch calls for one run.
  pub max_attempts: u32,
}

impl Default for PopulationPlan {
  fn default() -> Self {
    Self { target: 100, batch_size: 10, cooldown: Duration::from_secs(2), max_attempts: 20 }
  }
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PopulationPhase {
  Running,
  Success,
  Error,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PopulationProgress {
  pub phase: PopulationPhase,
  pub count: usize,
  pub target: usize,
  pub percent: f32,
  pub message: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PopulationReport {
  pub phase: PopulationPhase,
  pub count: usize,
  pub attempts: u32,
  pub message: String,
}

fn percent(count: usize, target: usize) -> f32 {
  if target == 0 { 100.0 } else { (count.min(target) as f32 / target as f32) * 100.0 }
}

/// Drive `advance_population` until the target is reached, a batch fails, or the attempt bound is hit.
/// When a progress channel is given and its receiver goes away, the run stops before the next batch.
#[instrument(level = "info", skip(store, generator, progress))]
pub async fn run_population(
  store: &dyn RiddleStore,
  generator: &dyn RiddleGenerator,
  plan: &PopulationPlan,
  start_count: usize,
  progress: Option<&UnboundedSender<PopulationProgress>>,
) -> PopulationReport {
  let emit = |phase: PopulationPhase, count: usize, message: String| {
    if let Some(tx) = progress {
      let _ = tx.send(PopulationProgress { phase, count, target: plan.target, percent: percent(count, plan.target), message });
    }
  };

  let mut count = start_count;
  let mut attempts = 0u32;
  emit(PopulationPhase::Running, count, format!("Starting riddle generation at {}/{}.", count, plan.target));

  loop {
    if count >= plan.target {
      let message = format!("Population complete! {} riddles toward a target of {}.", count, plan.target);
      emit(PopulationPhase::Success, count, message.clone());
      return PopulationReport { phase: PopulationPhase::Success, count, attempts, message };
    }
    if attempts >= plan.max_attempts {
      let message = format!("Stopped after {} attempts at {}/{}.", attempts, count, plan.target);
      warn!(target: "population", attempts, count, "Attempt bound reached");
      emit(PopulationPhase::Error, count, message.clone());
      return PopulationReport { phase: PopulationPhase::Error, count, attempts, message };
    }
    if attempts > 0 && !plan.cooldown.is_zero() {
      tokio::time::sleep(plan.cooldown).await;
    }
    if progress.is_some_and(|tx| tx.is_closed()) {
      let message = format!("Progress listener left; stopped at {}/{}.", count, plan.target);
      warn!(target: "population", attempts, count, "Progress receiver closed; stopping run");
      return PopulationReport { phase: PopulationPhase::Error, count, attempts, message };
    }

    attempts += 1;
    let result = advance_population(store, generator, count, plan.target, plan.batch_size).await;
    count = result.new_count;
    if !result.success {
      emit(PopulationPhase::Error, count, result.message.clone());
      return PopulationReport { phase: PopulationPhase::Error, count, attempts, message: result.message };
    }
    emit(PopulationPhase::Running, count, result.message);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::{HashSet, VecDeque};
  use std::sync::Mutex;

  use async_trait::async_trait;

  use crate::domain::{Riddle, RiddleDraft, RiddleFilter};
  use crate::error::{RemoteError, StoreError};
  use crate::remote::GeneratedBatch;
  use crate::store::MemoryStore;

  fn candidate(i: usize) -> GeneratedRiddle {
    GeneratedRiddle {
      question: format!("Generated riddle number {i}?"),
      answer: format!("answer {i}"),
      origin: Some("Nigeria".into()),
      language: None,
    }
  }

  /// Replays scripted responses; once the script runs out, returns `count` fresh riddles.
  #[derive(Default)]
  struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<GeneratedBatch, RemoteError>>>,
    requests: Mutex<Vec<usize>>,
    serial: Mutex<usize>,
  }

  impl ScriptedGenerator {
    fn with_script(script: Vec<Result<GeneratedBatch, RemoteError>>) -> Self {
      Self { script: Mutex::new(script.into()), ..Default::default() }
    }
  }

  #[async_trait]
  impl RiddleGenerator for ScriptedGenerator {
    async fn generate(&self, count: usize) -> Result<GeneratedBatch, RemoteError> {
      self.requests.lock().unwrap().push(count);
      if let Some(next) = self.script.lock().unwrap().pop_front() {
        return next;
      }
      let mut serial = self.serial.lock().unwrap();
      let riddles = (0..count).map(|_| { *serial += 1; candidate(*serial) }).collect();
      Ok(GeneratedBatch { riddles })
    }
  }

  struct FailingStore;

  #[async_trait]
  impl RiddleStore for FailingStore {
    async fn list(&self, _filter: &RiddleFilter) -> Result<Vec<Riddle>, StoreError> { Ok(vec![]) }
    async fn get_by_id(&self, _id: &str) -> Result<Option<Riddle>, StoreError> { Ok(None) }
    async fn commit_batch(&self, _batch: Vec<NewRiddle>) -> Result<Vec<Riddle>, StoreError> {
      Err(StoreError::Backend("disk full".into()))
    }
    async fn create_pending(&self, _draft: RiddleDraft) -> Result<Riddle, StoreError> {
      Err(StoreError::Backend("disk full".into()))
    }
  }

  fn batch_of(n: usize) -> GeneratedBatch {
    GeneratedBatch { riddles: (0..n).map(candidate).collect() }
  }

  #[tokio::test]
  async fn complete_counter_is_a_noop() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::default();
    let res = advance_population(&store, &generator, 100, 100, 10).await;
    assert!(res.success);
    assert_eq!(res.outcome, BatchOutcome::AlreadyComplete);
    assert_eq!(res.new_count, 100);
    assert!(generator.requests.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn ten_batches_reach_target() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::default();
    let mut count = 0;
    for _ in 0..10 {
      let res = advance_population(&store, &generator, count, 100, 10).await;
      assert!(res.success, "{}", res.message);
      assert_eq!(res.new_count, count + 10);
      count = res.new_count;
    }
    assert_eq!(count, 100);
    assert_eq!(store.list(&RiddleFilter::validated()).await.unwrap().len(), 100);

    let again = advance_population(&store, &generator, count, 100, 10).await;
    assert_eq!(again.outcome, BatchOutcome::AlreadyComplete);
  }

  #[tokio::test]
  async fn request_is_capped_by_remaining_and_oversized_replies_truncated() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::with_script(vec![Ok(batch_of(12))]);
    let res = advance_population(&store, &generator, 95, 100, 10).await;
    assert_eq!(*generator.requests.lock().unwrap(), vec![5]);
    assert_eq!(res.new_count, 100);
    assert_eq!(res.outcome, BatchOutcome::Committed { added: 5 });
    assert_eq!(store.list(&RiddleFilter::default()).await.unwrap().len(), 5);
  }

  #[tokio::test]
  async fn short_batch_advances_by_what_was_returned() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::with_script(vec![Ok(batch_of(3))]);
    let res = advance_population(&store, &generator, 20, 100, 10).await;
    assert_eq!(res.new_count, 23);
  }

  #[tokio::test]
  async fn empty_batch_fails_without_advancing() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::with_script(vec![Ok(batch_of(10)), Ok(batch_of(10)), Ok(GeneratedBatch::default())]);
    let mut count = 0;
    for _ in 0..2 {
      count = advance_population(&store, &generator, count, 100, 10).await.new_count;
    }
    let res = advance_population(&store, &generator, count, 100, 10).await;
    assert!(!res.success);
    assert_eq!(res.outcome, BatchOutcome::GeneratorEmpty);
    assert_eq!(res.new_count, 20);
    assert_eq!(store.list(&RiddleFilter::default()).await.unwrap().len(), 20);
  }

  #[tokio::test]
  async fn blank_candidates_are_dropped_and_labels_default_to_empty() {
    let store = MemoryStore::new();
    let mut batch = batch_of(2);
    batch.riddles[1].answer = "   ".into();
    let generator = ScriptedGenerator::with_script(vec![Ok(batch)]);
    let res = advance_population(&store, &generator, 0, 10, 10).await;
    assert_eq!(res.outcome, BatchOutcome::Committed { added: 1 });

    let stored = store.list(&RiddleFilter::default()).await.unwrap();
    assert_eq!(stored[0].status, RiddleStatus::Validated);
    assert_eq!(stored[0].origin, "Nigeria");
    assert_eq!(stored[0].language, "");
  }

  #[tokio::test]
  async fn generator_error_and_store_error_leave_counter_alone() {
    let generator = ScriptedGenerator::with_script(vec![Err(RemoteError::Http { status: 429, message: "slow down".into() })]);
    let res = advance_population(&MemoryStore::new(), &generator, 40, 100, 10).await;
    assert_eq!(res.outcome, BatchOutcome::GeneratorFailed);
    assert_eq!(res.new_count, 40);
    assert!(res.message.contains("slow down"));

    let res = advance_population(&FailingStore, &ScriptedGenerator::default(), 40, 100, 10).await;
    assert_eq!(res.outcome, BatchOutcome::PersistenceFailed);
    assert_eq!(res.new_count, 40);
    assert_eq!(res.message, "storage backend error: disk full");
  }

  #[tokio::test]
  async fn zero_batch_size_is_rejected() {
    let res = advance_population(&MemoryStore::new(), &ScriptedGenerator::default(), 0, 10, 0).await;
    assert_eq!(res.outcome, BatchOutcome::InvalidRequest);
    assert!(!res.success);
  }

  #[tokio::test]
  async fn retry_after_failed_commit_does_not_duplicate() {
    // First attempt fails to commit, the retry with the same counter succeeds once.
    let generator = ScriptedGenerator::default();
    let failed = advance_population(&FailingStore, &generator, 0, 10, 10).await;
    assert_eq!(failed.new_count, 0);

    let store = MemoryStore::new();
    let ok = advance_population(&store, &generator, failed.new_count, 10, 10).await;
    assert_eq!(ok.new_count, 10);
    let stored = store.list(&RiddleFilter::default()).await.unwrap();
    let ids: HashSet<_> = stored.iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids.len(), stored.len());
    assert_eq!(stored.len(), 10);
  }

  fn fast_plan(target: usize, batch_size: usize) -> PopulationPlan {
    PopulationPlan { target, batch_size, cooldown: Duration::ZERO, max_attempts: 20 }
  }

  #[tokio::test]
  async fn driver_resumes_and_reaches_target_with_progress() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::default();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let report = run_population(&store, &generator, &fast_plan(25, 10), 5, Some(&tx)).await;
    assert_eq!(report.phase, PopulationPhase::Success);
    assert_eq!(report.count, 25);
    assert_eq!(report.attempts, 2);
    assert_eq!(*generator.requests.lock().unwrap(), vec![10, 10]);

    drop(tx);
    let mut events = Vec::new();
    while let Some(e) = rx.recv().await {
      events.push(e);
    }
    assert_eq!(events.first().map(|e| e.phase), Some(PopulationPhase::Running));
    let last = events.last().unwrap();
    assert_eq!(last.phase, PopulationPhase::Success);
    assert_eq!(last.percent, 100.0);
  }

  #[tokio::test]
  async fn driver_does_not_start_without_a_listener() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::default();
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    drop(rx);

    let report = run_population(&store, &generator, &fast_plan(100, 10), 30, Some(&tx)).await;
    assert_eq!(report.phase, PopulationPhase::Error);
    assert_eq!(report.count, 30);
    assert_eq!(report.attempts, 0);
    assert!(generator.requests.lock().unwrap().is_empty());
    assert!(store.list(&RiddleFilter::default()).await.unwrap().is_empty());
  }

  /// Generates `count` riddles and drops the progress receiver on its first call.
  struct DisconnectingGenerator {
    rx: Mutex<Option<tokio::sync::mpsc::UnboundedReceiver<PopulationProgress>>>,
    calls: Mutex<usize>,
  }

  #[async_trait]
  impl RiddleGenerator for DisconnectingGenerator {
    async fn generate(&self, count: usize) -> Result<GeneratedBatch, RemoteError> {
      *self.calls.lock().unwrap() += 1;
      self.rx.lock().unwrap().take();
      Ok(batch_of(count))
    }
  }

  #[tokio::test]
  async fn driver_stops_after_listener_leaves_mid_run() {
    let store = MemoryStore::new();
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let generator = DisconnectingGenerator { rx: Mutex::new(Some(rx)), calls: Mutex::new(0) };

    let report = run_population(&store, &generator, &fast_plan(100, 10), 30, Some(&tx)).await;
    assert_eq!(report.phase, PopulationPhase::Error);
    assert_eq!(report.count, 40);
    assert_eq!(report.attempts, 1);
    assert_eq!(*generator.calls.lock().unwrap(), 1);
    assert_eq!(store.list(&RiddleFilter::default()).await.unwrap().len(), 10);
  }

  #[tokio::test]
  async fn driver_halts_on_first_failed_batch() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::with_script(vec![Ok(batch_of(10)), Ok(GeneratedBatch::default()), Ok(batch_of(10))]);
    let report = run_population(&store, &generator, &fast_plan(100, 10), 0, None).await;
    assert_eq!(report.phase, PopulationPhase::Error);
    assert_eq!(report.count, 10);
    assert_eq!(report.attempts, 2);
  }

  #[tokio::test]
  async fn driver_respects_attempt_bound() {
    let store = MemoryStore::new();
    let generator = ScriptedGenerator::default();
    let plan = PopulationPlan { max_attempts: 3, ..fast_plan(100, 10) };
    let report = run_population(&store, &generator, &plan, 0, None).await;
    assert_eq!(report.phase, PopulationPhase::Error);
    assert_eq!(report.count, 30);
    assert_eq!(report.attempts, 3);
  }
}
