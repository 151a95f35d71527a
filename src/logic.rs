//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Play: next riddle (adaptive selector) and answer reveal (history update)
//!   - Explore: filtered listing, origin/language facets, detail
//!   - Submission: validation, then a pending write
//!   - Population: one batch step and the full driver

use std::collections::BTreeSet;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, instrument, warn};

use crate::domain::{Riddle, RiddleDraft, RiddleFilter, RiddleStatus};
use crate::error::{RemoteError, SelectError, StoreError, SubmissionError};
use crate::history::ViewHistory;
use crate::population::{
  advance_population, run_population, BatchOutcome, BatchResult, PopulationPhase, PopulationPlan, PopulationProgress,
  PopulationReport,
};
use crate::selector::{select_next, Selection};
use crate::state::AppState;

#[instrument(level = "info", skip(state, seen), fields(%user_id, seen = seen.len()))]
pub async fn next_riddle(state: &AppState, user_id: &str, seen: &ViewHistory) -> Result<Selection, SelectError> {
  select_next(
    state.store.as_ref(),
    state.advisor.as_deref(),
    user_id,
    seen,
    state.origin_hint.as_deref(),
  )
  .await
}

/// Reveal the answer of a validated riddle and return the history with it recorded.
/// A history that already covers every validated riddle is cleared first.
/// `None` for unknown or pending ids.
#[instrument(level = "info", skip(state, seen), fields(%riddle_id, seen = seen.len()))]
pub async fn reveal_answer(
  state: &AppState,
  riddle_id: &str,
  mut seen: ViewHistory,
) -> Result<Option<(Riddle, ViewHistory)>, StoreError> {
  let Some(riddle) = get_riddle(state, riddle_id).await? else {
    return Ok(None);
  };
  let validated = state.store.list(&RiddleFilter::validated()).await?;
  if validated.iter().all(|r| seen.contains(&r.id)) {
    info!(target: "riddle", seen = seen.len(), "History covered the corpus; cleared before recording");
    seen.clear();
  }
  seen.record(&riddle.id);
  Ok(Some((riddle, seen)))
}

/// Validated riddle by id.
pub async fn get_riddle(state: &AppState, id: &str) -> Result<Option<Riddle>, StoreError> {
  Ok(state.store.get_by_id(id).await?.filter(Riddle::is_validated))
}

/// Validated riddles matching the filter; any requested status is ignored.
#[instrument(level = "info", skip(state))]
pub async fn explore(state: &AppState, filter: RiddleFilter) -> Result<Vec<Riddle>, StoreError> {
  let filter = RiddleFilter { status: Some(RiddleStatus::Validated), ..filter };
  let riddles = state.store.list(&filter).await?;
  info!(target: "riddle", hits = riddles.len(), "Explore listing served");
  Ok(riddles)
}

/// Sorted distinct non-empty origins of validated riddles.
pub async fn list_origins(state: &AppState) -> Result<Vec<String>, StoreError> {
  let riddles = state.store.list(&RiddleFilter::validated()).await?;
  Ok(distinct_labels(riddles.iter().map(|r| r.origin.as_str())))
}

/// Sorted distinct non-empty languages of validated riddles.
pub async fn list_languages(state: &AppState) -> Result<Vec<String>, StoreError> {
  let riddles = state.store.list(&RiddleFilter::validated()).await?;
  Ok(distinct_labels(riddles.iter().map(|r| r.language.as_str())))
}

fn distinct_labels<'a>(labels: impl Iterator<Item = &'a str>) -> Vec<String> {
  labels
    .map(str::trim)
    .filter(|l| !l.is_empty())
    .map(str::to_string)
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect()
}

/// Validate a user submission and store it as pending.
#[instrument(level = "info", skip(state, draft), fields(question_len = draft.question.len()))]
pub async fn submit_riddle(state: &AppState, draft: RiddleDraft) -> Result<Riddle, SubmissionError> {
  if let Err(issues) = draft.validate() {
    info!(target: "riddle", issues = issues.len(), "Submission rejected by validation");
    return Err(SubmissionError::Invalid(issues));
  }
  let created = state.store.create_pending(draft).await?;
  info!(target: "riddle", id = %created.id, "Submission stored as pending");
  Ok(created)
}

/// One population batch. Target and batch size default to the configured plan.
#[instrument(level = "info", skip(state, target), fields(goal = ?target))]
pub async fn populate_step(
  state: &AppState,
  current_count: usize,
  target: Option<usize>,
  batch_size: Option<usize>,
) -> BatchResult {
  let target = target.unwrap_or(state.plan.target);
  let batch_size = batch_size.unwrap_or(state.plan.batch_size);
  match &state.generator {
    Some(g) => advance_population(state.store.as_ref(), g.as_ref(), current_count, target, batch_size).await,
    None => {
      warn!(target: "population", "Population requested but no generator is configured");
      BatchResult {
        success: false,
        message: format!("Riddle generation failed: {}", RemoteError::Unavailable),
        new_count: current_count,
        outcome: BatchOutcome::GeneratorFailed,
      }
    }
  }
}

/// Full population run from `start_count` using the configured plan.
pub async fn populate_run(
  state: &AppState,
  plan: &PopulationPlan,
  start_count: usize,
  progress: Option<&UnboundedSender<PopulationProgress>>,
) -> PopulationReport {
  match &state.generator {
    Some(g) => run_population(state.store.as_ref(), g.as_ref(), plan, start_count, progress).await,
    None => PopulationReport {
      phase: PopulationPhase::Error,
      count: start_count,
      attempts: 0,
      message: format!("Riddle generation failed: {}", RemoteError::Unavailable),
    },
  }
}
