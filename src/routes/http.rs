//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{error, info, instrument};

use crate::domain::RiddleDraft;
use crate::error::{SelectError, StoreError, SubmissionError};
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

fn store_failure(e: StoreError) -> Response {
  error!(target: "riddle", error = %e, "Store operation failed");
  (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorOut { error: "store_error", message: e.to_string() })).into_response()
}

fn not_found(what: &str) -> Response {
  (StatusCode::NOT_FOUND, Json(ErrorOut { error: "not_found", message: format!("{what} not found") })).into_response()
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_list_riddles(
  State(state): State<Arc<AppState>>,
  Query(q): Query<ExploreQuery>,
) -> Response {
  match explore(&state, q.into_filter()).await {
    Ok(riddles) => Json(RiddleListOut { riddles: riddles.iter().map(|r| to_out(r, true)).collect() }).into_response(),
    Err(e) => store_failure(e),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_riddle(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
  match get_riddle(&state, &id).await {
    Ok(Some(r)) => Json(to_out(&r, true)).into_response(),
    Ok(None) => not_found("Riddle"),
    Err(e) => store_failure(e),
  }
}

#[instrument(level = "info", skip(state, body), fields(question_len = body.question.len()))]
pub async fn http_submit_riddle(State(state): State<Arc<AppState>>, Json(body): Json<RiddleDraft>) -> Response {
  match submit_riddle(&state, body).await {
    Ok(created) => (StatusCode::CREATED, Json(to_out(&created, true))).into_response(),
    Err(SubmissionError::Invalid(issues)) => (
      StatusCode::UNPROCESSABLE_ENTITY,
      Json(SubmissionRejectedOut { error: "invalid_submission", issues }),
    )
      .into_response(),
    Err(SubmissionError::Store(e)) => store_failure(e),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_origins(State(state): State<Arc<AppState>>) -> Response {
  match list_origins(&state).await {
    Ok(origins) => Json(OriginsOut { origins }).into_response(),
    Err(e) => store_failure(e),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_languages(State(state): State<Arc<AppState>>) -> Response {
  match list_languages(&state).await {
    Ok(languages) => Json(LanguagesOut { languages }).into_response(),
    Err(e) => store_failure(e),
  }
}

#[instrument(level = "info", skip(state, body), fields(user_id = %body.user_id, seen = body.seen_ids.len()))]
pub async fn http_next_riddle(State(state): State<Arc<AppState>>, Json(body): Json<NextRiddleIn>) -> Response {
  match next_riddle(&state, &body.user_id, &body.seen_ids).await {
    Ok(sel) => {
      info!(target: "riddle", id = %sel.riddle.id, path = ?sel.path, "HTTP next riddle served");
      Json(NextRiddleOut::from(sel)).into_response()
    }
    Err(SelectError::EmptyCorpus) => (
      StatusCode::NOT_FOUND,
      Json(ErrorOut { error: "empty_corpus", message: SelectError::EmptyCorpus.to_string() }),
    )
      .into_response(),
    Err(SelectError::Store(e)) => store_failure(e),
  }
}

#[instrument(level = "info", skip(state, body), fields(riddle_id = %body.riddle_id))]
pub async fn http_reveal(State(state): State<Arc<AppState>>, Json(body): Json<RevealIn>) -> Response {
  match reveal_answer(&state, &body.riddle_id, body.seen_ids).await {
    Ok(Some((riddle, seen_ids))) => {
      Json(RevealOut { riddle_id: riddle.id, answer: riddle.answer, seen_ids }).into_response()
    }
    Ok(None) => not_found("Riddle"),
    Err(e) => store_failure(e),
  }
}

#[instrument(level = "info", skip(state, body), fields(current = body.current_count))]
pub async fn http_populate_step(State(state): State<Arc<AppState>>, Json(body): Json<PopulateStepIn>) -> Response {
  let res: PopulateStepOut = populate_step(&state, body.current_count, body.target, body.batch_size).await;
  info!(target: "population", success = res.success, new_count = res.new_count, "HTTP populate step done");
  Json(res).into_response()
}
