//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. Most requests get a single JSON reply; `populate`
//! streams progress events and ends with `population_done`.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{SelectError, SubmissionError};
use crate::logic::*;
use crate::population::{PopulationPhase, PopulationProgress, PopulationReport};
use crate::protocol::{to_out, ClientWsMessage, NextRiddleOut, RevealOut, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "devinettenet", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn send_json(socket: &mut WebSocket, msg: &ServerWsMessage) -> Result<(), axum::Error> {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  socket.send(Message::Text(out)).await
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "devinettenet", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let sent = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(ClientWsMessage::Populate { current_count }) => stream_population(&mut socket, &state, current_count).await,
          Ok(incoming) => {
            debug!(target: "devinettenet", "WS received: {:?}", &incoming);
            let reply = handle_client_ws(incoming, &state).await;
            send_json(&mut socket, &reply).await
          }
          Err(e) => send_json(&mut socket, &ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }).await,
        };
        if let Err(e) = sent {
          error!(target: "devinettenet", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "devinettenet", "WebSocket disconnected");
}

/// Run the population driver in a task and relay its progress to this socket.
/// A failed send aborts the run so no batch is committed behind the client's back.
async fn stream_population(socket: &mut WebSocket, state: &Arc<AppState>, start_count: usize) -> Result<(), axum::Error> {
  let (mut rx, run) = spawn_population(state, start_count);

  while let Some(progress) = rx.recv().await {
    if let Err(e) = send_json(socket, &ServerWsMessage::PopulationProgress { progress }).await {
      warn!(target: "population", error = %e, "Client left during population; aborting run");
      run.abort();
      return Err(e);
    }
  }

  let report = finish_population(run, start_count).await;
  info!(target: "population", phase = ?report.phase, count = report.count, attempts = report.attempts, "WS population finished");
  send_json(socket, &ServerWsMessage::PopulationDone { report }).await
}

/// Start the driver on its own task. It stops once the returned receiver is dropped.
fn spawn_population(
  state: &Arc<AppState>,
  start_count: usize,
) -> (mpsc::UnboundedReceiver<PopulationProgress>, JoinHandle<PopulationReport>) {
  let (tx, rx) = mpsc::unbounded_channel();
  let st = state.clone();
  let run = tokio::spawn(async move {
    let plan = st.plan.clone();
    populate_run(&st, &plan, start_count, Some(&tx)).await
  });
  (rx, run)
}

async fn finish_population(run: JoinHandle<PopulationReport>, start_count: usize) -> PopulationReport {
  run.await.unwrap_or_else(|e| {
    warn!(target: "population", error = %e, "Population task aborted");
    PopulationReport {
      phase: PopulationPhase::Error,
      count: start_count,
      attempts: 0,
      message: format!("Population task aborted: {}", e),
    }
  })
}

#[instrument(level = "info", skip(state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::NextRiddle { user_id, seen_ids } => match next_riddle(state, &user_id, &seen_ids).await {
      Ok(sel) => {
        info!(target: "riddle", id = %sel.riddle.id, path = ?sel.path, "WS next_riddle served");
        ServerWsMessage::Riddle { next: NextRiddleOut::from(sel) }
      }
      Err(SelectError::EmptyCorpus) => ServerWsMessage::EmptyCorpus,
      Err(SelectError::Store(e)) => ServerWsMessage::Error { message: e.to_string() },
    },

    ClientWsMessage::Reveal { riddle_id, seen_ids } => match reveal_answer(state, &riddle_id, seen_ids).await {
      Ok(Some((riddle, seen_ids))) => ServerWsMessage::Revealed {
        reveal: RevealOut { riddle_id: riddle.id, answer: riddle.answer, seen_ids },
      },
      Ok(None) => ServerWsMessage::Error { message: format!("Riddle {} not found", riddle_id) },
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },

    ClientWsMessage::SubmitRiddle { draft } => match submit_riddle(state, draft).await {
      Ok(created) => ServerWsMessage::Submitted { riddle: to_out(&created, true) },
      Err(SubmissionError::Invalid(issues)) => ServerWsMessage::SubmissionRejected { issues },
      Err(SubmissionError::Store(e)) => ServerWsMessage::Error { message: e.to_string() },
    },

    // Streamed by the socket loop.
    ClientWsMessage::Populate { .. } => ServerWsMessage::Error { message: "populate must be streamed".into() },
  }
}
