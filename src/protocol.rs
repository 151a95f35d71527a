//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::domain::{Riddle, RiddleDraft, RiddleFilter, RiddleStatus};
use crate::error::FieldIssue;
use crate::history::ViewHistory;
use crate::population::{BatchResult, PopulationProgress, PopulationReport};
use crate::selector::{Selection, SelectionPath};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
  Ping,
  NextRiddle {
    #[serde(rename = "userId", default)]
    user_id: String,
    #[serde(rename = "seenIds", default)]
    seen_ids: ViewHistory,
  },
  Reveal {
    #[serde(rename = "riddleId")]
    riddle_id: String,
    #[serde(rename = "seenIds", default)]
    seen_ids: ViewHistory,
  },
  SubmitRiddle {
    #[serde(flatten)]
    draft: RiddleDraft,
  },
  Populate {
    #[serde(rename = "currentCount")]
    current_count: usize,
  },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
  Pong,
  Riddle {
    #[serde(flatten)]
    next: NextRiddleOut,
  },
  EmptyCorpus,
  Revealed {
    #[serde(flatten)]
    reveal: RevealOut,
  },
  Submitted {
    riddle: RiddleOut,
  },
  SubmissionRejected {
    issues: Vec<FieldIssue>,
  },
  PopulationProgress {
    #[serde(flatten)]
    progress: PopulationProgress,
  },
  PopulationDone {
    #[serde(flatten)]
    report: PopulationReport,
  },
  Error {
    message: String,
  },
}

/// Riddle as delivered to clients. The answer is only present where it is revealed.
#[derive(Debug, Serialize)]
pub struct RiddleOut {
  pub id: String,
  pub question: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub answer: Option<String>,
  pub origin: String,
  pub language: String,
  pub status: RiddleStatus,
}

pub fn to_out(r: &Riddle, include_answer: bool) -> RiddleOut {
  RiddleOut {
    id: r.id.clone(),
    question: r.question.clone(),
    answer: include_answer.then(|| r.answer.clone()),
    origin: r.origin.clone(),
    language: r.language.clone(),
    status: r.status,
  }
}

// ---------- HTTP DTOs ----------

#[derive(Serialize)]
pub struct HealthOut { pub ok: bool }

#[derive(Debug, Default, Deserialize)]
pub struct ExploreQuery {
  pub search: Option<String>,
  pub origin: Option<String>,
  pub language: Option<String>,
}

impl ExploreQuery {
  /// Empty parameters mean "no constraint".
  pub fn into_filter(self) -> RiddleFilter {
    let keep = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    RiddleFilter {
      status: None,
      origin: keep(self.origin),
      language: keep(self.language),
      search: keep(self.search),
    }
  }
}

#[derive(Serialize)]
pub struct RiddleListOut { pub riddles: Vec<RiddleOut> }

#[derive(Serialize)]
pub struct OriginsOut { pub origins: Vec<String> }

#[derive(Serialize)]
pub struct LanguagesOut { pub languages: Vec<String> }

#[derive(Debug, Deserialize)]
pub struct NextRiddleIn {
  #[serde(rename = "userId", default)]
  pub user_id: String,
  #[serde(rename = "seenIds", default)]
  pub seen_ids: ViewHistory,
}

#[derive(Debug, Serialize)]
pub struct NextRiddleOut {
  pub riddle: RiddleOut,
  pub path: SelectionPath,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
  /// The client should clear its history: every riddle had been seen.
  #[serde(rename = "historyReset")]
  pub history_reset: bool,
}

impl From<Selection> for NextRiddleOut {
  fn from(s: Selection) -> Self {
    Self {
      riddle: to_out(&s.riddle, false),
      path: s.path,
      reason: s.reason,
      history_reset: s.history_exhausted,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct RevealIn {
  #[serde(rename = "riddleId")]
  pub riddle_id: String,
  #[serde(rename = "seenIds", default)]
  pub seen_ids: ViewHistory,
}

#[derive(Debug, Serialize)]
pub struct RevealOut {
  #[serde(rename = "riddleId")]
  pub riddle_id: String,
  pub answer: String,
  #[serde(rename = "seenIds")]
  pub seen_ids: ViewHistory,
}

#[derive(Serialize)]
pub struct SubmissionRejectedOut {
  pub error: &'static str,
  pub issues: Vec<FieldIssue>,
}

#[derive(Serialize)]
pub struct ErrorOut {
  pub error: &'static str,
  pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct PopulateStepIn {
  #[serde(rename = "currentCount")]
  pub current_count: usize,
  pub target: Option<usize>,
  #[serde(rename = "batchSize")]
  pub batch_size: Option<usize>,
}

pub type PopulateStepOut = BatchResult;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn client_messages_parse_from_wire_names() {
    let m: ClientWsMessage =
      serde_json::from_str(r#"{"type":"next_riddle","userId":"u1","seenIds":["a","b","a"]}"#).unwrap();
    match m {
      ClientWsMessage::NextRiddle { user_id, seen_ids } => {
        assert_eq!(user_id, "u1");
        assert_eq!(seen_ids.len(), 2);
      }
      other => panic!("unexpected {other:?}"),
    }

    let m: ClientWsMessage = serde_json::from_str(
      r#"{"type":"submit_riddle","question":"What walks without legs?","answer":"Time","origin":"Mali"}"#,
    )
    .unwrap();
    assert!(matches!(m, ClientWsMessage::SubmitRiddle { draft } if draft.answer == "Time" && draft.language.is_none()));
  }

  #[test]
  fn play_riddle_hides_answer() {
    let r = Riddle {
      id: "r1".into(),
      question: "Who speaks every language?".into(),
      answer: "An echo".into(),
      origin: "Togo".into(),
      language: "Ewe".into(),
      category: None,
      status: RiddleStatus::Validated,
    };
    let hidden = serde_json::to_value(to_out(&r, false)).unwrap();
    assert!(hidden.get("answer").is_none());
    let shown = serde_json::to_value(to_out(&r, true)).unwrap();
    assert_eq!(shown["answer"], "An echo");
  }

  #[test]
  fn explore_query_drops_blank_params() {
    let f = ExploreQuery { search: Some("  ".into()), origin: Some(" Mali ".into()), language: None }.into_filter();
    assert_eq!(f.search, None);
    assert_eq!(f.origin.as_deref(), Some("Mali"));
  }
}
