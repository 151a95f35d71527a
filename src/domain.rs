//! Domain models: riddles, their moderation status, drafts and listing filters.

use serde::{Deserialize, Serialize};

use crate::error::FieldIssue;

pub const MIN_QUESTION_CHARS: usize = 10;

/// Moderation state of a riddle.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RiddleStatus {
  /// Awaiting moderation; never shown to players.
  Pending,
  /// Eligible for listing and selection.
  Validated,
}

impl RiddleStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      RiddleStatus::Pending => "pending",
      RiddleStatus::Validated => "validated",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "pending" => Some(RiddleStatus::Pending),
      "validated" => Some(RiddleStatus::Validated),
      _ => None,
    }
  }
}

/// A stored riddle. `id` is assigned by the store.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Riddle {
  pub id: String,
  pub question: String,
  pub answer: String,
  // Empty string = unknown.
  #[serde(default)] pub origin: String,
  #[serde(default)] pub language: String,
  // Legacy, no write path fills it.
  #[serde(default)] pub category: Option<String>,
  pub status: RiddleStatus,
}

impl Riddle {
  pub fn is_validated(&self) -> bool {
    self.status == RiddleStatus::Validated
  }
}

/// A riddle about to be written; the store turns it into a `Riddle` with a fresh id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRiddle {
  pub question: String,
  pub answer: String,
  pub origin: String,
  pub language: String,
  pub status: RiddleStatus,
}

/// User-submitted riddle as it arrives from the submission form.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RiddleDraft {
  pub question: String,
  pub answer: String,
  #[serde(default)] pub origin: Option<String>,
  #[serde(default)] pub language: Option<String>,
}

impl RiddleDraft {
  /// Check the form rules: question at least 10 chars, answer required.
  /// Every failing field is reported.
  pub fn validate(&self) -> Result<(), Vec<FieldIssue>> {
    let mut issues = Vec::new();
    if self.question.trim().chars().count() < MIN_QUESTION_CHARS {
      issues.push(FieldIssue {
        field: "question",
        message: format!("Riddle must be at least {} characters long.", MIN_QUESTION_CHARS),
      });
    }
    if self.answer.trim().is_empty() {
      issues.push(FieldIssue { field: "answer", message: "Answer is required.".into() });
    }
    if issues.is_empty() { Ok(()) } else { Err(issues) }
  }

  /// Normalize into a pending `NewRiddle` (user content always awaits moderation).
  pub fn into_pending(self) -> NewRiddle {
    NewRiddle {
      question: self.question.trim().to_string(),
      answer: self.answer.trim().to_string(),
      origin: self.origin.map(|s| s.trim().to_string()).unwrap_or_default(),
      language: self.language.map(|s| s.trim().to_string()).unwrap_or_default(),
      status: RiddleStatus::Pending,
    }
  }
}

/// Listing filter. All set criteria must match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RiddleFilter {
  pub status: Option<RiddleStatus>,
  pub origin: Option<String>,
  pub language: Option<String>,
  /// Case-insensitive substring of the question.
  pub search: Option<String>,
}

impl RiddleFilter {
  pub fn validated() -> Self {
    Self { status: Some(RiddleStatus::Validated), ..Default::default() }
  }

  pub fn matches(&self, r: &Riddle) -> bool {
    if let Some(st) = self.status {
      if r.status != st { return false; }
    }
    if let Some(o) = &self.origin {
      if &r.origin != o { return false; }
    }
    if let Some(l) = &self.language {
      if &r.language != l { return false; }
    }
    self.matches_search(r)
  }

  pub fn matches_search(&self, r: &Riddle) -> bool {
    match self.search.as_deref().map(str::trim) {
      Some(term) if !term.is_empty() => r.question.to_lowercase().contains(&term.to_lowercase()),
      _ => true,
    }
  }
}
