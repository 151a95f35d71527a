//! Remote model capabilities: the advisor that picks the next riddle and the
//! generator that produces new riddles. Both are injected so tests can use fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

/// Context sent to the advisor.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdviceRequest {
  pub user_id: String,
  /// Every validated riddle id.
  pub available_ids: Vec<String>,
  pub seen_ids: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub origin_hint: Option<String>,
}

/// Advisor answer. The id is not guaranteed to be unseen, or even to exist.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Advice {
  #[serde(alias = "selectedRiddleId")]
  pub selected_id: String,
  #[serde(default)]
  pub reason: String,
}

/// A riddle candidate as returned by the generator.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct GeneratedRiddle {
  #[serde(default)] pub question: String,
  #[serde(default)] pub answer: String,
  #[serde(default)] pub origin: Option<String>,
  #[serde(default)] pub language: Option<String>,
}

/// May hold fewer (or more) riddles than requested, or none at all.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct GeneratedBatch {
  #[serde(default)]
  pub riddles: Vec<GeneratedRiddle>,
}

#[async_trait]
pub trait RiddleAdvisor: Send + Sync {
  async fn advise(&self, req: &AdviceRequest) -> Result<Advice, RemoteError>;
}

#[async_trait]
pub trait RiddleGenerator: Send + Sync {
  async fn generate(&self, count: usize) -> Result<GeneratedBatch, RemoteError>;
}
