//! Error taxonomy shared by the store, the remote model capabilities and the core procedures.

use thiserror::Error;

/// Failure reported by a `RiddleStore` implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
  #[error("storage backend error: {0}")]
  Backend(String),
  #[error("write rejected: {0}")]
  Rejected(String),
}

/// Failure of a remote advisor or generator call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
  #[error("remote model not configured")]
  Unavailable,
  #[error("transport error: {0}")]
  Transport(String),
  #[error("model HTTP {status}: {message}")]
  Http { status: u16, message: String },
  #[error("malformed model response: {0}")]
  Malformed(String),
}

/// Failure of the adaptive selector. Advisor problems never show up here.
#[derive(Debug, Error)]
pub enum SelectError {
  #[error("no validated riddle available")]
  EmptyCorpus,
  #[error(transparent)]
  Store(#[from] StoreError),
}

/// One rejected field of a submitted riddle.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldIssue {
  pub field: &'static str,
  pub message: String,
}

#[derive(Debug, Error)]
pub enum SubmissionError {
  #[error("invalid submission ({} issue(s))", .0.len())]
  Invalid(Vec<FieldIssue>),
  #[error(transparent)]
  Store(#[from] StoreError),
}
