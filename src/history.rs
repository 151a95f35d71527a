//! Per-device view history: an ordered set of riddle ids already revealed.
//! The client owns it; the server only receives it and hands back the updated value.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ViewHistory {
  ids: Vec<String>,
}

impl ViewHistory {
  pub fn new() -> Self { Self::default() }

  /// Append `id` unless already present. Returns true if it was added.
  pub fn record(&mut self, id: &str) -> bool {
    if self.contains(id) { return false; }
    self.ids.push(id.to_string());
    true
  }

  pub fn contains(&self, id: &str) -> bool {
    self.ids.iter().any(|s| s == id)
  }

  /// Reset to empty once every riddle has been seen.
  pub fn clear(&mut self) {
    self.ids.clear();
  }

  pub fn ids(&self) -> &[String] { &self.ids }
  pub fn len(&self) -> usize { self.ids.len() }
  pub fn is_empty(&self) -> bool { self.ids.is_empty() }
}

impl From<Vec<String>> for ViewHistory {
  /// Keeps first occurrences, drops duplicates.
  fn from(ids: Vec<String>) -> Self {
    let mut h = ViewHistory::new();
    for id in ids {
      h.record(&id);
    }
    h
  }
}

impl From<ViewHistory> for Vec<String> {
  fn from(h: ViewHistory) -> Self { h.ids }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn record_keeps_order_and_skips_duplicates() {
    let mut h = ViewHistory::new();
    assert!(h.record("b"));
    assert!(h.record("a"));
    assert!(!h.record("b"));
    assert_eq!(h.ids(), &["b".to_string(), "a".to_string()]);
  }

  #[test]
  fn from_vec_dedupes() {
    let h = ViewHistory::from(vec!["x".into(), "y".into(), "x".into()]);
    assert_eq!(h.len(), 2);
    assert!(h.contains("y"));
  }

  #[test]
  fn deserializes_from_plain_array() {
    let mut h: ViewHistory = serde_json::from_str(r#"["r1","r2"]"#).unwrap();
    assert_eq!(h.len(), 2);
    h.clear();
    assert!(h.is_empty());
    assert_eq!(serde_json::to_string(&h).unwrap(), "[]");
  }
}
