//! Loading service configuration (prompts, population plan, selection hints,
//! storage location and an optional riddle bank) from TOML.
//!
//! See `AppConfig` and `Prompts` for expected schema.

use std::time::Duration;

use serde::Deserialize;
use tracing::{info, error};

use crate::population::PopulationPlan;
use crate::remote::GeneratedRiddle;

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub population: PopulationCfg,
  #[serde(default)]
  pub selection: SelectionCfg,
  /// Insert the built-in starter riddles when the store is empty.
  #[serde(default = "default_true")]
  pub seed_builtin: bool,
  /// SQLite file. Absent = in-memory store.
  #[serde(default)]
  pub database_path: Option<String>,
  /// Riddles inserted (validated) into an empty store at startup.
  #[serde(default)]
  pub riddles: Vec<RiddleCfg>,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      prompts: Prompts::default(),
      population: PopulationCfg::default(),
      selection: SelectionCfg::default(),
      seed_builtin: true,
      database_path: None,
      riddles: Vec::new(),
    }
  }
}

fn default_true() -> bool { true }

/// Bank entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct RiddleCfg {
  pub question: String,
  pub answer: String,
  #[serde(default)] pub origin: Option<String>,
  #[serde(default)] pub language: Option<String>,
}

impl From<RiddleCfg> for GeneratedRiddle {
  fn from(c: RiddleCfg) -> Self {
    GeneratedRiddle { question: c.question, answer: c.answer, origin: c.origin, language: c.language }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PopulationCfg {
  pub target: usize,
  pub batch_size: usize,
  pub cooldown_secs: u64,
  pub max_attempts: u32,
}

impl Default for PopulationCfg {
  fn default() -> Self {
    let plan = PopulationPlan::default();
    Self {
      target: plan.target,
      batch_size: plan.batch_size,
      cooldown_secs: plan.cooldown.as_secs(),
      max_attempts: plan.max_attempts,
    }
  }
}

impl PopulationCfg {
  pub fn plan(&self) -> PopulationPlan {
    PopulationPlan {
      target: self.target,
      batch_size: self.batch_size,
      cooldown: Duration::from_secs(self.cooldown_secs),
      max_attempts: self.max_attempts,
    }
  }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SelectionCfg {
  /// Origin the advisor should favour, e.g. "Cameroon".
  #[serde(default)]
  pub origin_hint: Option<String>,
}

/// Prompts used by the OpenAI client. Defaults target African folklore riddles.
/// Override them in TOML to change tone or corpus.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  // Adaptive selection
  pub advisor_system: String,
  pub advisor_user_template: String,
  // Bulk generation
  pub generator_system: String,
  pub generator_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      advisor_system: "You are an expert in selecting riddles for users in a personalized and engaging way. Respond ONLY with strict JSON.".into(),
      advisor_user_template: "Select the most suitable riddle ID for this user.\n\nUser ID: {user_id}\nAvailable Riddle IDs: {available_ids}\nPast Riddle IDs: {seen_ids}\nUser Origin: {origin}\n\nConsider:\n- Prioritize riddles the user has not seen before.\n- If the user has an origin, prioritize riddles from that origin.\n- Keep a variety of riddle origins so the quiz stays fresh.\n\nReturn JSON: {\"selectedId\": string, \"reason\": string}".into(),
      generator_system: "You are a cultural expert specializing in African folklore and traditions. Respond ONLY with strict JSON.".into(),
      generator_user_template: "Generate {count} unique riddles from various African countries. Ensure a diverse representation of countries and cultures. For each riddle provide a question, a concise answer, the country of origin, and the primary language it is told in. Do not repeat riddles.\n\nReturn JSON: {\"riddles\": [{\"question\": string, \"answer\": string, \"origin\": string, \"language\": string}]}".into(),
    }
  }
}

pub fn parse_app_config(s: &str) -> Result<AppConfig, toml::de::Error> {
  toml::from_str::<AppConfig>(s)
}

/// Attempt to load `AppConfig` from DEVINETTE_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_app_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("DEVINETTE_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_app_config(&s) {
      Ok(cfg) => {
        info!(target: "devinettenet", %path, "Loaded service config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "devinettenet", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "devinettenet", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
