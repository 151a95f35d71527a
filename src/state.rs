//! Application state: riddle store, optional model capabilities, population plan.
//!
//! This module owns:
//!   - the riddle store (SQLite when a database path is configured, in-memory otherwise)
//!   - the advisor and generator (both backed by the OpenAI client when a key is present)
//!   - the population plan and origin hint from config
//!
//! Without OpenAI, selection degrades to random picks and population is unavailable.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::{load_app_config_from_env, AppConfig};
use crate::domain::{NewRiddle, RiddleFilter};
use crate::error::StoreError;
use crate::openai::OpenAI;
use crate::population::{normalize_candidate, PopulationPlan};
use crate::remote::{GeneratedRiddle, RiddleAdvisor, RiddleGenerator};
use crate::seeds::seed_riddles;
use crate::store::{MemoryStore, RiddleStore, SqliteStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RiddleStore>,
    pub advisor: Option<Arc<dyn RiddleAdvisor>>,
    pub generator: Option<Arc<dyn RiddleGenerator>>,
    pub plan: PopulationPlan,
    pub origin_hint: Option<String>,
}

impl AppState {
    /// State with the given store, no model capabilities and default plan.
    pub fn new(store: Arc<dyn RiddleStore>) -> Self {
        Self {
            store,
            advisor: None,
            generator: None,
            plan: PopulationPlan::default(),
            origin_hint: None,
        }
    }

    /// Build state from env: load config, open the store, seed it if empty, init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub async fn from_env() -> Result<Self, StoreError> {
        let cfg = load_app_config_from_env().unwrap_or_default();

        let db_path = std::env::var("DATABASE_PATH").ok().or_else(|| cfg.database_path.clone());
        let store: Arc<dyn RiddleStore> = match &db_path {
            Some(path) => Arc::new(SqliteStore::open(path)?),
            None => {
                info!(target: "devinettenet", "No DATABASE_PATH; using in-memory riddle store.");
                Arc::new(MemoryStore::new())
            }
        };

        let mut state = Self::new(store);
        state.plan = cfg.population.plan();
        state.origin_hint = cfg.selection.origin_hint.clone();

        let bank = startup_bank(&cfg);
        let inserted = state.seed_if_empty(bank).await?;
        let validated = state.store.list(&RiddleFilter::validated()).await?.len();
        info!(target: "riddle", inserted, validated, "Startup riddle inventory");

        // Build optional OpenAI client (if API key present).
        match OpenAI::from_env(cfg.prompts.clone()) {
            Some(oa) => {
                info!(target: "devinettenet", base_url = %oa.base_url, fast_model = %oa.fast_model, strong_model = %oa.strong_model, "OpenAI enabled.");
                let oa = Arc::new(oa);
                state.advisor = Some(oa.clone() as Arc<dyn RiddleAdvisor>);
                state.generator = Some(oa as Arc<dyn RiddleGenerator>);
            }
            None => {
                info!(target: "devinettenet", "OpenAI disabled (no OPENAI_API_KEY). Random selection only; population unavailable.");
            }
        }

        Ok(state)
    }

    /// Commit `bank` as one validated batch when the store holds no riddles at all.
    /// Returns how many riddles were inserted.
    #[instrument(level = "info", skip(self, bank), fields(bank_len = bank.len()))]
    pub async fn seed_if_empty(&self, bank: Vec<GeneratedRiddle>) -> Result<usize, StoreError> {
        if !self.store.list(&RiddleFilter::default()).await?.is_empty() {
            return Ok(0);
        }
        let batch: Vec<NewRiddle> = bank.into_iter().filter_map(normalize_candidate).collect();
        if batch.is_empty() {
            warn!(target: "riddle", "Store is empty and no starter riddles are configured");
            return Ok(0);
        }
        Ok(self.store.commit_batch(batch).await?.len())
    }
}

/// Config bank first, then the built-in seeds if enabled.
fn startup_bank(cfg: &AppConfig) -> Vec<GeneratedRiddle> {
    let mut bank: Vec<GeneratedRiddle> = cfg.riddles.iter().cloned().map(Into::into).collect();
    if cfg.seed_builtin {
        bank.extend(seed_riddles());
    }
    bank
}
