//! Minimal OpenAI client for our use-cases.
//!
//! We only call chat.completions and request a strict JSON object back.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key.
//!
//! The client implements both remote capabilities:
//!   - `RiddleAdvisor` on the fast model (small prompt, low temperature)
//!   - `RiddleGenerator` on the strong model (creative, high temperature)

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::error::RemoteError;
use crate::remote::{Advice, AdviceRequest, GeneratedBatch, RiddleAdvisor, RiddleGenerator};
use crate::util::{fill_template, trunc_for_log};

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
  pub prompts: Prompts,
}

impl OpenAI {
  pub fn new(
    api_key: String,
    base_url: String,
    fast_model: String,
    strong_model: String,
    prompts: Prompts,
  ) -> Result<Self, RemoteError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .map_err(|e| RemoteError::Transport(e.to_string()))?;
    Ok(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), fast_model, strong_model, prompts })
  }

  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(prompts: Prompts) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let fast_model =
      std::env::var("OPENAI_FAST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let strong_model =
      std::env::var("OPENAI_STRONG_MODEL").unwrap_or_else(|_| "gpt-4o".into());

    match Self::new(api_key, base_url, fast_model, strong_model, prompts) {
      Ok(oa) => Some(oa),
      Err(e) => {
        error!(target: "devinettenet", error = %e, "Failed to build HTTP client for OpenAI");
        None
      }
    }
  }

  /// JSON-object chat completion. Generic over the target type T.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_json<T: for<'a> Deserialize<'a>>(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<T, RemoteError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
      max_tokens: None,
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "devinettenet-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| RemoteError::Transport(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      error!(status, elapsed = ?start.elapsed(), "OpenAI call rejected");
      return Err(RemoteError::Http { status, message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| RemoteError::Malformed(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default();
    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Model response received");

    serde_json::from_str::<T>(&text).map_err(|e| RemoteError::Malformed(format!("JSON parse error: {}", e)))
  }
}

fn join_or(ids: &[String], empty: &str) -> String {
  if ids.is_empty() { empty.to_string() } else { ids.join(", ") }
}

#[async_trait]
impl RiddleAdvisor for OpenAI {
  #[instrument(level = "info", skip(self, req), fields(user_id = %req.user_id, available = req.available_ids.len(), seen = req.seen_ids.len()))]
  async fn advise(&self, req: &AdviceRequest) -> Result<Advice, RemoteError> {
    let available = join_or(&req.available_ids, "None");
    let seen = join_or(&req.seen_ids, "None");
    let user = fill_template(
      &self.prompts.advisor_user_template,
      &[
        ("user_id", req.user_id.as_str()),
        ("available_ids", available.as_str()),
        ("seen_ids", seen.as_str()),
        ("origin", req.origin_hint.as_deref().unwrap_or("Unknown")),
      ],
    );
    let advice: Advice = self.chat_json(&self.fast_model, &self.prompts.advisor_system, &user, 0.3).await?;
    info!(selected = %advice.selected_id, reason_len = advice.reason.len(), "Advisor answered");
    Ok(advice)
  }
}

#[async_trait]
impl RiddleGenerator for OpenAI {
  #[instrument(level = "info", skip(self), fields(model = %self.strong_model))]
  async fn generate(&self, count: usize) -> Result<GeneratedBatch, RemoteError> {
    let count_s = count.to_string();
    let user = fill_template(&self.prompts.generator_user_template, &[("count", count_s.as_str())]);
    let batch: GeneratedBatch = self.chat_json(&self.strong_model, &self.prompts.generator_system, &user, 0.9).await?;
    info!(requested = count, returned = batch.riddles.len(), "Riddle batch generated");
    Ok(batch)
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}
