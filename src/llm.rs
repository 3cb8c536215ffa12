//! Minimal OpenAI-compatible chat-completions client (Groq by default).
//!
//! We only call chat.completions and request either plain text or a strict JSON object.
//! Calls are instrumented and log model name, latency and token usage (not contents).
//!
//! NOTE: We never log the API key, and payload previews are truncated.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::domain::{ChatTurn, ExamContent, ReadingTest, SpeakingReport, WordAnalysis, WritingReport};
use crate::error::{GenerationError, LlmError};
use crate::session::ContentGenerator;
use crate::util::{fill_template, trunc_for_log};

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Clone)]
pub struct LlmClient {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
}

impl LlmClient {
  /// Construct the client if LLM_API_KEY (or GROQ_API_KEY) is set; otherwise None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("LLM_API_KEY")
      .or_else(|_| std::env::var("GROQ_API_KEY"))
      .ok()
      .filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
    let timeout_secs = std::env::var("LLM_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.parse::<u64>().ok())
      .unwrap_or(DEFAULT_TIMEOUT_SECS);

    match Self::new(api_key, base_url, model, Duration::from_secs(timeout_secs)) {
      Ok(c) => Some(c),
      Err(e) => {
        error!(target: "llm", error = %e, "Failed to build HTTP client; LLM disabled");
        None
      }
    }
  }

  pub fn new(api_key: String, base_url: String, model: String, timeout: Duration) -> Result<Self, LlmError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), model })
  }

  #[instrument(level = "info", skip(self, messages), fields(model = %self.model, turns = messages.len()))]
  async fn complete(&self, messages: Vec<ChatMessageReq>, temperature: f32, json: bool) -> Result<String, LlmError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages,
      temperature,
      response_format: json.then(|| ResponseFormat { r#type: "json_object".into() }),
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "ielts-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_api_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      error!(target: "llm", status, elapsed = ?start.elapsed(), %message, "LLM call failed");
      return Err(LlmError::Status { status, message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(target: "llm", elapsed = ?start.elapsed(), prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "LLM usage");
    }
    let text = body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .unwrap_or_default()
      .trim()
      .to_string();
    if text.is_empty() {
      return Err(LlmError::Empty);
    }
    Ok(text)
  }

  async fn chat_plain(&self, system: &str, user: &str, temperature: f32) -> Result<String, LlmError> {
    self.complete(vec![ChatMessageReq::system(system), ChatMessageReq::user(user)], temperature, false).await
  }

  /// JSON-object completion parsed into T. `system` may be empty.
  async fn chat_json<T: DeserializeOwned>(&self, system: &str, user: &str, temperature: f32) -> Result<T, LlmError> {
    let mut messages = Vec::with_capacity(2);
    if !system.is_empty() {
      messages.push(ChatMessageReq::system(system));
    }
    messages.push(ChatMessageReq::user(user));
    let text = self.complete(messages, temperature, true).await?;
    Ok(serde_json::from_str::<T>(strip_code_fence(&text))?)
  }

  // --- High-level helpers ---

  #[instrument(level = "info", skip(self, prompts), fields(model = %self.model))]
  pub async fn generate_exam(&self, prompts: &Prompts, topic: &str) -> Result<ExamContent, LlmError> {
    let user = fill_template(&prompts.exam_user_template, &[("topic", topic)]);
    let exam: ExamContent = self.chat_json(&prompts.exam_system, &user, 0.7).await?;
    info!(
      target: "llm",
      listening = exam.listening.questions.len(),
      reading = exam.reading.questions.len(),
      speaking = exam.speaking.questions.len(),
      prompt_preview = %trunc_for_log(&exam.writing.prompt, 40),
      "Mock test generated"
    );
    Ok(exam)
  }

  #[instrument(level = "info", skip(self, prompts))]
  pub async fn reading_test(&self, prompts: &Prompts, topic: &str) -> Result<ReadingTest, LlmError> {
    let user = fill_template(&prompts.reading_user_template, &[("topic", topic)]);
    self.chat_json("", &user, 0.7).await
  }

  #[instrument(level = "info", skip(self, prompts))]
  pub async fn writing_question(&self, prompts: &Prompts, topic: &str) -> Result<String, LlmError> {
    self.chat_plain(&prompts.writing_prompt_system, &format!("Topic: {}", topic), 0.7).await
  }

  #[instrument(level = "info", skip(self, prompts, question, essay), fields(question_len = question.len(), essay_len = essay.len()))]
  pub async fn grade_writing(&self, prompts: &Prompts, question: &str, essay: &str) -> Result<WritingReport, LlmError> {
    let user = fill_template(&prompts.writing_grade_user_template, &[("question", question), ("essay", essay)]);
    self.chat_json(&prompts.writing_grade_system, &user, 0.2).await
  }

  /// Next examiner turn for the speaking interview.
  #[instrument(level = "info", skip(self, prompts, turns), fields(turns = turns.len()))]
  pub async fn examiner_reply(&self, prompts: &Prompts, topic: &str, turns: &[ChatTurn]) -> Result<String, LlmError> {
    let system = fill_template(&prompts.speaking_chat_system_template, &[("topic", topic)]);
    let mut messages = vec![ChatMessageReq::system(&system)];
    messages.extend(turns.iter().map(|t| ChatMessageReq { role: chat_role(&t.role).into(), content: t.content.clone() }));
    self.complete(messages, 0.7, false).await
  }

  #[instrument(level = "info", skip(self, prompts, transcript), fields(transcript_len = transcript.len()))]
  pub async fn grade_speaking(&self, prompts: &Prompts, topic: &str, transcript: &str) -> Result<SpeakingReport, LlmError> {
    let user = fill_template(&prompts.speaking_grade_user_template, &[("topic", topic), ("transcript", transcript)]);
    self.chat_json(&prompts.speaking_grade_system, &user, 0.2).await
  }

  #[instrument(level = "info", skip(self, prompts))]
  pub async fn analyze_word(&self, prompts: &Prompts, word: &str) -> Result<WordAnalysis, LlmError> {
    let user = fill_template(&prompts.vocabulary_user_template, &[("word", word)]);
    self.chat_json("", &user, 0.1).await
  }
}

/// Mock-test content from the LLM.
pub struct LlmGenerator {
  client: LlmClient,
  prompts: Prompts,
}

impl LlmGenerator {
  pub fn new(client: LlmClient, prompts: Prompts) -> Self {
    Self { client, prompts }
  }
}

#[async_trait]
impl ContentGenerator for LlmGenerator {
  async fn generate_exam(&self, topic: &str) -> Result<ExamContent, GenerationError> {
    Ok(self.client.generate_exam(&self.prompts, topic).await?)
  }

  fn name(&self) -> &str {
    "llm"
  }
}

/// Interview transcripts label the model's turns "examiner".
fn chat_role(role: &str) -> &'static str {
  if role == "examiner" { "assistant" } else { "user" }
}

/// Some models wrap JSON in a markdown fence even in JSON mode.
fn strip_code_fence(text: &str) -> &str {
  let t = text.trim();
  let Some(rest) = t.strip_prefix("```") else { return t };
  let rest = rest.strip_prefix("json").unwrap_or(rest);
  rest.strip_suffix("```").unwrap_or(rest).trim()
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
impl ChatMessageReq {
  fn system(content: &str) -> Self { Self { role: "system".into(), content: content.into() } }
  fn user(content: &str) -> Self { Self { role: "user".into(), content: content.into() } }
}
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

/// Try to extract a clean error message from an OpenAI-style error body.
fn extract_api_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn examiner_turns_become_assistant() {
    assert_eq!(chat_role("examiner"), "assistant");
    assert_eq!(chat_role("candidate"), "user");
    assert_eq!(chat_role("user"), "user");
  }

  #[test]
  fn strips_markdown_fences() {
    assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
    assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
  }

  #[test]
  fn extracts_provider_error_message() {
    let body = r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error"}}"#;
    assert_eq!(extract_api_error(body).as_deref(), Some("Invalid API Key"));
    assert_eq!(extract_api_error("<html>bad gateway</html>"), None);
  }

  #[test]
  fn request_omits_response_format_for_plain_text() {
    let req = ChatCompletionRequest {
      model: DEFAULT_MODEL.into(),
      messages: vec![ChatMessageReq::user("hi")],
      temperature: 0.7,
      response_format: None,
    };
    let v = serde_json::to_value(&req).unwrap();
    assert!(v.get("response_format").is_none());
    assert_eq!(v["messages"][0]["role"], "user");
  }

  #[test]
  fn grading_reports_tolerate_missing_fields() {
    let r: WritingReport = serde_json::from_str(r#"{"overall_score": 6.5, "general_comment": "ok"}"#).unwrap();
    assert_eq!(r.overall_score, 6.5);
    assert!(r.detailed_corrections.is_empty());
  }

  #[test]
  fn client_trims_trailing_slash() {
    let c = LlmClient::new("k".into(), "http://localhost:9/v1/".into(), "m".into(), Duration::from_secs(1)).unwrap();
    assert_eq!(c.base_url, "http://localhost:9/v1");
  }
}
