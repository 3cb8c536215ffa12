//! Error types for the exam session, its collaborators, the LLM client and the HTTP surface.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::session::SessionPhase;

/// Why exam content could not be adopted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
  #[error("content service error: {0}")]
  Upstream(String),

  #[error("content service returned an empty payload")]
  Empty,

  #[error("malformed exam payload: {0}")]
  Malformed(String),
}

/// Media capture failures reported by the platform.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
  #[error("microphone permission denied")]
  PermissionDenied,

  #[error("capture device error: {0}")]
  Device(String),

  #[error("no active recording for this handle")]
  UnknownHandle,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistError {
  #[error("result store error: {0}")]
  Store(String),
}

/// Rejections raised by the exam session controller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExamError {
  #[error("topic must not be empty")]
  EmptyTopic,

  #[error("'{action}' is not allowed in phase {phase}")]
  WrongPhase { phase: SessionPhase, action: &'static str },

  #[error("no exam content loaded")]
  NoContent,

  #[error("question {index} is out of range ({len} questions)")]
  QuestionOutOfRange { index: usize, len: usize },

  #[error("'{option}' is not one of the options for question {index}")]
  UnknownOption { index: usize, option: String },

  #[error("question {active} is already recording")]
  RecordingBusy { active: usize },

  #[error(transparent)]
  Generation(#[from] GenerationError),

  #[error(transparent)]
  Capture(#[from] CaptureError),
}

/// Errors from the chat-completions client.
#[derive(Error, Debug)]
pub enum LlmError {
  #[error("LLM request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("LLM HTTP {status}: {message}")]
  Status { status: u16, message: String },

  #[error("LLM JSON parse error: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("LLM returned no content")]
  Empty,
}

impl From<LlmError> for GenerationError {
  fn from(err: LlmError) -> Self {
    match err {
      LlmError::Parse(e) => GenerationError::Malformed(e.to_string()),
      LlmError::Empty => GenerationError::Empty,
      other => GenerationError::Upstream(other.to_string()),
    }
  }
}

/// HTTP-facing error. Rendered as `{ "error": "..." }`.
#[derive(Error, Debug)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),

  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  Unavailable(String),

  #[error(transparent)]
  Llm(#[from] LlmError),

  #[error(transparent)]
  Generation(#[from] GenerationError),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::Llm(_) | ApiError::Generation(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn llm_errors_map_to_generation_failures() {
    let parse = serde_json::from_str::<u8>("nope").unwrap_err();
    assert!(matches!(GenerationError::from(LlmError::Parse(parse)), GenerationError::Malformed(_)));
    assert_eq!(GenerationError::from(LlmError::Empty), GenerationError::Empty);

    let status = LlmError::Status { status: 429, message: "rate limited".into() };
    assert_eq!(
      GenerationError::from(status),
      GenerationError::Upstream("LLM HTTP 429: rate limited".into())
    );
  }

  #[test]
  fn wrong_phase_message_names_phase_and_action() {
    let err = ExamError::WrongPhase { phase: SessionPhase::Setup, action: "submit_all" };
    assert_eq!(err.to_string(), "'submit_all' is not allowed in phase setup");
  }

  #[test]
  fn api_error_status_codes() {
    assert_eq!(ApiError::BadRequest("x".into()).into_response().status(), StatusCode::BAD_REQUEST);
    assert_eq!(ApiError::NotFound("x".into()).into_response().status(), StatusCode::NOT_FOUND);
    assert_eq!(ApiError::Unavailable("x".into()).into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(ApiError::Generation(GenerationError::Empty).into_response().status(), StatusCode::BAD_GATEWAY);
  }
}
