//! Collaborator contracts of the exam session controller.
//!
//! Implementations:
//! - content: `llm::LlmGenerator` (chat completions) or `seeds::TemplateGenerator` (offline)
//! - narration and capture: `routes::bridge` (browser over WebSocket)
//! - persistence: `store::UserResultSink`

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::{AudioBlob, ExamContent};
use crate::error::{CaptureError, GenerationError, PersistError};
use crate::scoring::ScoreReport;

/// Produces mock-test content for a topic.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
  async fn generate_exam(&self, topic: &str) -> Result<ExamContent, GenerationError>;

  /// Name for logging.
  fn name(&self) -> &str;
}

/// Text-to-speech. Fire-and-forget; nothing it does feeds back into scoring.
pub trait Narrator: Send + Sync {
  fn speak(&self, text: &str);
  fn cancel(&self);
}

/// Opaque token for an in-progress recording.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CaptureHandle(pub u64);

/// Permission-gated audio capture, one recording per handle.
#[async_trait]
pub trait MediaCapture: Send + Sync {
  async fn start_recording(&self, question_index: usize) -> Result<CaptureHandle, CaptureError>;
  async fn stop_recording(&self, handle: CaptureHandle) -> Result<AudioBlob, CaptureError>;
}

/// Score row handed to persistence.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct NewResult {
  pub skill: String,
  pub score: f32,
  pub topic: String,
}

#[async_trait]
pub trait ResultSink: Send + Sync {
  async fn save_result(&self, result: NewResult) -> Result<(), PersistError>;
}

pub type CompletionCallback = Arc<dyn Fn(&ScoreReport) + Send + Sync>;

#[derive(Clone)]
pub struct Collaborators {
  pub generator: Arc<dyn ContentGenerator>,
  pub narrator: Arc<dyn Narrator>,
  pub capture: Arc<dyn MediaCapture>,
  pub sink: Arc<dyn ResultSink>,
}
