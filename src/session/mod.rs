//! Mock-test session: phase machine, countdown, answer buffers, recordings and scoring.

pub mod collab;
pub mod controller;
pub mod timer;

pub use collab::{
  CaptureHandle, Collaborators, CompletionCallback, ContentGenerator, MediaCapture, Narrator,
  NewResult, ResultSink,
};
pub use controller::{AnswerState, ExamSessionController, SessionPhase, SessionSnapshot};
pub use timer::{format_clock, Countdown};
