//! Exam session controller.
//!
//! Drives one user through the timed four-skill mock test:
//!
//! ```text
//! Setup -> Generating -> Written -> Speaking -> Results
//!             ^   |                                |
//!             +---+ (failed generation, retry)     +--> Setup (restart)
//! ```
//!
//! All state lives in this struct and every transition is a direct method call,
//! so the host (a WebSocket task) owns it exclusively and needs no locking.
//! Grading is local and rule-based (see `scoring`), never delegated to the LLM.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::collab::{CaptureHandle, Collaborators, CompletionCallback, ContentGenerator, NewResult};
use super::timer::Countdown;
use crate::config::ExamSettings;
use crate::domain::{AudioBlob, ExamContent, Section, Skill};
use crate::error::{ExamError, GenerationError};
use crate::scoring::ScoreReport;
use crate::util::word_count;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
  Setup,
  Generating,
  Written,
  Speaking,
  Results,
}

impl SessionPhase {
  pub fn as_str(&self) -> &'static str {
    match self {
      SessionPhase::Setup => "setup",
      SessionPhase::Generating => "generating",
      SessionPhase::Written => "written",
      SessionPhase::Speaking => "speaking",
      SessionPhase::Results => "results",
    }
  }
}

impl fmt::Display for SessionPhase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Answers collected during one session. A missing key means unanswered.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnswerState {
  pub listening: BTreeMap<usize, String>,
  pub reading: BTreeMap<usize, String>,
  pub writing: String,
  pub recordings: BTreeMap<usize, AudioBlob>,
}

impl AnswerState {
  pub fn is_empty(&self) -> bool {
    self.listening.is_empty() && self.reading.is_empty() && self.writing.is_empty() && self.recordings.is_empty()
  }

  fn section_mut(&mut self, section: Section) -> &mut BTreeMap<usize, String> {
    match section {
      Section::Listening => &mut self.listening,
      Section::Reading => &mut self.reading,
    }
  }
}

/// Serializable view of the session for clients.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
  pub phase: SessionPhase,
  pub topic: String,
  pub time_left: u32,
  pub time_display: String,
  pub narrating: bool,
  pub recording_index: Option<usize>,
  pub listening_answered: usize,
  pub reading_answered: usize,
  pub essay_words: usize,
  pub recorded: Vec<usize>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub report: Option<ScoreReport>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

pub struct ExamSessionController {
  collab: Collaborators,
  on_complete: Option<CompletionCallback>,
  written_duration_secs: u32,

  phase: SessionPhase,
  topic: String,
  content: Option<ExamContent>,
  answers: AnswerState,
  countdown: Countdown,
  narrating: bool,
  active_recording: Option<(usize, CaptureHandle)>,
  report: Option<ScoreReport>,
  last_error: Option<String>,
}

impl ExamSessionController {
  pub fn new(collab: Collaborators, settings: &ExamSettings) -> Self {
    Self {
      collab,
      on_complete: None,
      written_duration_secs: settings.written_duration_secs,
      phase: SessionPhase::Setup,
      topic: String::new(),
      content: None,
      answers: AnswerState::default(),
      countdown: Countdown::default(),
      narrating: false,
      active_recording: None,
      report: None,
      last_error: None,
    }
  }

  /// Called once with the final report when the session is submitted.
  pub fn with_completion(mut self, callback: CompletionCallback) -> Self {
    self.on_complete = Some(callback);
    self
  }

  pub fn phase(&self) -> SessionPhase { self.phase }
  pub fn topic(&self) -> &str { &self.topic }
  pub fn content(&self) -> Option<&ExamContent> { self.content.as_ref() }
  pub fn answers(&self) -> &AnswerState { &self.answers }
  pub fn time_left(&self) -> u32 { self.countdown.remaining() }
  pub fn time_display(&self) -> String { self.countdown.display() }
  pub fn is_narrating(&self) -> bool { self.narrating }
  pub fn recording_index(&self) -> Option<usize> { self.active_recording.map(|(i, _)| i) }
  pub fn report(&self) -> Option<&ScoreReport> { self.report.as_ref() }
  pub fn last_error(&self) -> Option<&str> { self.last_error.as_deref() }

  /// Shared handle to the content generator, for hosts that run generation off-loop.
  pub fn generator(&self) -> std::sync::Arc<dyn ContentGenerator> {
    self.collab.generator.clone()
  }

  pub fn snapshot(&self) -> SessionSnapshot {
    SessionSnapshot {
      phase: self.phase,
      topic: self.topic.clone(),
      time_left: self.time_left(),
      time_display: self.time_display(),
      narrating: self.narrating,
      recording_index: self.recording_index(),
      listening_answered: self.answers.listening.len(),
      reading_answered: self.answers.reading.len(),
      essay_words: word_count(&self.answers.writing),
      recorded: self.answers.recordings.keys().copied().collect(),
      report: self.report,
      error: self.last_error.clone(),
    }
  }

  fn require(&self, phase: SessionPhase, action: &'static str) -> Result<(), ExamError> {
    if self.phase == phase {
      Ok(())
    } else {
      Err(ExamError::WrongPhase { phase: self.phase, action })
    }
  }

  fn loaded(&self) -> Result<&ExamContent, ExamError> {
    self.content.as_ref().ok_or(ExamError::NoContent)
  }

  // ---------------- Setup / Generating ----------------

  /// Enter `Generating` for `topic`. Also used to retry after a failed generation.
  pub fn begin_generation(&mut self, topic: &str) -> Result<(), ExamError> {
    if !matches!(self.phase, SessionPhase::Setup | SessionPhase::Generating) {
      return Err(ExamError::WrongPhase { phase: self.phase, action: "generate" });
    }
    let topic = topic.trim();
    if topic.is_empty() {
      return Err(ExamError::EmptyTopic);
    }
    self.topic = topic.to_string();
    self.last_error = None;
    self.phase = SessionPhase::Generating;
    info!(target: "exam", topic = %self.topic, "Exam generation requested");
    Ok(())
  }

  /// Adopt a generation result. Failures keep the phase at `Generating` and leave
  /// answers untouched; a result arriving in any other phase is rejected.
  pub fn apply_generated(&mut self, result: Result<ExamContent, GenerationError>) -> Result<(), ExamError> {
    self.require(SessionPhase::Generating, "apply_generated")?;

    let content = match result.and_then(|c| c.validate().map(|_| c)) {
      Ok(c) => c,
      Err(e) => {
        warn!(target: "exam", topic = %self.topic, error = %e, "Exam generation failed; waiting for retry");
        self.last_error = Some(e.to_string());
        return Err(ExamError::Generation(e));
      }
    };

    info!(
      target: "exam",
      topic = %self.topic,
      listening = content.listening.questions.len(),
      reading = content.reading.questions.len(),
      speaking = content.speaking.questions.len(),
      "Exam content adopted; written paper started"
    );
    self.content = Some(content);
    self.answers = AnswerState::default();
    self.countdown.start(self.written_duration_secs);
    self.phase = SessionPhase::Written;
    Ok(())
  }

  /// `begin_generation` + generator call + `apply_generated`.
  #[instrument(level = "info", skip(self), fields(generator = %self.collab.generator.name()))]
  pub async fn generate(&mut self, topic: &str) -> Result<(), ExamError> {
    self.begin_generation(topic)?;
    let result = self.collab.generator.generate_exam(&self.topic).await;
    self.apply_generated(result)
  }

  // ---------------- Written ----------------

  pub fn select_answer(&mut self, section: Section, index: usize, option: &str) -> Result<(), ExamError> {
    self.require(SessionPhase::Written, "select_answer")?;
    let questions = self.loaded()?.questions(section);
    let question = questions
      .get(index)
      .ok_or(ExamError::QuestionOutOfRange { index, len: questions.len() })?;
    if !question.options.iter().any(|o| o == option) {
      return Err(ExamError::UnknownOption { index, option: option.to_string() });
    }
    self.answers.section_mut(section).insert(index, option.to_string());
    Ok(())
  }

  pub fn set_essay(&mut self, text: &str) -> Result<(), ExamError> {
    self.require(SessionPhase::Written, "set_essay")?;
    self.answers.writing = text.to_string();
    Ok(())
  }

  /// Read the listening script aloud, replacing any narration in progress.
  pub fn play_listening(&mut self) -> Result<(), ExamError> {
    self.require(SessionPhase::Written, "play_listening")?;
    let script = self.loaded()?.listening.script.clone();
    self.stop_narration();
    self.collab.narrator.speak(&script);
    self.narrating = true;
    Ok(())
  }

  /// Cancel narration. No-op when nothing is playing.
  pub fn stop_narration(&mut self) {
    if self.narrating {
      self.collab.narrator.cancel();
      self.narrating = false;
    }
  }

  /// The platform reported that the utterance ended on its own.
  pub fn narration_finished(&mut self) {
    self.narrating = false;
  }

  /// One second of the written paper. Returns true when the countdown ran out
  /// and the session moved to `Speaking`.
  pub fn tick(&mut self) -> bool {
    if self.phase != SessionPhase::Written || !self.countdown.is_running() {
      return false;
    }
    if self.countdown.tick() > 0 {
      return false;
    }
    info!(target: "exam", topic = %self.topic, "Written time is up");
    self.enter_speaking();
    true
  }

  pub fn finish_written(&mut self) -> Result<(), ExamError> {
    self.require(SessionPhase::Written, "finish_written")?;
    self.enter_speaking();
    Ok(())
  }

  fn enter_speaking(&mut self) {
    self.stop_narration();
    self.countdown.stop();
    self.phase = SessionPhase::Speaking;
    info!(
      target: "exam",
      topic = %self.topic,
      listening_answered = self.answers.listening.len(),
      reading_answered = self.answers.reading.len(),
      essay_words = word_count(&self.answers.writing),
      "Speaking section started"
    );
  }

  // ---------------- Speaking ----------------

  #[instrument(level = "debug", skip(self))]
  pub async fn start_recording(&mut self, index: usize) -> Result<(), ExamError> {
    self.require(SessionPhase::Speaking, "start_recording")?;
    let len = self.loaded()?.speaking.questions.len();
    if index >= len {
      return Err(ExamError::QuestionOutOfRange { index, len });
    }
    if let Some((active, _)) = self.active_recording {
      return Err(ExamError::RecordingBusy { active });
    }

    match self.collab.capture.start_recording(index).await {
      Ok(handle) => {
        self.active_recording = Some((index, handle));
        debug!(target: "exam", index, "Recording started");
        Ok(())
      }
      Err(e) => {
        warn!(target: "exam", index, error = %e, "Recording could not start; question stays unanswered");
        Err(ExamError::Capture(e))
      }
    }
  }

  /// Finalize the active recording, replacing any earlier take for that question.
  /// Returns `(index, size)` of the saved take, or `None` when nothing was recording.
  #[instrument(level = "debug", skip(self))]
  pub async fn stop_recording(&mut self) -> Result<Option<(usize, usize)>, ExamError> {
    let Some((index, handle)) = self.active_recording.take() else {
      return Ok(None);
    };
    match self.collab.capture.stop_recording(handle).await {
      Ok(blob) => {
        let size = blob.size();
        self.answers.recordings.insert(index, blob);
        debug!(target: "exam", index, size, "Recording saved");
        Ok(Some((index, size)))
      }
      Err(e) => {
        warn!(target: "exam", index, error = %e, "Recording could not be finalized");
        Err(ExamError::Capture(e))
      }
    }
  }

  /// Stop any recording, grade everything, persist per-skill scores and finish.
  #[instrument(level = "info", skip(self), fields(topic = %self.topic))]
  pub async fn submit_all(&mut self) -> Result<ScoreReport, ExamError> {
    self.require(SessionPhase::Speaking, "submit_all")?;
    if let Err(e) = self.stop_recording().await {
      warn!(target: "exam", error = %e, "Active recording lost at submit");
    }

    let content = self.loaded()?;
    let report = ScoreReport::compute(
      content,
      &self.answers.listening,
      &self.answers.reading,
      &self.answers.writing,
      &self.answers.recordings,
    );
    self.report = Some(report);
    self.phase = SessionPhase::Results;
    info!(
      target: "exam",
      listening = report.listening,
      reading = report.reading,
      writing = report.writing,
      speaking = report.speaking,
      overall = report.overall,
      "Mock test scored"
    );

    for skill in Skill::ALL {
      let row = NewResult { skill: skill.as_str().to_string(), score: report.band(skill), topic: self.topic.clone() };
      if let Err(e) = self.collab.sink.save_result(row).await {
        warn!(target: "exam", skill = skill.as_str(), error = %e, "Result not saved");
      }
    }

    if let Some(cb) = &self.on_complete {
      cb(&report);
    }
    Ok(report)
  }

  // ---------------- Results ----------------

  /// Drop every trace of the finished session and return to `Setup`.
  pub fn restart(&mut self) -> Result<(), ExamError> {
    self.require(SessionPhase::Results, "restart")?;
    self.phase = SessionPhase::Setup;
    self.topic.clear();
    self.content = None;
    self.answers = AnswerState::default();
    self.countdown = Countdown::default();
    self.narrating = false;
    self.active_recording = None;
    self.report = None;
    self.last_error = None;
    info!(target: "exam", "Session restarted");
    Ok(())
  }
}
