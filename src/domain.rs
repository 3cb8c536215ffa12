//! Domain models: exam content, skills, audio blobs, persisted results and LLM reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GenerationError;

/// One of the four IELTS skills.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
  Listening,
  Reading,
  Writing,
  Speaking,
}

impl Skill {
  pub const ALL: [Skill; 4] = [Skill::Listening, Skill::Reading, Skill::Writing, Skill::Speaking];

  pub fn as_str(&self) -> &'static str {
    match self {
      Skill::Listening => "listening",
      Skill::Reading => "reading",
      Skill::Writing => "writing",
      Skill::Speaking => "speaking",
    }
  }

  /// Lenient match used on stored skill labels ("  Reading " == reading).
  pub fn parse(label: &str) -> Option<Skill> {
    match label.trim().to_lowercase().as_str() {
      "listening" => Some(Skill::Listening),
      "reading" => Some(Skill::Reading),
      "writing" => Some(Skill::Writing),
      "speaking" => Some(Skill::Speaking),
      _ => None,
    }
  }
}

/// The two multiple-choice sections of the written paper.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Section {
  Listening,
  Reading,
}

/// Every listening and reading question offers exactly this many options.
pub const OPTIONS_PER_QUESTION: usize = 4;

/// Multiple-choice question. Accepts `q`/`answer` from older generator output.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Question {
  #[serde(alias = "q")]
  pub text: String,
  #[serde(default)]
  pub options: Vec<String>,
  #[serde(rename = "correctAnswer", alias = "answer")]
  pub correct_answer: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ListeningSection {
  pub script: String,
  pub questions: Vec<Question>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReadingSection {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  pub passage: String,
  pub questions: Vec<Question>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WritingSection {
  #[serde(alias = "task2_prompt")]
  pub prompt: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(from = "SpeakingWire")]
pub struct SpeakingSection {
  pub questions: Vec<String>,
}

// Generators sometimes split speaking into part1/part3 lists.
#[derive(Deserialize)]
struct SpeakingWire {
  #[serde(default)]
  questions: Vec<String>,
  #[serde(default)]
  part1: Vec<String>,
  #[serde(default)]
  part3: Vec<String>,
}

impl From<SpeakingWire> for SpeakingSection {
  fn from(w: SpeakingWire) -> Self {
    let questions = if w.questions.is_empty() {
      w.part1.into_iter().chain(w.part3).collect()
    } else {
      w.questions
    };
    Self { questions }
  }
}

/// Full mock-test content for one topic.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExamContent {
  pub listening: ListeningSection,
  pub reading: ReadingSection,
  pub writing: WritingSection,
  pub speaking: SpeakingSection,
}

impl ExamContent {
  pub fn questions(&self, section: Section) -> &[Question] {
    match section {
      Section::Listening => &self.listening.questions,
      Section::Reading => &self.reading.questions,
    }
  }

  /// Structural checks applied before the controller adopts content.
  pub fn validate(&self) -> Result<(), GenerationError> {
    let malformed = |msg: String| Err(GenerationError::Malformed(msg));

    if self.listening.script.trim().is_empty() {
      return malformed("listening script is empty".into());
    }
    if self.reading.passage.trim().is_empty() {
      return malformed("reading passage is empty".into());
    }
    if self.writing.prompt.trim().is_empty() {
      return malformed("writing prompt is empty".into());
    }
    if self.speaking.questions.is_empty() {
      return malformed("speaking has no questions".into());
    }
    for section in [Section::Listening, Section::Reading] {
      let questions = self.questions(section);
      if questions.is_empty() {
        return malformed(format!("{:?} has no questions", section));
      }
      for (i, q) in questions.iter().enumerate() {
        if q.options.len() != OPTIONS_PER_QUESTION {
          return malformed(format!(
            "{:?} question {} has {} options, expected {}",
            section,
            i,
            q.options.len(),
            OPTIONS_PER_QUESTION
          ));
        }
        if !q.options.iter().any(|o| o == &q.correct_answer) {
          return malformed(format!("{:?} question {} has no option matching its answer", section, i));
        }
      }
    }
    Ok(())
  }
}

/// Captured audio for one speaking question.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioBlob {
  pub bytes: Vec<u8>,
}

impl AudioBlob {
  pub fn new(bytes: Vec<u8>) -> Self {
    Self { bytes }
  }

  pub fn size(&self) -> usize {
    self.bytes.len()
  }
}

/// A stored score, one per skill attempt.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
  pub id: Uuid,
  pub user: String,
  pub skill: String,
  pub score: f64,
  pub topic: String,
  pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyEntry {
  pub id: Uuid,
  pub user: String,
  pub word: String,
  pub definition: String,
  pub meaning: String,
  pub example: String,
  pub level: String,
  pub topic: String,
  pub created_at: DateTime<Utc>,
}

/// Standalone reading practice test.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReadingTest {
  #[serde(default)]
  pub title: String,
  pub passage: String,
  pub questions: Vec<Question>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Correction {
  #[serde(default)] pub original: String,
  #[serde(default)] pub corrected: String,
  #[serde(default)] pub explanation: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct WritingReport {
  #[serde(default)] pub overall_score: f32,
  #[serde(default)] pub task_response: f32,
  #[serde(default)] pub coherence_cohesion: f32,
  #[serde(default)] pub lexical_resource: f32,
  #[serde(default)] pub grammatical_range: f32,
  #[serde(default)] pub general_comment: String,
  #[serde(default)] pub detailed_corrections: Vec<Correction>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct SpeakingReport {
  #[serde(default)] pub overall_score: f32,
  #[serde(default)] pub fluency: f32,
  #[serde(default)] pub lexical: f32,
  #[serde(default)] pub grammar: f32,
  #[serde(default)] pub pronunciation: f32,
  #[serde(default)] pub feedback: String,
}

/// One turn of the speaking-practice interview.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatTurn {
  pub role: String,
  pub content: String,
}

/// Word analysis returned by the LLM; every field optional on the wire.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct WordAnalysis {
  #[serde(default)] pub definition: Option<String>,
  #[serde(default)] pub meaning: Option<String>,
  #[serde(default)] pub example: Option<String>,
  #[serde(default)] pub level: Option<String>,
  #[serde(default)] pub topic: Option<String>,
}
