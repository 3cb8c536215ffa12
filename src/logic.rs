//! Practice behaviors shared by the HTTP handlers.
//!
//! This includes:
//!   - Standalone exam, reading and writing-prompt generation (LLM, else templates)
//!   - Writing grading (LLM report, else the local word-count band) and score saving
//!   - The speaking examiner chat and speaking grading
//!   - Result saving and the vocabulary notebook

use tracing::{debug, error, info, instrument};

use crate::domain::{ChatTurn, ExamContent, ReadingTest, ResultRecord, Skill, VocabularyEntry, WritingReport};
use crate::error::ApiError;
use crate::protocol::{SpeakingGradeOut, WritingGradeOut};
use crate::scoring::writing_band;
use crate::seeds::{template_exam, template_reading, template_writing_prompt};
use crate::state::AppState;
use crate::util::word_count;

fn required<'a>(value: &'a str, what: &str) -> Result<&'a str, ApiError> {
  let v = value.trim();
  if v.is_empty() {
    Err(ApiError::BadRequest(format!("{} is required", what)))
  } else {
    Ok(v)
  }
}

fn topic_or_general(topic: &str) -> &str {
  let t = topic.trim();
  if t.is_empty() { "General" } else { t }
}

#[instrument(level = "info", skip(state))]
pub async fn generate_exam(state: &AppState, topic: &str) -> Result<ExamContent, ApiError> {
  let topic = required(topic, "Topic")?;
  match state.generator.generate_exam(topic).await.and_then(|c| c.validate().map(|_| c)) {
    Ok(c) => Ok(c),
    Err(e) => {
      error!(target: "exam", %topic, generator = state.generator.name(), error = %e, "Exam generation failed; using template.");
      Ok(template_exam(topic))
    }
  }
}

#[instrument(level = "info", skip(state))]
pub async fn reading_test(state: &AppState, topic: &str) -> Result<ReadingTest, ApiError> {
  let topic = required(topic, "Topic")?;
  if let Some(llm) = &state.llm {
    match llm.reading_test(&state.prompts, topic).await {
      Ok(t) if !t.questions.is_empty() => return Ok(t),
      Ok(_) => error!(target: "llm", %topic, "Reading test came back without questions; using template."),
      Err(e) => error!(target: "llm", %topic, error = %e, "Reading generation failed; using template."),
    }
  }
  Ok(template_reading(topic))
}

#[instrument(level = "info", skip(state))]
pub async fn writing_question(state: &AppState, topic: &str) -> Result<String, ApiError> {
  let topic = required(topic, "Topic")?;
  if let Some(llm) = &state.llm {
    match llm.writing_question(&state.prompts, topic).await {
      Ok(q) => return Ok(q),
      Err(e) => error!(target: "llm", %topic, error = %e, "Writing prompt generation failed; using template."),
    }
  }
  Ok(template_writing_prompt(topic))
}

/// Local report used without an LLM: the band comes from the word count alone.
fn local_writing_report(essay: &str) -> WritingReport {
  let words = word_count(essay);
  let band = writing_band(words);
  WritingReport {
    overall_score: band,
    task_response: band,
    coherence_cohesion: band,
    lexical_resource: band,
    grammatical_range: band,
    general_comment: format!("Estimated from length only ({} words). Aim for at least 250 words in Task 2.", words),
    detailed_corrections: Vec::new(),
  }
}

#[instrument(level = "info", skip(state, question, essay), fields(question_len = question.len(), essay_len = essay.len()))]
pub async fn grade_writing(state: &AppState, user: &str, topic: &str, question: &str, essay: &str) -> Result<WritingGradeOut, ApiError> {
  let essay = required(essay, "Essay")?;
  let report = match &state.llm {
    Some(llm) => match llm.grade_writing(&state.prompts, question, essay).await {
      Ok(r) => r,
      Err(e) => {
        error!(target: "llm", error = %e, "Writing grading failed; using local band.");
        local_writing_report(essay)
      }
    },
    None => local_writing_report(essay),
  };
  let saved = state.results.insert(user, Skill::Writing.as_str(), f64::from(report.overall_score), topic_or_general(topic)).await;
  info!(target: "ielts_backend", %user, score = report.overall_score, id = %saved.id, "Writing graded");
  Ok(WritingGradeOut { report, saved_id: saved.id })
}

/// Offline examiner: greets, then walks through the template speaking questions.
fn local_examiner_reply(topic: &str, turns: &[ChatTurn]) -> String {
  let asked = turns.iter().filter(|t| t.role == "examiner").count();
  let questions = template_exam(topic).speaking.questions;
  match questions.get(asked) {
    Some(q) if asked == 0 => format!("Good morning. Today we'll talk about {}. {}", topic, q),
    Some(q) => format!("Thank you. {}", q),
    None => "Thank you, that is the end of the speaking test.".to_string(),
  }
}

#[instrument(level = "info", skip(state, turns), fields(turns = turns.len()))]
pub async fn examiner_reply(state: &AppState, topic: &str, turns: &[ChatTurn]) -> Result<String, ApiError> {
  let topic = topic_or_general(topic);
  if let Some(llm) = &state.llm {
    match llm.examiner_reply(&state.prompts, topic, turns).await {
      Ok(t) => return Ok(t),
      Err(e) => error!(target: "llm", %topic, error = %e, "Examiner reply failed; using scripted questions."),
    }
  }
  debug!(target: "ielts_backend", %topic, "Examiner reply via script.");
  Ok(local_examiner_reply(topic, turns))
}

#[instrument(level = "info", skip(state, transcript), fields(transcript_len = transcript.len()))]
pub async fn grade_speaking(state: &AppState, user: &str, topic: &str, transcript: &str) -> Result<SpeakingGradeOut, ApiError> {
  let transcript = required(transcript, "Transcript")?;
  let llm = state.llm.as_ref().ok_or_else(|| ApiError::Unavailable("Speaking grading needs an LLM API key".into()))?;
  let report = llm.grade_speaking(&state.prompts, topic_or_general(topic), transcript).await?;
  let saved = state.results.insert(user, Skill::Speaking.as_str(), f64::from(report.overall_score), topic_or_general(topic)).await;
  info!(target: "ielts_backend", %user, score = report.overall_score, id = %saved.id, "Speaking graded");
  Ok(SpeakingGradeOut { report, id: saved.id })
}

#[instrument(level = "info", skip(state))]
pub async fn save_result(state: &AppState, user: &str, skill: &str, score: f64, topic: &str) -> Result<ResultRecord, ApiError> {
  let skill = required(skill, "Skill")?;
  if !score.is_finite() || !(0.0..=9.0).contains(&score) {
    return Err(ApiError::BadRequest(format!("Score must be between 0 and 9, got {}", score)));
  }
  Ok(state.results.insert(user, skill, score, topic).await)
}

#[instrument(level = "info", skip(state))]
pub async fn add_vocabulary(state: &AppState, user: &str, word: &str) -> Result<VocabularyEntry, ApiError> {
  let word = required(word, "Word")?;
  let llm = state.llm.as_ref().ok_or_else(|| ApiError::Unavailable("Word analysis needs an LLM API key".into()))?;
  let analysis = llm.analyze_word(&state.prompts, word).await?;
  Ok(state.vocabulary.insert(user, word, analysis).await)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::AppConfig;

  fn offline() -> AppState {
    AppState::from_config(AppConfig::default(), None)
  }

  #[tokio::test]
  async fn blank_topic_is_rejected() {
    let state = offline();
    assert!(matches!(generate_exam(&state, "   ").await, Err(ApiError::BadRequest(_))));
    assert!(matches!(reading_test(&state, "").await, Err(ApiError::BadRequest(_))));
    assert!(matches!(writing_question(&state, "").await, Err(ApiError::BadRequest(_))));
  }

  #[tokio::test]
  async fn offline_generation_uses_templates() {
    let state = offline();
    let exam = generate_exam(&state, " Space ").await.unwrap();
    assert!(exam.listening.script.contains("Space"));
    assert_eq!(reading_test(&state, "Space").await.unwrap().questions.len(), 5);
    assert!(writing_question(&state, "Space").await.unwrap().contains("Space"));
  }

  #[tokio::test]
  async fn offline_writing_grade_uses_word_band_and_saves() {
    let state = offline();
    let essay = "word ".repeat(160);
    let out = grade_writing(&state, "dana", "", "Q", &essay).await.unwrap();
    assert_eq!(out.report.overall_score, 5.5);

    let rows = state.results.for_user("dana").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, out.saved_id);
    assert_eq!(rows[0].skill, "writing");
    assert_eq!(rows[0].topic, "General");
  }

  #[tokio::test]
  async fn offline_examiner_walks_the_script() {
    let state = offline();
    let first = examiner_reply(&state, "Music", &[]).await.unwrap();
    assert!(first.starts_with("Good morning"));

    let turns = vec![
      ChatTurn { role: "examiner".into(), content: first },
      ChatTurn { role: "user".into(), content: "I listen daily.".into() },
    ];
    assert!(examiner_reply(&state, "Music", &turns).await.unwrap().starts_with("Thank you."));
  }

  #[tokio::test]
  async fn llm_only_features_are_unavailable_offline() {
    let state = offline();
    assert!(matches!(grade_speaking(&state, "u", "t", "hello").await, Err(ApiError::Unavailable(_))));
    assert!(matches!(add_vocabulary(&state, "u", "lucid").await, Err(ApiError::Unavailable(_))));
    assert!(matches!(grade_speaking(&state, "u", "t", " ").await, Err(ApiError::BadRequest(_))));
  }

  #[tokio::test]
  async fn result_scores_are_range_checked() {
    let state = offline();
    assert!(matches!(save_result(&state, "u", "reading", 9.5, "").await, Err(ApiError::BadRequest(_))));
    assert!(matches!(save_result(&state, "u", "", 5.0, "").await, Err(ApiError::BadRequest(_))));
    let rec = save_result(&state, "u", "reading", 6.5, "Bees").await.unwrap();
    assert_eq!(rec.topic, "Bees");
  }
}
