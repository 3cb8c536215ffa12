//! Loading application configuration (prompts + exam settings) from TOML.
//!
//! Every field has a default, so a missing or partial file is fine.
//! See `AppConfig`, `Prompts` and `ExamSettings` for the schema.

use serde::Deserialize;
use tracing::{error, info};

/// Default length of the written paper (listening + reading + writing).
pub const WRITTEN_DURATION_SECS: u32 = 150 * 60;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub exam: ExamSettings,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ExamSettings {
  #[serde(default = "default_written_duration")]
  pub written_duration_secs: u32,
}

fn default_written_duration() -> u32 {
  WRITTEN_DURATION_SECS
}

impl Default for ExamSettings {
  fn default() -> Self {
    Self { written_duration_secs: WRITTEN_DURATION_SECS }
  }
}

/// Prompts used by the LLM client. Placeholders are `{name}` (see `util::fill_template`).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  // Full mock test
  pub exam_system: String,
  pub exam_user_template: String,
  // Reading practice
  pub reading_user_template: String,
  // Writing practice
  pub writing_prompt_system: String,
  pub writing_grade_system: String,
  pub writing_grade_user_template: String,
  // Speaking practice
  pub speaking_chat_system_template: String,
  pub speaking_grade_system: String,
  pub speaking_grade_user_template: String,
  // Vocabulary notebook
  pub vocabulary_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      exam_system: "You are an IELTS exam creator. Always respond with valid JSON only, no text outside the JSON.".into(),
      exam_user_template: "Create a full IELTS mock test about the topic: \"{topic}\".\nReturn a JSON object with exactly this structure:\n{\"listening\": {\"script\": \"lecture text to be read aloud\", \"questions\": [{\"text\": \"question\", \"options\": [\"A\", \"B\", \"C\", \"D\"], \"correctAnswer\": \"one of the options, verbatim\"}]},\n \"reading\": {\"title\": \"passage title\", \"passage\": \"academic passage\", \"questions\": [same shape as listening]},\n \"writing\": {\"prompt\": \"Task 2 essay prompt\"},\n \"speaking\": {\"questions\": [\"q1\", \"q2\", \"q3\"]}}\nUse 5 questions each for listening and reading.".into(),
      reading_user_template: "Create an IELTS Reading test about: \"{topic}\".\n1. Write a 300-word academic passage about this topic.\n2. Create 5 multiple choice questions based on the passage.\nOutput strict JSON: {\"title\": \"...\", \"passage\": \"...\", \"questions\": [{\"text\": \"...\", \"options\": [\"...\", \"...\", \"...\", \"...\"], \"correctAnswer\": \"one of the options, verbatim\"}]}".into(),
      writing_prompt_system: "You are an IELTS examiner. Generate one IELTS Writing Task 2 question based on the user's topic. Output ONLY the question.".into(),
      writing_grade_system: "You are a strict IELTS Writing examiner. Return ONLY a JSON object: {\"overall_score\": number (0-9, steps of 0.5), \"task_response\": number, \"coherence_cohesion\": number, \"lexical_resource\": number, \"grammatical_range\": number, \"general_comment\": string, \"detailed_corrections\": [{\"original\": string, \"corrected\": string, \"explanation\": string}]}".into(),
      writing_grade_user_template: "Question: {question}\n\nEssay: {essay}".into(),
      speaking_chat_system_template: "You are an IELTS Speaking examiner. Topic for today: \"{topic}\". Conduct a natural Part 1 or Part 3 interview. Keep questions concise, ask ONE question at a time, briefly acknowledge the candidate's answer before a related follow-up, and if the candidate has not spoken yet, greet them and ask the first question.".into(),
      speaking_grade_system: "You are an expert IELTS Speaking examiner. Analyze the transcript and return ONLY a JSON object: {\"overall_score\": number (0-9, steps of 0.5), \"fluency\": number, \"lexical\": number, \"grammar\": number, \"pronunciation\": number, \"feedback\": string}".into(),
      speaking_grade_user_template: "Topic: {topic}\n\nFull interview transcript:\n{transcript}".into(),
      vocabulary_user_template: "Analyze the English word: \"{word}\". Return ONLY a JSON object: {\"definition\": \"short English definition\", \"meaning\": \"Vietnamese meaning\", \"example\": \"an English example sentence\", \"level\": \"CEFR level like A1, B2, C1\", \"topic\": \"general topic\"}".into(),
    }
  }
}

/// Load `AppConfig` from IELTS_CONFIG_PATH. Missing variable, IO or parse errors yield defaults.
pub fn load_config_from_env() -> AppConfig {
  let Ok(path) = std::env::var("IELTS_CONFIG_PATH") else {
    return AppConfig::default();
  };
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "ielts_backend", %path, written_secs = cfg.exam.written_duration_secs, "Loaded config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "ielts_backend", %path, error = %e, "Failed to parse TOML config; using defaults");
        AppConfig::default()
      }
    },
    Err(e) => {
      error!(target: "ielts_backend", %path, error = %e, "Failed to read TOML config file; using defaults");
      AppConfig::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_toml_keeps_defaults() {
    let cfg: AppConfig = toml::from_str(
      r#"
        [exam]
        written_duration_secs = 600

        [prompts]
        writing_prompt_system = "Only one question."
      "#,
    )
    .unwrap();
    assert_eq!(cfg.exam.written_duration_secs, 600);
    assert_eq!(cfg.prompts.writing_prompt_system, "Only one question.");
    assert_eq!(cfg.prompts.exam_system, Prompts::default().exam_system);
  }

  #[test]
  fn empty_toml_is_all_defaults() {
    let cfg: AppConfig = toml::from_str("").unwrap();
    assert_eq!(cfg.exam.written_duration_secs, 9000);
    assert!(cfg.prompts.exam_user_template.contains("{topic}"));
  }
}
