//! Rule-based band scoring for the mock test.
//!
//! Each skill maps to a coarse, discontinuous step function. The thresholds
//! below are product policy; changing them must not touch control flow.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{AudioBlob, ExamContent, Question, Section, Skill};
use crate::util::{round1, word_count};

/// Band for a perfect multiple-choice section.
pub const OBJECTIVE_BAND_PERFECT: f32 = 9.0;
/// Correct answers needed for the middle band.
pub const OBJECTIVE_MID_MIN_CORRECT: usize = 3;
pub const OBJECTIVE_BAND_MID: f32 = 6.5;
pub const OBJECTIVE_BAND_LOW: f32 = 4.5;

pub const WRITING_HIGH_MIN_WORDS: usize = 250;
pub const WRITING_BAND_HIGH: f32 = 7.0;
pub const WRITING_MID_MIN_WORDS: usize = 150;
pub const WRITING_BAND_MID: f32 = 5.5;
/// Strictly more words than this earn the low band.
pub const WRITING_LOW_WORDS_ABOVE: usize = 50;
pub const WRITING_BAND_LOW: f32 = 4.0;

/// A recording must be strictly larger than this to count as spoken.
/// Roughly 2-3 seconds of compressed speech; silence or an instant stop stays below it.
pub const MIN_SPOKEN_RECORDING_BYTES: usize = 25_000;
/// Upload cap for one take; chunks past it are dropped.
pub const MAX_RECORDING_BYTES: usize = 8 * 1024 * 1024;
pub const SPEAKING_BAND_ALL: f32 = 7.5;
pub const SPEAKING_BAND_SOME: f32 = 5.0;

pub const BAND_ZERO: f32 = 0.0;

/// Listening/reading band from the number of correct answers.
pub fn objective_band(correct: usize, total: usize) -> f32 {
  if correct == total {
    OBJECTIVE_BAND_PERFECT
  } else if correct >= OBJECTIVE_MID_MIN_CORRECT {
    OBJECTIVE_BAND_MID
  } else if correct > 0 {
    OBJECTIVE_BAND_LOW
  } else {
    BAND_ZERO
  }
}

pub fn count_correct(questions: &[Question], answers: &BTreeMap<usize, String>) -> usize {
  questions
    .iter()
    .enumerate()
    .filter(|(i, q)| answers.get(i).map_or(false, |a| a == &q.correct_answer))
    .count()
}

pub fn writing_band(words: usize) -> f32 {
  if words >= WRITING_HIGH_MIN_WORDS {
    WRITING_BAND_HIGH
  } else if words >= WRITING_MID_MIN_WORDS {
    WRITING_BAND_MID
  } else if words > WRITING_LOW_WORDS_ABOVE {
    WRITING_BAND_LOW
  } else {
    BAND_ZERO
  }
}

pub fn is_spoken_recording(size: usize) -> bool {
  size > MIN_SPOKEN_RECORDING_BYTES
}

pub fn speaking_band(valid: usize, total: usize) -> f32 {
  if valid == total {
    SPEAKING_BAND_ALL
  } else if valid >= 1 {
    SPEAKING_BAND_SOME
  } else {
    BAND_ZERO
  }
}

pub fn overall_band(listening: f32, reading: f32, writing: f32, speaking: f32) -> f32 {
  round1((listening + reading + writing + speaking) / 4.0)
}

/// Final mock-test result. Built once when the session is submitted.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct ScoreReport {
  pub listening: f32,
  pub reading: f32,
  pub writing: f32,
  pub speaking: f32,
  pub overall: f32,
}

impl ScoreReport {
  pub fn from_bands(listening: f32, reading: f32, writing: f32, speaking: f32) -> Self {
    Self {
      listening,
      reading,
      writing,
      speaking,
      overall: overall_band(listening, reading, writing, speaking),
    }
  }

  pub fn compute(
    content: &ExamContent,
    listening: &BTreeMap<usize, String>,
    reading: &BTreeMap<usize, String>,
    essay: &str,
    recordings: &BTreeMap<usize, AudioBlob>,
  ) -> Self {
    let l = content.questions(Section::Listening);
    let r = content.questions(Section::Reading);
    let speaking_total = content.speaking.questions.len();
    let spoken = (0..speaking_total)
      .filter(|i| recordings.get(i).map_or(false, |b| is_spoken_recording(b.size())))
      .count();

    Self::from_bands(
      objective_band(count_correct(l, listening), l.len()),
      objective_band(count_correct(r, reading), r.len()),
      writing_band(word_count(essay)),
      speaking_band(spoken, speaking_total),
    )
  }

  pub fn band(&self, skill: Skill) -> f32 {
    match skill {
      Skill::Listening => self.listening,
      Skill::Reading => self.reading,
      Skill::Writing => self.writing,
      Skill::Speaking => self.speaking,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn objective_band_boundaries() {
    assert_eq!(objective_band(5, 5), 9.0);
    assert_eq!(objective_band(4, 5), 6.5);
    assert_eq!(objective_band(3, 5), 6.5);
    assert_eq!(objective_band(2, 5), 4.5);
    assert_eq!(objective_band(1, 5), 4.5);
    assert_eq!(objective_band(0, 5), 0.0);
  }

  #[test]
  fn objective_band_only_yields_known_bands() {
    for total in 1..=8 {
      for correct in 0..=total {
        let band = objective_band(correct, total);
        assert!([0.0, 4.5, 6.5, 9.0].contains(&band), "{correct}/{total} -> {band}");
      }
    }
  }

  #[test]
  fn perfect_small_section_beats_the_mid_band() {
    assert_eq!(objective_band(2, 2), 9.0);
  }

  #[test]
  fn writing_band_boundaries() {
    assert_eq!(writing_band(250), 7.0);
    assert_eq!(writing_band(249), 5.5);
    assert_eq!(writing_band(150), 5.5);
    assert_eq!(writing_band(149), 4.0);
    assert_eq!(writing_band(51), 4.0);
    assert_eq!(writing_band(50), 0.0);
    assert_eq!(writing_band(0), 0.0);
  }

  #[test]
  fn speaking_band_boundaries() {
    assert_eq!(speaking_band(3, 3), 7.5);
    assert_eq!(speaking_band(2, 3), 5.0);
    assert_eq!(speaking_band(1, 3), 5.0);
    assert_eq!(speaking_band(0, 3), 0.0);
  }

  #[test]
  fn recording_threshold_is_exclusive() {
    assert!(!is_spoken_recording(25_000));
    assert!(is_spoken_recording(25_001));
  }

  #[test]
  fn overall_is_rounded_mean() {
    assert_eq!(overall_band(9.0, 6.5, 7.0, 7.5), 7.5);
    assert_eq!(overall_band(4.5, 0.0, 0.0, 0.0), 1.1);
    assert_eq!(overall_band(6.5, 4.5, 5.5, 5.0), 5.4);
  }

  #[test]
  fn counts_only_exact_matches() {
    let q = |a: &str| Question { text: "?".into(), options: vec![a.into(), "other".into()], correct_answer: a.into() };
    let questions = vec![q("Three"), q("Two"), q("Four")];
    let answers = BTreeMap::from([(0, "Three".to_string()), (1, "two".to_string())]);
    assert_eq!(count_correct(&questions, &answers), 1);
  }
}
