//! In-memory stores for scores and vocabulary, plus dashboard statistics.
//!
//! Records are append-only vectors behind `tokio::sync::RwLock`; listings are
//! returned newest first.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{ResultRecord, Skill, VocabularyEntry, WordAnalysis};
use crate::error::PersistError;
use crate::session::{NewResult, ResultSink};
use crate::util::round1_f64;

pub const VOCABULARY_PAGE: usize = 50;
const FULL_MARK: f64 = 9.0;
/// Placeholder radar values for axes that are not scored yet.
const UNSCORED_AXIS: f64 = 5.0;

#[derive(Clone, Default)]
pub struct ResultStore {
    inner: Arc<RwLock<Vec<ResultRecord>>>,
}

impl ResultStore {
    #[instrument(level = "debug", skip(self, topic))]
    pub async fn insert(&self, user: &str, skill: &str, score: f64, topic: &str) -> ResultRecord {
        let topic = topic.trim();
        let record = ResultRecord {
            id: Uuid::new_v4(),
            user: user.to_string(),
            skill: skill.to_string(),
            score,
            topic: if topic.is_empty() { "General".to_string() } else { topic.to_string() },
            created_at: Utc::now(),
        };
        self.inner.write().await.push(record.clone());
        debug!(target: "ielts_backend", id = %record.id, "Result stored");
        record
    }

    pub async fn for_user(&self, user: &str) -> Vec<ResultRecord> {
        self.inner.read().await.iter().rev().filter(|r| r.user == user).cloned().collect()
    }

    pub async fn all(&self) -> Vec<ResultRecord> {
        self.inner.read().await.iter().rev().cloned().collect()
    }

    pub async fn stats_for(&self, user: &str) -> Stats {
        compute_stats(&self.for_user(user).await)
    }
}

/// `ResultSink` that writes a session's scores under one user.
pub struct UserResultSink {
    store: ResultStore,
    user: String,
}

impl UserResultSink {
    pub fn new(store: ResultStore, user: impl Into<String>) -> Self {
        Self { store, user: user.into() }
    }
}

#[async_trait]
impl ResultSink for UserResultSink {
    async fn save_result(&self, result: NewResult) -> Result<(), PersistError> {
        if !result.score.is_finite() {
            return Err(PersistError::Store(format!("invalid score {}", result.score)));
        }
        self.store.insert(&self.user, &result.skill, f64::from(result.score), &result.topic).await;
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct RadarPoint {
    pub subject: &'static str,
    #[serde(rename = "A")]
    pub a: f64,
    #[serde(rename = "fullMark")]
    pub full_mark: f64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub radar_data: Vec<RadarPoint>,
    /// One-decimal string, as the dashboard displays it.
    pub overall: String,
}

/// Per-skill averages (one decimal, 0 when unscored) and the overall mean of the four skills.
/// Averaging and rounding run in `f64` so results match the dashboard's `toFixed(1)`.
pub fn compute_stats(records: &[ResultRecord]) -> Stats {
    let avg = |skill: Skill| {
        let scores: Vec<f64> = records
            .iter()
            .filter(|r| Skill::parse(&r.skill) == Some(skill))
            .map(|r| r.score)
            .collect();
        if scores.is_empty() {
            0.0
        } else {
            round1_f64(scores.iter().sum::<f64>() / scores.len() as f64)
        }
    };

    let point = |subject, a| RadarPoint { subject, a, full_mark: FULL_MARK };
    let radar_data = vec![
        point("Reading", avg(Skill::Reading)),
        point("Listening", avg(Skill::Listening)),
        point("Speaking", avg(Skill::Speaking)),
        point("Writing", avg(Skill::Writing)),
        point("Vocab", UNSCORED_AXIS),
        point("Grammar", UNSCORED_AXIS),
    ];
    let total: f64 = radar_data.iter().take(4).map(|p| p.a).sum();
    let overall = format!("{:.1}", round1_f64(total / 4.0));
    Stats { radar_data, overall }
}

#[derive(Clone, Default)]
pub struct VocabularyStore {
    inner: Arc<RwLock<Vec<VocabularyEntry>>>,
}

impl VocabularyStore {
    /// Store a word with its analysis; missing fields get readable defaults.
    pub async fn insert(&self, user: &str, word: &str, analysis: WordAnalysis) -> VocabularyEntry {
        let or = |v: Option<String>, d: &str| v.filter(|s| !s.trim().is_empty()).unwrap_or_else(|| d.to_string());
        let entry = VocabularyEntry {
            id: Uuid::new_v4(),
            user: user.to_string(),
            word: word.trim().to_string(),
            definition: or(analysis.definition, "No definition available"),
            meaning: or(analysis.meaning, "No meaning available"),
            example: or(analysis.example, "No example available"),
            level: or(analysis.level, "Unknown"),
            topic: or(analysis.topic, "General"),
            created_at: Utc::now(),
        };
        self.inner.write().await.push(entry.clone());
        entry
    }

    pub async fn list_for(&self, user: &str) -> Vec<VocabularyEntry> {
        self.inner
            .read()
            .await
            .iter()
            .rev()
            .filter(|e| e.user == user)
            .take(VOCABULARY_PAGE)
            .cloned()
            .collect()
    }

    /// Delete `id` only if it belongs to `user`. Returns whether anything was removed.
    pub async fn delete(&self, user: &str, id: Uuid) -> bool {
        let mut entries = self.inner.write().await;
        let before = entries.len();
        entries.retain(|e| !(e.id == id && e.user == user));
        entries.len() != before
    }
}
