//! Application state: in-memory stores, prompts, exam settings, the optional
//! LLM client and the content generator every exam session starts from.
//!
//! Without an API key the generator is the offline template generator, so the
//! mock test works end to end with no network access.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::{load_config_from_env, AppConfig, ExamSettings, Prompts};
use crate::llm::{LlmClient, LlmGenerator};
use crate::seeds::TemplateGenerator;
use crate::session::ContentGenerator;
use crate::store::{ResultStore, VocabularyStore};

#[derive(Clone)]
pub struct AppState {
    pub results: ResultStore,
    pub vocabulary: VocabularyStore,
    pub llm: Option<LlmClient>,
    pub prompts: Prompts,
    pub exam: ExamSettings,
    pub generator: Arc<dyn ContentGenerator>,
}

impl AppState {
    /// Build state from env: load config and init the LLM client if a key is present.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_config_from_env();
        let llm = LlmClient::from_env();
        if let Some(c) = &llm {
            info!(target: "ielts_backend", base_url = %c.base_url, model = %c.model, "LLM enabled.");
        } else {
            info!(target: "ielts_backend", "LLM disabled (no LLM_API_KEY / GROQ_API_KEY). Using built-in templates.");
        }
        Self::from_config(cfg, llm)
    }

    pub fn from_config(cfg: AppConfig, llm: Option<LlmClient>) -> Self {
        let generator: Arc<dyn ContentGenerator> = match &llm {
            Some(client) => Arc::new(LlmGenerator::new(client.clone(), cfg.prompts.clone())),
            None => Arc::new(TemplateGenerator),
        };
        info!(
            target: "ielts_backend",
            generator = generator.name(),
            written_secs = cfg.exam.written_duration_secs,
            "Exam settings ready"
        );
        Self {
            results: ResultStore::default(),
            vocabulary: VocabularyStore::default(),
            llm,
            prompts: cfg.prompts,
            exam: cfg.exam,
            generator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_state_uses_templates() {
        let state = AppState::from_config(AppConfig::default(), None);
        assert!(state.llm.is_none());
        assert_eq!(state.generator.name(), "template");
        assert_eq!(state.exam.written_duration_secs, 9000);
    }
}
