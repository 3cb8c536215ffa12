//! IELTS mock-test backend.
//!
//! The core is `session::ExamSessionController`: a timed, four-skill mock exam
//! (setup, generation, written paper, speaking, results) with local rule-based
//! scoring. Around it sit an OpenAI-compatible LLM client, offline templates,
//! in-memory stores and the axum HTTP/WebSocket surface.

pub mod config;
pub mod domain;
pub mod error;
pub mod llm;
pub mod logic;
pub mod protocol;
pub mod routes;
pub mod scoring;
pub mod seeds;
pub mod session;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod util;
