//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ChatTurn, ExamContent, Question, Section, SpeakingReport, WritingReport};
use crate::scoring::ScoreReport;
use crate::session::SessionSnapshot;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    NewExam {
        topic: String,
    },
    SelectAnswer {
        section: Section,
        index: usize,
        option: String,
    },
    SetEssay {
        text: String,
    },
    PlayListening,
    StopListening,
    /// The browser finished speaking the script on its own.
    ListeningEnded,
    FinishWritten,
    StartRecording {
        index: usize,
        /// Microphone permission as reported by the browser; absent means granted.
        #[serde(default)]
        granted: Option<bool>,
    },
    AudioChunk {
        #[serde(rename = "audioBase64")]
        audio_base64: String,
    },
    StopRecording,
    SubmitAll,
    Restart,
    Snapshot,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    State {
        snapshot: SessionSnapshot,
    },
    Exam {
        exam: ExamOut,
    },
    Timer {
        #[serde(rename = "timeLeft")]
        time_left: u32,
        display: String,
    },
    Speak {
        text: String,
    },
    CancelSpeech,
    RecordingStarted {
        index: usize,
    },
    RecordingSaved {
        index: usize,
        size: usize,
    },
    Results {
        report: ScoreReport,
    },
    Error {
        message: String,
    },
}

/// Question as shown to the candidate (no answer key).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuestionOut {
    pub text: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ListeningOut {
    pub questions: Vec<QuestionOut>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReadingOut {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub passage: String,
    pub questions: Vec<QuestionOut>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WritingOut {
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SpeakingOut {
    pub questions: Vec<String>,
}

/// Exam delivered over the session socket. The listening script only reaches
/// the client through `speak`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExamOut {
    pub topic: String,
    pub listening: ListeningOut,
    pub reading: ReadingOut,
    pub writing: WritingOut,
    pub speaking: SpeakingOut,
}

fn questions_out(qs: &[Question]) -> Vec<QuestionOut> {
    qs.iter()
        .map(|q| QuestionOut { text: q.text.clone(), options: q.options.clone() })
        .collect()
}

/// Convert loaded content to the candidate-facing DTO.
pub fn exam_out(topic: &str, c: &ExamContent) -> ExamOut {
    ExamOut {
        topic: topic.to_string(),
        listening: ListeningOut { questions: questions_out(&c.listening.questions) },
        reading: ReadingOut {
            title: c.reading.title.clone(),
            passage: c.reading.passage.clone(),
            questions: questions_out(&c.reading.questions),
        },
        writing: WritingOut { prompt: c.writing.prompt.clone() },
        speaking: SpeakingOut { questions: c.speaking.questions.clone() },
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct TopicIn {
    #[serde(default)]
    pub topic: String,
}

#[derive(Serialize)]
pub struct WritingPromptOut {
    pub question: String,
}

#[derive(Deserialize)]
pub struct WritingGradeIn {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub question: String,
    pub essay: String,
}
#[derive(Serialize)]
pub struct WritingGradeOut {
    #[serde(flatten)]
    pub report: WritingReport,
    #[serde(rename = "savedId")]
    pub saved_id: Uuid,
}

#[derive(Deserialize)]
pub struct SpeakingChatIn {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub messages: Vec<ChatTurn>,
}
#[derive(Serialize)]
pub struct SpeakingChatOut {
    pub content: String,
}

#[derive(Deserialize)]
pub struct SpeakingGradeIn {
    #[serde(default)]
    pub topic: String,
    pub transcript: String,
}
#[derive(Serialize)]
pub struct SpeakingGradeOut {
    #[serde(flatten)]
    pub report: SpeakingReport,
    pub id: Uuid,
}

#[derive(Deserialize)]
pub struct ResultIn {
    pub skill: String,
    pub score: f64,
    #[serde(default)]
    pub topic: String,
}

#[derive(Deserialize)]
pub struct VocabularyIn {
    pub word: String,
}

#[derive(Debug, Deserialize)]
pub struct VocabularyIdQuery {
    pub id: Uuid,
}

#[derive(Serialize)]
pub struct OkOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub llm: bool,
    pub generator: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ListeningSection, ReadingSection, SpeakingSection, WritingSection};

    #[test]
    fn client_messages_parse_from_tagged_json() {
        let m: ClientWsMessage =
            serde_json::from_str(r#"{"type":"select_answer","section":"reading","index":2,"option":"B"}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::SelectAnswer { section: Section::Reading, index: 2, .. }));

        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"start_recording","index":0}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::StartRecording { index: 0, granted: None }));

        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"audio_chunk","audioBase64":"AAE="}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::AudioChunk { .. }));
    }

    #[test]
    fn timer_uses_camel_case() {
        let v = serde_json::to_value(ServerWsMessage::Timer { time_left: 65, display: "1:05".into() }).unwrap();
        assert_eq!(v["type"], "timer");
        assert_eq!(v["timeLeft"], 65);
    }

    #[test]
    fn exam_out_hides_answers_and_script() {
        let q = Question { text: "Q".into(), options: vec!["A".into(), "B".into()], correct_answer: "B".into() };
        let content = ExamContent {
            listening: ListeningSection { script: "secret script".into(), questions: vec![q.clone()] },
            reading: ReadingSection { title: None, passage: "p".into(), questions: vec![q] },
            writing: WritingSection { prompt: "w".into() },
            speaking: SpeakingSection { questions: vec!["s".into()] },
        };
        let text = serde_json::to_string(&ServerWsMessage::Exam { exam: exam_out("Topic", &content) }).unwrap();
        assert!(!text.contains("correctAnswer"));
        assert!(!text.contains("secret script"));
        assert!(text.contains("\"topic\":\"Topic\""));
    }
}
