//! WebSocket upgrade + exam session loop.
//!
//! Each socket owns one `ExamSessionController`. The loop multiplexes client
//! messages, finished generation tasks, narrator output and the one-second
//! countdown tick (only while the written paper is running).

use std::sync::Arc;
use std::time::Duration;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    Query, State, WebSocketUpgrade,
  },
  http::HeaderMap,
  response::IntoResponse,
};
use base64::Engine;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use super::bridge::{ChannelNarrator, UploadCapture};
use super::http::user_from_headers;
use crate::domain::ExamContent;
use crate::error::{ExamError, GenerationError};
use crate::protocol::{exam_out, ClientWsMessage, ServerWsMessage};
use crate::scoring::ScoreReport;
use crate::session::{Collaborators, ExamSessionController, SessionPhase};
use crate::state::AppState;
use crate::store::UserResultSink;

type Generated = (u64, Result<ExamContent, GenerationError>);

#[derive(Debug, Deserialize)]
pub struct WsQuery {
  pub user: Option<String>,
}

#[instrument(level = "info", skip(state, headers))]
pub async fn ws_upgrade(
  ws: WebSocketUpgrade,
  State(state): State<Arc<AppState>>,
  Query(q): Query<WsQuery>,
  headers: HeaderMap,
) -> impl IntoResponse {
  // Browsers cannot set headers on a WebSocket handshake, so `?user=` wins.
  let user = q
    .user
    .map(|u| u.trim().to_string())
    .filter(|u| !u.is_empty())
    .unwrap_or_else(|| user_from_headers(&headers));
  info!(target: "ielts_backend", %user, "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state, user))
}

struct Session {
  ctl: ExamSessionController,
  capture: Arc<UploadCapture>,
  gen_tx: mpsc::Sender<Generated>,
  gen_seq: u64,
}

impl Session {
  /// Wire a controller to the browser-backed collaborators and this user's result store.
  fn new(
    state: &AppState,
    user: &str,
    out_tx: mpsc::UnboundedSender<ServerWsMessage>,
    gen_tx: mpsc::Sender<Generated>,
  ) -> Self {
    let capture = Arc::new(UploadCapture::default());
    let collab = Collaborators {
      generator: state.generator.clone(),
      narrator: Arc::new(ChannelNarrator::new(out_tx)),
      capture: capture.clone(),
      sink: Arc::new(UserResultSink::new(state.results.clone(), user)),
    };
    let done_user = user.to_string();
    let ctl = ExamSessionController::new(collab, &state.exam).with_completion(Arc::new(move |r: &ScoreReport| {
      info!(target: "exam", user = %done_user, overall = r.overall, "Mock test completed");
    }));
    Self { ctl, capture, gen_tx, gen_seq: 0 }
  }

  fn state(&self) -> ServerWsMessage {
    ServerWsMessage::State { snapshot: self.ctl.snapshot() }
  }

  /// Run the generator off-loop; only the newest request's result is applied.
  fn spawn_generation(&mut self) {
    self.gen_seq += 1;
    let seq = self.gen_seq;
    let generator = self.ctl.generator();
    let topic = self.ctl.topic().to_string();
    let tx = self.gen_tx.clone();
    tokio::spawn(async move {
      let result = generator.generate_exam(&topic).await;
      if tx.send((seq, result)).await.is_err() {
        debug!(target: "exam", %topic, "Session closed before generation finished");
      }
    });
  }

  /// Apply a finished generation. The flag is true only when the content was
  /// adopted, which is when the written paper (and its clock) starts.
  fn on_generated(&mut self, seq: u64, result: Result<ExamContent, GenerationError>) -> (Vec<ServerWsMessage>, bool) {
    if seq != self.gen_seq {
      debug!(target: "exam", seq, current = self.gen_seq, "Dropping superseded generation result");
      return (Vec::new(), false);
    }
    match self.ctl.apply_generated(result) {
      Ok(()) => {
        let mut out = Vec::with_capacity(2);
        if let Some(content) = self.ctl.content() {
          out.push(ServerWsMessage::Exam { exam: exam_out(self.ctl.topic(), content) });
        }
        out.push(self.state());
        (out, true)
      }
      Err(e) => (vec![ServerWsMessage::Error { message: e.to_string() }, self.state()], false),
    }
  }

  async fn handle(&mut self, msg: ClientWsMessage) -> Vec<ServerWsMessage> {
    let result: Result<Vec<ServerWsMessage>, ExamError> = match msg {
      ClientWsMessage::Ping => return vec![ServerWsMessage::Pong],

      ClientWsMessage::AudioChunk { audio_base64 } => {
        return match base64::engine::general_purpose::STANDARD.decode(audio_base64.as_bytes()) {
          Ok(bytes) => {
            if !self.capture.append_chunk(&bytes) {
              debug!(target: "exam", size = bytes.len(), "Audio chunk without an active recording");
            }
            Vec::new()
          }
          Err(e) => vec![ServerWsMessage::Error { message: format!("Invalid audio chunk: {}", e) }],
        };
      }

      ClientWsMessage::Snapshot => Ok(Vec::new()),

      ClientWsMessage::NewExam { topic } => self.ctl.begin_generation(&topic).map(|_| {
        self.spawn_generation();
        Vec::new()
      }),

      ClientWsMessage::SelectAnswer { section, index, option } => {
        self.ctl.select_answer(section, index, &option).map(|_| Vec::new())
      }

      ClientWsMessage::SetEssay { text } => self.ctl.set_essay(&text).map(|_| Vec::new()),

      ClientWsMessage::PlayListening => self.ctl.play_listening().map(|_| Vec::new()),

      ClientWsMessage::StopListening => {
        self.ctl.stop_narration();
        Ok(Vec::new())
      }

      ClientWsMessage::ListeningEnded => {
        self.ctl.narration_finished();
        Ok(Vec::new())
      }

      ClientWsMessage::FinishWritten => self.ctl.finish_written().map(|_| Vec::new()),

      ClientWsMessage::StartRecording { index, granted } => {
        self.capture.set_permission(granted.unwrap_or(true));
        self
          .ctl
          .start_recording(index)
          .await
          .map(|_| vec![ServerWsMessage::RecordingStarted { index }])
      }

      ClientWsMessage::StopRecording => self.ctl.stop_recording().await.map(|saved| {
        saved
          .map(|(index, size)| vec![ServerWsMessage::RecordingSaved { index, size }])
          .unwrap_or_default()
      }),

      ClientWsMessage::SubmitAll => self.ctl.submit_all().await.map(|report| vec![ServerWsMessage::Results { report }]),

      ClientWsMessage::Restart => self.ctl.restart().map(|_| Vec::new()),
    };

    match result {
      Ok(mut out) => {
        out.push(self.state());
        out
      }
      Err(e) => {
        warn!(target: "exam", error = %e, phase = %self.ctl.phase(), "Client request rejected");
        vec![ServerWsMessage::Error { message: e.to_string() }, self.state()]
      }
    }
  }

  /// Advance the countdown by one second.
  fn on_tick(&mut self) -> Vec<ServerWsMessage> {
    let expired = self.ctl.tick();
    let mut out = vec![ServerWsMessage::Timer { time_left: self.ctl.time_left(), display: self.ctl.time_display() }];
    if expired {
      out.push(self.state());
    }
    out
  }
}

async fn send_all(socket: &mut WebSocket, msgs: Vec<ServerWsMessage>) -> bool {
  for msg in msgs {
    let out = serde_json::to_string(&msg).unwrap_or_else(|e| {
      serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
    });
    if let Err(e) = socket.send(Message::Text(out)).await {
      error!(target: "ielts_backend", error = %e, "WS send error");
      return false;
    }
  }
  true
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, user: String) {
  info!(target: "ielts_backend", "WebSocket connected");

  let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerWsMessage>();
  let (gen_tx, mut gen_rx) = mpsc::channel::<Generated>(4);
  let mut session = Session::new(&state, &user, out_tx, gen_tx);

  let mut ticker = tokio::time::interval(Duration::from_secs(1));
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

  let hello = vec![session.state()];
  let mut open = send_all(&mut socket, hello).await;

  while open {
    tokio::select! {
      incoming = socket.recv() => {
        let replies = match incoming {
          Some(Ok(Message::Text(txt))) => match serde_json::from_str::<ClientWsMessage>(&txt) {
            Ok(msg) => {
              debug!(target: "ielts_backend", "WS received: {:?}", &msg);
              session.handle(msg).await
            }
            Err(e) => vec![ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }],
          },
          Some(Ok(Message::Binary(bytes))) => {
            session.capture.append_chunk(&bytes);
            Vec::new()
          }
          Some(Ok(Message::Ping(payload))) => {
            open = socket.send(Message::Pong(payload)).await.is_ok();
            Vec::new()
          }
          Some(Ok(Message::Close(_))) | None => break,
          Some(Ok(Message::Pong(_))) => Vec::new(),
          Some(Err(e)) => {
            warn!(target: "ielts_backend", error = %e, "WS receive error");
            break;
          }
        };
        open = open && send_all(&mut socket, replies).await;
      }

      Some((seq, result)) = gen_rx.recv() => {
        let (replies, adopted) = session.on_generated(seq, result);
        if adopted {
          // Count whole seconds from the moment the paper is shown.
          ticker.reset();
        }
        open = send_all(&mut socket, replies).await;
      }

      Some(msg) = out_rx.recv() => {
        open = send_all(&mut socket, vec![msg]).await;
      }

      _ = ticker.tick(), if session.ctl.phase() == SessionPhase::Written => {
        let replies = session.on_tick();
        open = send_all(&mut socket, replies).await;
      }
    }
  }

  session.ctl.stop_narration();
  if let Err(e) = session.ctl.stop_recording().await {
    debug!(target: "exam", error = %e, "Recording dropped on disconnect");
  }
  info!(target: "ielts_backend", phase = %session.ctl.phase(), "WebSocket disconnected");
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::{AppConfig, ExamSettings};
  use crate::domain::Section;
  use crate::seeds::template_exam;

  fn session_with(written_duration_secs: u32) -> (Session, mpsc::Receiver<Generated>) {
    let cfg = AppConfig { exam: ExamSettings { written_duration_secs }, ..Default::default() };
    let state = AppState::from_config(cfg, None);
    let (out_tx, _out_rx) = mpsc::unbounded_channel();
    let (gen_tx, gen_rx) = mpsc::channel(4);
    (Session::new(&state, "tester", out_tx, gen_tx), gen_rx)
  }

  fn phase_of(msg: &ServerWsMessage) -> Option<SessionPhase> {
    match msg {
      ServerWsMessage::State { snapshot } => Some(snapshot.phase),
      _ => None,
    }
  }

  /// Request an exam and adopt the template content under the current sequence.
  async fn start_written(session: &mut Session) {
    session.handle(ClientWsMessage::NewExam { topic: "Rivers".into() }).await;
    let (_, adopted) = session.on_generated(session.gen_seq, Ok(template_exam("Rivers")));
    assert!(adopted);
  }

  #[tokio::test]
  async fn superseded_generation_results_are_dropped() {
    let (mut session, _gen_rx) = session_with(60);
    session.handle(ClientWsMessage::NewExam { topic: "Rivers".into() }).await;
    session.handle(ClientWsMessage::NewExam { topic: "Deserts".into() }).await;
    assert_eq!(session.gen_seq, 2);

    let (replies, adopted) = session.on_generated(1, Ok(template_exam("Rivers")));
    assert!(replies.is_empty());
    assert!(!adopted);
    assert_eq!(session.ctl.phase(), SessionPhase::Generating);

    let (replies, adopted) = session.on_generated(2, Ok(template_exam("Deserts")));
    assert!(adopted);
    assert_eq!(replies.len(), 2);
    assert!(matches!(&replies[0], ServerWsMessage::Exam { exam } if exam.topic == "Deserts"));
    assert_eq!(phase_of(&replies[1]), Some(SessionPhase::Written));
  }

  #[tokio::test]
  async fn failed_generation_reports_error_without_starting_the_clock() {
    let (mut session, _gen_rx) = session_with(60);
    session.handle(ClientWsMessage::NewExam { topic: "Rivers".into() }).await;
    let (replies, adopted) =
      session.on_generated(session.gen_seq, Err(GenerationError::Upstream("rate limited".into())));
    assert!(!adopted);
    assert!(matches!(&replies[0], ServerWsMessage::Error { .. }));
    assert_eq!(phase_of(&replies[1]), Some(SessionPhase::Generating));
  }

  #[tokio::test]
  async fn ticks_count_down_and_expiry_adds_state() {
    let (mut session, _gen_rx) = session_with(2);
    start_written(&mut session).await;

    let replies = session.on_tick();
    assert_eq!(replies.len(), 1);
    assert!(matches!(&replies[0], ServerWsMessage::Timer { time_left: 1, .. }));

    let replies = session.on_tick();
    assert_eq!(replies.len(), 2);
    assert!(matches!(&replies[0], ServerWsMessage::Timer { time_left: 0, .. }));
    assert_eq!(phase_of(&replies[1]), Some(SessionPhase::Speaking));
  }

  #[tokio::test]
  async fn invalid_audio_chunk_is_an_error() {
    let (mut session, _gen_rx) = session_with(60);
    let replies = session.handle(ClientWsMessage::AudioChunk { audio_base64: "not base64!".into() }).await;
    assert_eq!(replies.len(), 1);
    assert!(matches!(&replies[0], ServerWsMessage::Error { message } if message.starts_with("Invalid audio chunk")));

    let replies = session.handle(ClientWsMessage::AudioChunk { audio_base64: "AAE=".into() }).await;
    assert!(replies.is_empty());
  }

  #[tokio::test]
  async fn denied_microphone_leaves_question_unrecorded() {
    let (mut session, _gen_rx) = session_with(60);
    start_written(&mut session).await;
    session.handle(ClientWsMessage::FinishWritten).await;

    let replies = session.handle(ClientWsMessage::StartRecording { index: 0, granted: Some(false) }).await;
    assert_eq!(replies.len(), 2);
    assert!(matches!(&replies[0], ServerWsMessage::Error { .. }));
    match &replies[1] {
      ServerWsMessage::State { snapshot } => {
        assert_eq!(snapshot.phase, SessionPhase::Speaking);
        assert_eq!(snapshot.recording_index, None);
        assert!(snapshot.recorded.is_empty());
      }
      other => panic!("expected state, got {:?}", other),
    }

    let replies = session.handle(ClientWsMessage::StartRecording { index: 0, granted: None }).await;
    assert!(matches!(&replies[0], ServerWsMessage::RecordingStarted { index: 0 }));
  }

  #[tokio::test]
  async fn wrong_phase_requests_reply_error_then_state() {
    let (mut session, _gen_rx) = session_with(60);
    let replies =
      session.handle(ClientWsMessage::SelectAnswer { section: Section::Reading, index: 0, option: "A".into() }).await;
    assert!(matches!(&replies[0], ServerWsMessage::Error { .. }));
    assert_eq!(phase_of(&replies[1]), Some(SessionPhase::Setup));
    assert!(matches!(session.handle(ClientWsMessage::Ping).await[..], [ServerWsMessage::Pong]));
  }
}
