//! Browser-backed collaborators for a WebSocket session.
//!
//! Speech synthesis and microphone capture happen in the browser. The narrator
//! turns `speak`/`cancel` into outbound socket messages; the capture side
//! buffers audio the browser uploads (base64 `audio_chunk` messages or binary
//! frames) for whichever recording is active.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::domain::AudioBlob;
use crate::error::CaptureError;
use crate::protocol::ServerWsMessage;
use crate::scoring::MAX_RECORDING_BYTES;
use crate::session::{CaptureHandle, MediaCapture, Narrator};

pub struct ChannelNarrator {
  tx: UnboundedSender<ServerWsMessage>,
}

impl ChannelNarrator {
  pub fn new(tx: UnboundedSender<ServerWsMessage>) -> Self {
    Self { tx }
  }
}

impl Narrator for ChannelNarrator {
  fn speak(&self, text: &str) {
    // A closed channel means the socket is gone; nothing left to narrate to.
    let _ = self.tx.send(ServerWsMessage::Speak { text: text.to_string() });
  }

  fn cancel(&self) {
    let _ = self.tx.send(ServerWsMessage::CancelSpeech);
  }
}

#[derive(Default)]
struct CaptureState {
  denied: bool,
  next_id: u64,
  active: Option<(CaptureHandle, Vec<u8>)>,
}

#[derive(Default)]
pub struct UploadCapture {
  inner: Mutex<CaptureState>,
}

impl UploadCapture {
  fn state(&self) -> std::sync::MutexGuard<'_, CaptureState> {
    self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// Record the browser's microphone permission for the next `start_recording`.
  pub fn set_permission(&self, granted: bool) {
    self.state().denied = !granted;
  }

  /// Append uploaded audio to the active recording. Returns false when nothing is
  /// recording or when the chunk would push the take past `MAX_RECORDING_BYTES`.
  pub fn append_chunk(&self, bytes: &[u8]) -> bool {
    match self.state().active.as_mut() {
      Some((handle, buf)) => {
        if buf.len() + bytes.len() > MAX_RECORDING_BYTES {
          warn!(target: "exam", handle = handle.0, size = buf.len(), chunk = bytes.len(), "Recording cap reached; chunk dropped");
          return false;
        }
        buf.extend_from_slice(bytes);
        true
      }
      None => false,
    }
  }
}

#[async_trait]
impl MediaCapture for UploadCapture {
  async fn start_recording(&self, question_index: usize) -> Result<CaptureHandle, CaptureError> {
    let mut st = self.state();
    if st.denied {
      return Err(CaptureError::PermissionDenied);
    }
    if st.active.is_some() {
      return Err(CaptureError::Device("capture already in use".into()));
    }
    st.next_id += 1;
    let handle = CaptureHandle(st.next_id);
    st.active = Some((handle, Vec::new()));
    debug!(target: "exam", question_index, handle = handle.0, "Upload capture armed");
    Ok(handle)
  }

  async fn stop_recording(&self, handle: CaptureHandle) -> Result<AudioBlob, CaptureError> {
    let mut st = self.state();
    match st.active.take() {
      Some((h, buf)) if h == handle => Ok(AudioBlob::new(buf)),
      other => {
        st.active = other;
        Err(CaptureError::UnknownHandle)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::sync::mpsc;

  #[test]
  fn narrator_emits_socket_messages() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let narrator = ChannelNarrator::new(tx);
    narrator.speak("hello");
    narrator.cancel();
    assert!(matches!(rx.try_recv(), Ok(ServerWsMessage::Speak { text }) if text == "hello"));
    assert!(matches!(rx.try_recv(), Ok(ServerWsMessage::CancelSpeech)));
  }

  #[tokio::test]
  async fn chunks_accumulate_into_the_active_take() {
    let capture = UploadCapture::default();
    assert!(!capture.append_chunk(b"lost"));

    let handle = capture.start_recording(0).await.unwrap();
    assert!(capture.append_chunk(&[1, 2, 3]));
    assert!(capture.append_chunk(&[4]));
    let blob = capture.stop_recording(handle).await.unwrap();
    assert_eq!(blob.bytes, vec![1, 2, 3, 4]);
    assert!(!capture.append_chunk(b"after"));
  }

  #[tokio::test]
  async fn oversized_takes_stop_growing_at_the_cap() {
    let capture = UploadCapture::default();
    let handle = capture.start_recording(0).await.unwrap();
    let chunk = vec![0u8; 1024 * 1024];
    let accepted = (0..10).filter(|_| capture.append_chunk(&chunk)).count();
    assert_eq!(accepted, MAX_RECORDING_BYTES / chunk.len());
    assert!(!capture.append_chunk(&[1]));

    let blob = capture.stop_recording(handle).await.unwrap();
    assert_eq!(blob.bytes.len(), MAX_RECORDING_BYTES);

    // The next take starts empty again.
    let handle = capture.start_recording(1).await.unwrap();
    assert!(capture.append_chunk(&[1, 2]));
    assert_eq!(capture.stop_recording(handle).await.unwrap().bytes, vec![1, 2]);
  }

  #[tokio::test]
  async fn denied_permission_and_stale_handles() {
    let capture = UploadCapture::default();
    capture.set_permission(false);
    assert_eq!(capture.start_recording(1).await, Err(CaptureError::PermissionDenied));

    capture.set_permission(true);
    let handle = capture.start_recording(1).await.unwrap();
    assert_eq!(capture.stop_recording(CaptureHandle(handle.0 + 1)).await, Err(CaptureError::UnknownHandle));
    assert!(capture.stop_recording(handle).await.is_ok());
  }
}
