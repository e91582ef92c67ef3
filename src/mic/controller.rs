//! Mic session lifecycle
//!
//! Guards against overlapping recognition sessions and releases the session
//! on every exit path: result, error, forced stop, or an end without result.

use std::time::Instant;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::UiEvent;

use super::capture::{describe_error, CaptureEvent, CaptureSettings, SpeechCapture};

/// Lifecycle of a single mic session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MicState {
    #[default]
    Idle,
    Listening,
}

impl std::fmt::Display for MicState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MicState::Idle => write!(f, "Idle"),
            MicState::Listening => write!(f, "Listening"),
        }
    }
}

pub struct MicController<C: SpeechCapture> {
    capture: C,
    settings: CaptureSettings,
    state: MicState,
    /// When the current session started
    started_at: Option<Instant>,
    event_tx: broadcast::Sender<UiEvent>,
}

impl<C: SpeechCapture> MicController<C> {
    pub fn new(capture: C, settings: CaptureSettings, event_tx: broadcast::Sender<UiEvent>) -> Self {
        Self {
            capture,
            settings,
            state: MicState::Idle,
            started_at: None,
            event_tx,
        }
    }

    pub fn state(&self) -> MicState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == MicState::Listening
    }

    /// Open a session. Returns `false` without side effects when one is
    /// already open, or when the capture service refused to start.
    pub fn request_start(&mut self) -> bool {
        if self.is_listening() {
            debug!("mic already listening, ignoring start request");
            return false;
        }

        if let Err(e) = self.capture.start(&self.settings) {
            warn!(?e, "speech capture failed to start");
            self.emit(UiEvent::CaptureError {
                reason: e.to_string(),
            });
            return false;
        }

        info!(language = %self.settings.language, "mic session started");
        self.state = MicState::Listening;
        self.started_at = Some(Instant::now());
        self.emit(UiEvent::ListeningStarted);
        true
    }

    /// Cancel the open session. No-op when idle.
    pub fn request_stop(&mut self) {
        if !self.is_listening() {
            return;
        }
        self.capture.stop();
        info!("mic session stopped");
        self.release();
    }

    /// Feed an event from the capture service.
    ///
    /// Returns the normalized transcript when the session produced one.
    pub fn handle_capture_event(&mut self, event: CaptureEvent) -> Option<String> {
        if !self.is_listening() {
            debug!(?event, "ignoring capture event outside a session");
            return None;
        }

        match event {
            CaptureEvent::Result(raw) => {
                let transcript = normalize_transcript(&raw);
                if transcript.is_empty() {
                    self.fail("no-speech");
                    return None;
                }

                info!(%transcript, "transcript captured");
                self.emit(UiEvent::TranscriptReady {
                    text: transcript.clone(),
                });
                self.release();
                Some(transcript)
            }
            CaptureEvent::Error(code) => {
                self.fail(&code);
                None
            }
            CaptureEvent::End => {
                debug!("capture ended without a result");
                self.release();
                None
            }
        }
    }

    fn fail(&mut self, code: &str) {
        let reason = describe_error(code);
        warn!(code, %reason, "speech capture error");
        self.emit(UiEvent::CaptureError { reason });
        self.release();
    }

    /// Return to Idle; the only place the session flag is cleared
    fn release(&mut self) {
        let duration_ms = self
            .started_at
            .take()
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        self.state = MicState::Idle;
        debug!(duration_ms, "mic session released");
        self.emit(UiEvent::ListeningEnded);
    }

    fn emit(&self, event: UiEvent) {
        let _ = self.event_tx.send(event);
    }
}

/// Lower-case and trim a raw transcript
pub fn normalize_transcript(raw: &str) -> String {
    raw.trim().to_lowercase()
}
