//! Speech capture seam
//!
//! A capture service is started and stopped by the mic controller and
//! reports back asynchronously through a channel of [`CaptureEvent`]s.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Recognition settings handed to the capture service on every start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Keep capturing after the first result
    pub continuous: bool,
    /// Report partial hypotheses
    pub interim_results: bool,
    /// Recognized locale
    pub language: String,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            continuous: false,
            interim_results: false,
            language: "en-US".to_string(),
        }
    }
}

/// Events a capture service reports for the session it was started for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Raw transcript of the utterance
    Result(String),
    /// Failure with the service's reason code
    Error(String),
    /// The session closed
    End,
}

/// Errors raised synchronously when starting a session
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("speech capture is already running")]
    AlreadyRunning,

    #[error("speech capture is unavailable: {0}")]
    Unavailable(String),
}

/// A speech recognition service
pub trait SpeechCapture: Send {
    /// Begin capturing one utterance
    fn start(&mut self, settings: &CaptureSettings) -> Result<(), CaptureError>;

    /// Cancel the running capture, if any
    fn stop(&mut self);
}

/// Turn a service reason code into text fit for the status line
pub fn describe_error(code: &str) -> String {
    match code {
        "no-speech" => "No speech was detected. Please try again.".to_string(),
        "aborted" => "Listening was cancelled.".to_string(),
        "audio-capture" => "No microphone was found.".to_string(),
        "network" => "A network error interrupted speech recognition.".to_string(),
        "not-allowed" | "service-not-allowed" => "Microphone permission was denied.".to_string(),
        "language-not-supported" => "The selected language is not supported.".to_string(),
        other => format!("Speech recognition error: {other}"),
    }
}

/// Capture that treats one line of standard input as one utterance
pub struct ConsoleCapture {
    lines: Arc<Mutex<mpsc::Receiver<String>>>,
    event_tx: mpsc::Sender<CaptureEvent>,
    session: Option<JoinHandle<()>>,
}

impl ConsoleCapture {
    /// Create a console capture; spawns the stdin reader task
    pub fn new(event_tx: mpsc::Sender<CaptureEvent>) -> Self {
        let (line_tx, line_rx) = mpsc::channel(8);

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line_tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        info!("standard input closed");
                        break;
                    }
                    Err(e) => {
                        warn!(?e, "failed to read standard input");
                        break;
                    }
                }
            }
        });

        Self::with_lines(line_rx, event_tx)
    }

    /// Create a console capture fed from an arbitrary line source
    pub fn with_lines(lines: mpsc::Receiver<String>, event_tx: mpsc::Sender<CaptureEvent>) -> Self {
        Self {
            lines: Arc::new(Mutex::new(lines)),
            event_tx,
            session: None,
        }
    }
}

impl SpeechCapture for ConsoleCapture {
    fn start(&mut self, settings: &CaptureSettings) -> Result<(), CaptureError> {
        if self.session.as_ref().is_some_and(|s| !s.is_finished()) {
            return Err(CaptureError::AlreadyRunning);
        }

        debug!(language = %settings.language, "console capture started");

        let lines = Arc::clone(&self.lines);
        let event_tx = self.event_tx.clone();

        self.session = Some(tokio::spawn(async move {
            let line = lines.lock().await.recv().await;
            let event = match line {
                Some(line) => CaptureEvent::Result(line),
                None => CaptureEvent::Error("audio-capture".to_string()),
            };
            let _ = event_tx.send(event).await;
            let _ = event_tx.send(CaptureEvent::End).await;
        }));

        Ok(())
    }

    fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            session.abort();
            debug!("console capture stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_known_codes() {
        assert!(describe_error("not-allowed").contains("permission"));
        assert!(describe_error("no-speech").contains("No speech"));
    }

    #[test]
    fn test_describe_unknown_code() {
        assert_eq!(describe_error("bad-grammar"), "Speech recognition error: bad-grammar");
    }

    #[tokio::test]
    async fn test_console_capture_delivers_line() {
        let (line_tx, line_rx) = mpsc::channel(4);
        let (event_tx, mut event_rx) = mpsc::channel(4);
        let mut capture = ConsoleCapture::with_lines(line_rx, event_tx);

        capture.start(&CaptureSettings::default()).unwrap();
        line_tx.send("What time is it".to_string()).await.unwrap();

        assert_eq!(
            event_rx.recv().await,
            Some(CaptureEvent::Result("What time is it".to_string()))
        );
        assert_eq!(event_rx.recv().await, Some(CaptureEvent::End));
    }

    #[tokio::test]
    async fn test_console_capture_closed_input() {
        let (line_tx, line_rx) = mpsc::channel::<String>(4);
        let (event_tx, mut event_rx) = mpsc::channel(4);
        let mut capture = ConsoleCapture::with_lines(line_rx, event_tx);
        drop(line_tx);

        capture.start(&CaptureSettings::default()).unwrap();
        assert_eq!(
            event_rx.recv().await,
            Some(CaptureEvent::Error("audio-capture".to_string()))
        );
    }
}
