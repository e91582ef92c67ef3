//! Assistant event loop
//!
//! One task owns the mic controller, the dispatcher and the phase machine
//! and reacts to one event at a time: user commands, capture events, server
//! messages and its own timers (mic re-arm, reply timeout, reminders).

use std::future::Future;
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::channel::{ChannelClient, ServerMessage};
use crate::dispatch::{ActionDispatcher, AppliedEffect};
use crate::events::{Stage, UiEvent};
use crate::mic::{CaptureEvent, MicController, SpeechCapture};
use crate::reminders::ReminderSchedule;
use crate::state::{Phase, PhaseInput, PhaseMachine};

/// How long to wait for the classifier before giving up on a command
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Requests from the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    /// Mic button pressed or wake phrase heard
    StartListening,
    /// Cancel the open session and stop re-arming until the next start
    StopListening,
    /// The platform's voice list changed
    VoicesChanged,
}

/// Re-arm behaviour after a session completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub continuous: bool,
    pub backoff: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            continuous: true,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Inbound event sources for [`Assistant::run`]
pub struct Inputs {
    pub commands: mpsc::Receiver<UserCommand>,
    pub capture: mpsc::Receiver<CaptureEvent>,
    pub server: mpsc::Receiver<ServerMessage>,
}

pub struct Assistant<C: SpeechCapture, W> {
    mic: MicController<C>,
    dispatcher: ActionDispatcher,
    phases: PhaseMachine,
    channel: ChannelClient<W>,
    restart: RestartPolicy,
    reminders: ReminderSchedule,
    /// Set by an explicit stop; suppresses the continuous re-arm
    paused: bool,
    event_tx: broadcast::Sender<UiEvent>,
}

impl<C, W> Assistant<C, W>
where
    C: SpeechCapture,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        mic: MicController<C>,
        dispatcher: ActionDispatcher,
        channel: ChannelClient<W>,
        restart: RestartPolicy,
        event_tx: broadcast::Sender<UiEvent>,
    ) -> Self {
        Self {
            mic,
            dispatcher,
            phases: PhaseMachine::new(event_tx.clone()),
            channel,
            restart,
            reminders: ReminderSchedule::disabled(),
            paused: false,
            event_tx,
        }
    }

    pub fn with_reminders(mut self, reminders: ReminderSchedule) -> Self {
        self.reminders = reminders;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phases.phase()
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    pub fn is_listening(&self) -> bool {
        self.mic.is_listening()
    }

    pub fn start_listening(&mut self) -> bool {
        if !self.mic.request_start() {
            return false;
        }
        self.phases.handle(PhaseInput::ListeningStarted);
        self.emit(UiEvent::StageChanged(Stage::Listening));
        true
    }

    pub fn stop_listening(&mut self) {
        if self.mic.is_listening() {
            self.mic.request_stop();
            self.phases.handle(PhaseInput::SessionEnded);
        }
    }

    pub fn handle_command(&mut self, command: UserCommand) {
        debug!(?command, "user command");
        match command {
            UserCommand::StartListening => {
                self.paused = false;
                self.start_listening();
            }
            UserCommand::StopListening => {
                self.paused = true;
                self.stop_listening();
            }
            UserCommand::VoicesChanged => self.dispatcher.speaker_mut().refresh_voices(),
        }
    }

    /// Feed a capture event; forwards the transcript when one is produced
    pub async fn handle_capture_event(&mut self, event: CaptureEvent) {
        let was_listening = self.mic.is_listening();

        let Some(transcript) = self.mic.handle_capture_event(event) else {
            if was_listening && !self.mic.is_listening() {
                self.phases.handle(PhaseInput::SessionEnded);
            }
            return;
        };

        self.emit(UiEvent::StageChanged(Stage::Heard(transcript.clone())));

        match self.channel.process_command(&transcript).await {
            Ok(()) => {
                self.phases.handle(PhaseInput::TranscriptSent);
            }
            Err(e) => {
                warn!(?e, "failed to send command to classifier");
                self.emit(UiEvent::Status {
                    text: "Could not reach the assistant server.".to_string(),
                });
                self.phases.handle(PhaseInput::SessionEnded);
            }
        }
    }

    /// Apply an inbound server message
    pub fn handle_server_message(&mut self, msg: ServerMessage) -> Option<AppliedEffect> {
        match msg {
            ServerMessage::ActionUpdate(response) => {
                let effect = self.dispatcher.apply(&response);
                self.phases.handle(PhaseInput::EffectApplied);
                Some(effect)
            }
            ServerMessage::Error { message } => {
                self.dispatcher.show_error(&message);
                self.phases.handle(PhaseInput::ServerError);
                None
            }
            ServerMessage::ActivateListening { message } => {
                info!(note = message.as_deref().unwrap_or(""), "wake phrase detected");
                self.handle_command(UserCommand::StartListening);
                None
            }
        }
    }

    /// Run until `shutdown` resolves or the server channel closes
    pub async fn run<F>(mut self, mut inputs: Inputs, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        self.dispatcher.restore();

        let mut rearm_at: Option<Instant> = None;
        let mut reply_deadline: Option<Instant> = None;
        let mut reminder = schedule_reminder(&self.reminders, chrono::Local::now().time());

        info!(
            continuous = self.restart.continuous,
            reminders = self.reminders.times().len(),
            "assistant loop started"
        );

        loop {
            // Commands before capture events so a queued start is seen first
            tokio::select! {
                biased;

                Some(command) = inputs.commands.recv() => self.handle_command(command),

                Some(event) = inputs.capture.recv() => self.handle_capture_event(event).await,

                msg = inputs.server.recv() => match msg {
                    Some(msg) => {
                        self.handle_server_message(msg);
                    }
                    None => {
                        warn!("classifier channel closed");
                        self.emit(UiEvent::Status {
                            text: "Lost connection to the assistant server.".to_string(),
                        });
                        break;
                    }
                },

                _ = sleep_until(rearm_at) => {
                    rearm_at = None;
                    debug!("re-arming mic");
                    self.start_listening();
                }

                _ = sleep_until(reminder.map(|(_, at)| at)) => {
                    if let Some((slot, _)) = reminder.take() {
                        debug!(slot = %slot.format("%H:%M"), "reminder slot reached");
                        self.dispatcher.show_reminder(&self.reminders.message);
                        reminder = schedule_reminder(&self.reminders, slot);
                    }
                }

                _ = sleep_until(reply_deadline) => {
                    reply_deadline = None;
                    warn!(timeout_ms = REPLY_TIMEOUT.as_millis() as u64, "classifier did not reply");
                    self.emit(UiEvent::Status {
                        text: "The assistant did not respond. Please try again.".to_string(),
                    });
                    self.phases.handle(PhaseInput::ServerError);
                }

                _ = &mut shutdown => {
                    info!("assistant loop shutting down");
                    break;
                }
            }

            let phase = self.phases.phase();

            reply_deadline = match (phase, reply_deadline) {
                (Phase::Dispatching, None) => Some(Instant::now() + REPLY_TIMEOUT),
                (Phase::Dispatching, deadline) => deadline,
                _ => None,
            };

            rearm_at = match (phase, rearm_at) {
                (Phase::Idle, _) if self.paused => None,
                (Phase::Idle, None) if self.restart.continuous => {
                    Some(Instant::now() + self.restart.backoff)
                }
                (Phase::Idle, deadline) => deadline,
                _ => None,
            };
        }

        self.stop_listening();
        info!("assistant loop stopped");
    }

    fn emit(&self, event: UiEvent) {
        let _ = self.event_tx.send(event);
    }
}

fn schedule_reminder(
    reminders: &ReminderSchedule,
    after: chrono::NaiveTime,
) -> Option<(chrono::NaiveTime, Instant)> {
    reminders
        .next_after(after)
        .map(|(slot, wait)| (slot, Instant::now() + wait))
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::DuplexStream;

    use super::*;
    use crate::channel::{read_frame, ClientMessage};
    use crate::dispatch::{DispatchSettings, Response};
    use crate::mic::{CaptureSettings, FakeCapture};
    use crate::prefs::{MemoryStore, PreferenceStore, CONTRAST_KEY, TEXT_SIZE_KEY};
    use crate::events::Panel;
    use crate::speech::{RecordingOutput, Speaker, SpeechSettings, Voice};

    struct Harness {
        assistant: Assistant<FakeCapture, DuplexStream>,
        server_end: DuplexStream,
        capture: FakeCapture,
        store: MemoryStore,
        speech: RecordingOutput,
        rx: broadcast::Receiver<UiEvent>,
    }

    fn harness(restart: RestartPolicy) -> Harness {
        let (tx, rx) = broadcast::channel(128);
        let capture = FakeCapture::default();
        let store = MemoryStore::new();
        let speech = RecordingOutput::default();

        let settings = DispatchSettings::default();
        let prefs = PreferenceStore::load(Box::new(store.clone()), settings.scale_bounds());
        let speaker = Speaker::new(Box::new(speech.clone()), SpeechSettings::default());
        let dispatcher = ActionDispatcher::new(prefs, speaker, settings, tx.clone());
        let mic = MicController::new(capture.clone(), CaptureSettings::default(), tx.clone());

        let (client_end, server_end) = tokio::io::duplex(4096);
        let assistant = Assistant::new(mic, dispatcher, ChannelClient::new(client_end), restart, tx);

        Harness {
            assistant,
            server_end,
            capture,
            store,
            speech,
            rx,
        }
    }

    async fn received_command(server_end: &mut DuplexStream) -> ClientMessage {
        let body = read_frame(server_end).await.unwrap().unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn statuses(rx: &mut broadcast::Receiver<UiEvent>) -> Vec<String> {
        let mut texts = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let UiEvent::Status { text } = event {
                texts.push(text);
            }
        }
        texts
    }

    #[tokio::test]
    async fn test_make_the_text_bigger() {
        let mut h = harness(RestartPolicy::default());

        assert!(h.assistant.start_listening());
        assert_eq!(h.assistant.phase(), Phase::Listening);

        h.assistant
            .handle_capture_event(CaptureEvent::Result("Make the text bigger".into()))
            .await;
        assert_eq!(h.assistant.phase(), Phase::Dispatching);
        assert!(!h.assistant.is_listening());
        assert_eq!(
            received_command(&mut h.server_end).await,
            ClientMessage::ProcessCommand {
                text: "make the text bigger".into()
            }
        );

        let effect = h.assistant.handle_server_message(ServerMessage::ActionUpdate(Response::new(
            "adjust_text",
            Some("increase"),
            "Text size increased",
        )));

        assert!(matches!(effect, Some(AppliedEffect::TextScaleChanged { scale, .. }) if scale == 1.2));
        assert_eq!(h.assistant.phase(), Phase::Idle);
        assert_eq!(h.store.snapshot().get(TEXT_SIZE_KEY).map(String::as_str), Some("1.2"));
        assert_eq!(statuses(&mut h.rx), vec!["Text size increased".to_string()]);

        let log = h.speech.log.lock().unwrap();
        assert_eq!(log.spoken.len(), 1);
        assert_eq!(log.spoken[0].text, "Text size increased");
    }

    #[tokio::test]
    async fn test_double_start_is_guarded() {
        let mut h = harness(RestartPolicy::default());
        assert!(h.assistant.start_listening());
        assert!(!h.assistant.start_listening());
        assert_eq!(h.capture.calls.lock().unwrap().starts, 1);
    }

    #[tokio::test]
    async fn test_capture_error_returns_to_idle() {
        let mut h = harness(RestartPolicy::default());
        h.assistant.start_listening();
        h.assistant
            .handle_capture_event(CaptureEvent::Error("no-speech".into()))
            .await;
        assert_eq!(h.assistant.phase(), Phase::Idle);
        assert!(!h.assistant.is_listening());
    }

    #[tokio::test]
    async fn test_server_error_becomes_status() {
        let mut h = harness(RestartPolicy::default());
        h.assistant.start_listening();
        h.assistant
            .handle_capture_event(CaptureEvent::Result("call my daughter".into()))
            .await;

        let effect = h.assistant.handle_server_message(ServerMessage::Error {
            message: "Command not recognized".into(),
        });

        assert!(effect.is_none());
        assert_eq!(h.assistant.phase(), Phase::Idle);
        assert!(statuses(&mut h.rx).contains(&"Command not recognized".to_string()));
    }

    #[tokio::test]
    async fn test_stop_listening() {
        let mut h = harness(RestartPolicy::default());
        h.assistant.handle_command(UserCommand::StartListening);
        h.assistant.handle_command(UserCommand::StopListening);
        assert_eq!(h.assistant.phase(), Phase::Idle);
        assert_eq!(h.capture.calls.lock().unwrap().stops, 1);
    }

    #[tokio::test]
    async fn test_wake_phrase_opens_mic() {
        let mut h = harness(RestartPolicy::default());
        h.assistant.handle_command(UserCommand::StopListening);

        let effect = h.assistant.handle_server_message(ServerMessage::ActivateListening {
            message: Some("Wake word detected".into()),
        });

        assert!(effect.is_none());
        assert!(h.assistant.is_listening());
        assert_eq!(h.assistant.phase(), Phase::Listening);
        assert_eq!(h.capture.calls.lock().unwrap().starts, 1);

        // Already listening: the guard holds
        h.assistant
            .handle_server_message(ServerMessage::ActivateListening { message: None });
        assert_eq!(h.capture.calls.lock().unwrap().starts, 1);
    }

    #[tokio::test]
    async fn test_voices_changed_reselects_voice() {
        let mut h = harness(RestartPolicy::default());
        h.speech.log.lock().unwrap().voices = vec![
            Voice::new("Alex", "en-US"),
            Voice::new("Google US English", "en-US"),
        ];

        h.assistant.handle_command(UserCommand::VoicesChanged);
        h.assistant
            .handle_server_message(ServerMessage::ActionUpdate(Response::new("none", None, "Okay")));

        let log = h.speech.log.lock().unwrap();
        assert_eq!(log.spoken.len(), 1);
        assert_eq!(
            log.spoken[0].voice.as_ref().map(|v| v.name.as_str()),
            Some("Google US English")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_does_not_rearm_after_user_stop() {
        let h = harness(RestartPolicy {
            continuous: true,
            backoff: Duration::from_secs(1),
        });
        let capture = h.capture.clone();

        let (command_tx, command_rx) = mpsc::channel(4);
        let (_capture_tx, capture_rx) = mpsc::channel(4);
        let (_server_tx, server_rx) = mpsc::channel(4);
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let task = tokio::spawn(h.assistant.run(
            Inputs {
                commands: command_rx,
                capture: capture_rx,
                server: server_rx,
            },
            async {
                let _ = stop_rx.await;
            },
        ));

        command_tx.send(UserCommand::StartListening).await.unwrap();
        command_tx.send(UserCommand::StopListening).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(capture.calls.lock().unwrap().starts, 1);
        assert_eq!(capture.calls.lock().unwrap().stops, 1);

        // An explicit start resumes continuous mode
        command_tx.send(UserCommand::StartListening).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(capture.calls.lock().unwrap().starts, 2);

        stop_tx.send(()).unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_fires_reminder() {
        use chrono::Timelike;

        let h = harness(RestartPolicy {
            continuous: false,
            backoff: Duration::from_secs(1),
        });
        let mut rx = h.rx;
        let speech = h.speech.clone();

        // Next whole minute at least one minute away
        let soon = chrono::Local::now().time() + chrono::Duration::minutes(2);
        let slot = chrono::NaiveTime::from_hms_opt(soon.hour(), soon.minute(), 0).unwrap();
        let assistant = h.assistant.with_reminders(ReminderSchedule::new([slot]));

        let (_command_tx, command_rx) = mpsc::channel(4);
        let (_capture_tx, capture_rx) = mpsc::channel(4);
        let (_server_tx, server_rx) = mpsc::channel(4);

        tokio::spawn(assistant.run(
            Inputs {
                commands: command_rx,
                capture: capture_rx,
                server: server_rx,
            },
            tokio::time::sleep(Duration::from_secs(5 * 60)),
        ))
        .await
        .unwrap();

        let mut shown = 0;
        while let Ok(event) = rx.try_recv() {
            if let UiEvent::ShowPanel {
                panel: Panel::Reminder,
                text,
            } = event
            {
                assert_eq!(text, "It's time for your medication");
                shown += 1;
            }
        }
        assert_eq!(shown, 1);

        let log = speech.log.lock().unwrap();
        assert_eq!(log.spoken.len(), 1);
        assert_eq!(log.spoken[0].text, "It's time for your medication");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_rearms_after_backoff() {
        let h = harness(RestartPolicy {
            continuous: true,
            backoff: Duration::from_secs(1),
        });
        let capture = h.capture.clone();
        let store = h.store.clone();
        let mut server_end = h.server_end;

        let (command_tx, command_rx) = mpsc::channel(4);
        let (capture_tx, capture_rx) = mpsc::channel(4);
        let (server_tx, server_rx) = mpsc::channel(4);
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let task = tokio::spawn(h.assistant.run(
            Inputs {
                commands: command_rx,
                capture: capture_rx,
                server: server_rx,
            },
            async {
                let _ = stop_rx.await;
            },
        ));

        command_tx.send(UserCommand::StartListening).await.unwrap();
        capture_tx
            .send(CaptureEvent::Result("dark mode".into()))
            .await
            .unwrap();
        assert_eq!(
            received_command(&mut server_end).await,
            ClientMessage::ProcessCommand {
                text: "dark mode".into()
            }
        );

        server_tx
            .send(ServerMessage::ActionUpdate(Response::new(
                "adjust_contrast",
                Some("dark"),
                "Dark mode enabled",
            )))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(capture.calls.lock().unwrap().starts, 2);
        assert_eq!(store.snapshot().get(CONTRAST_KEY).map(String::as_str), Some("dark"));

        stop_tx.send(()).unwrap();
        task.await.unwrap();
        assert_eq!(capture.calls.lock().unwrap().stops, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_times_out_waiting_for_reply() {
        let h = harness(RestartPolicy {
            continuous: false,
            backoff: Duration::from_secs(1),
        });
        let mut rx = h.rx;
        let mut server_end = h.server_end;

        let (command_tx, command_rx) = mpsc::channel(4);
        let (capture_tx, capture_rx) = mpsc::channel(4);
        let (_server_tx, server_rx) = mpsc::channel(4);

        let task = tokio::spawn(h.assistant.run(
            Inputs {
                commands: command_rx,
                capture: capture_rx,
                server: server_rx,
            },
            tokio::time::sleep(Duration::from_secs(30)),
        ));

        command_tx.send(UserCommand::StartListening).await.unwrap();
        capture_tx
            .send(CaptureEvent::Result("what time is it".into()))
            .await
            .unwrap();
        received_command(&mut server_end).await;

        task.await.unwrap();

        let mut saw_timeout = false;
        let mut last_phase = Phase::Idle;
        while let Ok(event) = rx.try_recv() {
            match event {
                UiEvent::Status { text } if text.contains("did not respond") => saw_timeout = true,
                UiEvent::PhaseChanged { to, .. } => last_phase = to,
                _ => {}
            }
        }
        assert!(saw_timeout);
        assert_eq!(last_phase, Phase::Idle);
    }
}
