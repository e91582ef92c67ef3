//! voice-assist console client
//!
//! Wires the assistant to console stand-ins for the platform services:
//! - one line of standard input is one utterance
//! - spoken feedback and UI events are printed
//! - preferences persist in the data directory

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use voice_assist::channel;
use voice_assist::dispatch::ActionDispatcher;
use voice_assist::events::{Panel, Stage, UiEvent};
use voice_assist::lifecycle::wait_for_shutdown;
use voice_assist::mic::{ConsoleCapture, MicController};
use voice_assist::prefs::{FileStore, KeyValueStore, MemoryStore, PreferenceStore};
use voice_assist::speech::{ConsoleVoice, Speaker};
use voice_assist::{Assistant, Config, Inputs, RestartPolicy, UserCommand};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "voice-assist starting");

    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(server = %config.server_addr, data_dir = ?config.data_dir, "configuration loaded");

    let (event_tx, event_rx) = broadcast::channel::<UiEvent>(64);
    let renderer = tokio::spawn(render(event_rx));

    let store: Box<dyn KeyValueStore> = match FileStore::open(&config.preferences_path()) {
        Ok(store) => Box::new(store),
        Err(e) => {
            warn!(error = %e, "preferences unavailable, changes will not persist");
            Box::new(MemoryStore::new())
        }
    };
    let prefs = PreferenceStore::load(store, config.dispatch.scale_bounds());
    let speaker = Speaker::new(Box::new(ConsoleVoice), config.speech.clone());
    let dispatcher = ActionDispatcher::new(prefs, speaker, config.dispatch.clone(), event_tx.clone());

    let (capture_tx, capture_rx) = mpsc::channel(16);
    let mic = MicController::new(
        ConsoleCapture::new(capture_tx),
        config.capture.clone(),
        event_tx.clone(),
    );

    let (client, server_rx) = channel::connect(&config.server_addr).await?;

    let restart = RestartPolicy {
        continuous: config.continuous,
        backoff: config.restart_backoff,
    };
    info!(times = ?config.reminders.times(), "medication reminders");
    let assistant = Assistant::new(mic, dispatcher, client, restart, event_tx)
        .with_reminders(config.reminders.clone());

    let (command_tx, command_rx) = mpsc::channel(4);
    command_tx.send(UserCommand::StartListening).await?;

    println!("Type a command and press Enter (Ctrl-C to quit).");

    assistant
        .run(
            Inputs {
                commands: command_rx,
                capture: capture_rx,
                server: server_rx,
            },
            async {
                let reason = wait_for_shutdown().await;
                info!(?reason, "shutdown signal received");
            },
        )
        .await;

    renderer.abort();
    info!("voice-assist stopped");

    Ok(())
}

/// Console presentation layer
async fn render(mut events: broadcast::Receiver<UiEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "renderer lagged behind UI events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match event {
            UiEvent::ListeningStarted => println!("[mic] listening..."),
            UiEvent::CaptureError { reason } => println!("[mic] {reason}"),
            UiEvent::StageChanged(Stage::Heard(text)) => println!("[heard] {text}"),
            UiEvent::StageChanged(Stage::Classified(category)) => println!("[classified] {category}"),
            UiEvent::Status { text } => println!("[status] {text}"),
            UiEvent::ContrastChanged { mode } => println!("[display] {mode} mode"),
            UiEvent::TextScaleChanged { scale, font_px } => {
                println!("[display] text {scale}x ({font_px}px)")
            }
            UiEvent::ShowPanel { panel, text } => println!("[{panel}] {text}"),
            UiEvent::HidePanel { panel: Panel::Error } => {}
            UiEvent::HidePanel { panel } => println!("[{panel}] hidden"),
            UiEvent::UnknownAction { action } => println!("[warn] unknown action {action:?}"),
            _ => {}
        }
    }
}
