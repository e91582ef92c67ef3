//! UI signals emitted by the mic controller, the dispatcher and the phase
//! machine.
//!
//! Nothing in the core touches presentation state directly; a renderer
//! subscribes to these and decides how to show them.

use serde::{Deserialize, Serialize};

use crate::prefs::ContrastMode;
use crate::state::Phase;

/// Panels the dispatcher can show and auto-dismiss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    Identity,
    Time,
    Emergency,
    Error,
    Reminder,
}

impl std::fmt::Display for Panel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Panel::Identity => write!(f, "identity"),
            Panel::Time => write!(f, "time"),
            Panel::Emergency => write!(f, "emergency"),
            Panel::Error => write!(f, "error"),
            Panel::Reminder => write!(f, "reminder"),
        }
    }
}

/// Processing stages shown to the user while a command travels through the
/// pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "text", rename_all = "snake_case")]
pub enum Stage {
    /// Mic is open
    Listening,
    /// Transcript captured
    Heard(String),
    /// Server classified the command
    Classified(String),
    /// Effect applied, feedback text
    Applied(String),
}

/// Events consumed by the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    /// Mic session opened
    ListeningStarted,

    /// Mic session closed, for any reason
    ListeningEnded,

    /// A normalized transcript is ready to be classified
    TranscriptReady { text: String },

    /// Capture failed; `reason` is human-readable
    CaptureError { reason: String },

    /// Contrast mode applied
    ContrastChanged { mode: ContrastMode },

    /// Text scale applied
    TextScaleChanged {
        /// Multiplier over the base font size
        scale: f64,
        /// Resulting absolute font size in pixels
        font_px: f64,
    },

    /// Show a panel with the given text
    ShowPanel { panel: Panel, text: String },

    /// Hide a panel (auto-dismiss fired)
    HidePanel { panel: Panel },

    /// The server sent an action this client does not know
    UnknownAction { action: String },

    /// Status line text
    Status { text: String },

    /// Pipeline stage progress
    StageChanged(Stage),

    /// Shared phase machine moved
    PhaseChanged { from: Phase, to: Phase },
}

impl std::fmt::Display for UiEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UiEvent::ListeningStarted => write!(f, "LISTENING_STARTED"),
            UiEvent::ListeningEnded => write!(f, "LISTENING_ENDED"),
            UiEvent::TranscriptReady { text } => write!(f, "TRANSCRIPT_READY ({text})"),
            UiEvent::CaptureError { reason } => write!(f, "CAPTURE_ERROR ({reason})"),
            UiEvent::ContrastChanged { mode } => write!(f, "CONTRAST_CHANGED ({mode})"),
            UiEvent::TextScaleChanged { scale, font_px } => {
                write!(f, "TEXT_SCALE_CHANGED ({scale}x, {font_px}px)")
            }
            UiEvent::ShowPanel { panel, .. } => write!(f, "SHOW_PANEL ({panel})"),
            UiEvent::HidePanel { panel } => write!(f, "HIDE_PANEL ({panel})"),
            UiEvent::UnknownAction { action } => write!(f, "UNKNOWN_ACTION ({action})"),
            UiEvent::Status { text } => write!(f, "STATUS ({text})"),
            UiEvent::StageChanged(stage) => write!(f, "STAGE_CHANGED ({stage:?})"),
            UiEvent::PhaseChanged { from, to } => write!(f, "PHASE_CHANGED ({from} -> {to})"),
        }
    }
}
