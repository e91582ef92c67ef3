//! Shared phase machine
//!
//! Tracks where the assistant is in the `Idle -> Listening -> Dispatching ->
//! Idle` cycle. The mic controller guards sessions on its own; this machine
//! is the single view of the whole pipeline that the UI and logs see.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::UiEvent;

/// The three phases of the assistant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for a gesture or re-arm
    #[default]
    Idle,
    /// A mic session is open
    Listening,
    /// A transcript was sent, waiting for the classifier reply
    Dispatching,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "Idle"),
            Phase::Listening => write!(f, "Listening"),
            Phase::Dispatching => write!(f, "Dispatching"),
        }
    }
}

/// Named inputs of the phase machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseInput {
    /// Mic session opened
    ListeningStarted,
    /// Transcript forwarded to the classifier
    TranscriptSent,
    /// Session ended without a transcript (error, stop, silence)
    SessionEnded,
    /// Classifier reply applied
    EffectApplied,
    /// Classifier reported an error
    ServerError,
}

pub struct PhaseMachine {
    phase: Phase,
    /// Time when the current non-Idle phase was entered
    entered_at: Option<Instant>,
    event_tx: broadcast::Sender<UiEvent>,
}

impl PhaseMachine {
    pub fn new(event_tx: broadcast::Sender<UiEvent>) -> Self {
        Self {
            phase: Phase::Idle,
            entered_at: None,
            event_tx,
        }
    }

    /// Get the current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Feed an input, returning the phase after it.
    ///
    /// Inputs that have no edge from the current phase are logged and leave
    /// the phase unchanged.
    pub fn handle(&mut self, input: PhaseInput) -> Phase {
        match Self::next_phase(self.phase, input) {
            Some(next) if next != self.phase => self.transition_to(next),
            Some(_) => {}
            None => {
                warn!(phase = %self.phase, ?input, "ignoring input with no transition");
            }
        }
        self.phase
    }

    fn next_phase(phase: Phase, input: PhaseInput) -> Option<Phase> {
        use PhaseInput::*;

        match (phase, input) {
            (Phase::Idle | Phase::Dispatching, ListeningStarted) => Some(Phase::Listening),
            (Phase::Listening, TranscriptSent) => Some(Phase::Dispatching),
            (Phase::Listening, SessionEnded) => Some(Phase::Idle),
            (Phase::Dispatching, EffectApplied | ServerError) => Some(Phase::Idle),
            // A reply can land after a re-armed session already started
            (Phase::Listening, EffectApplied | ServerError) => Some(Phase::Listening),
            (Phase::Idle, SessionEnded | EffectApplied | ServerError) => Some(Phase::Idle),
            _ => None,
        }
    }

    fn transition_to(&mut self, new_phase: Phase) {
        let old_phase = self.phase;
        let duration_ms = self
            .entered_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);

        info!(
            from = %old_phase,
            to = %new_phase,
            duration_ms = duration_ms,
            "phase transition"
        );

        self.phase = new_phase;
        self.entered_at = if new_phase != Phase::Idle {
            Some(Instant::now())
        } else {
            None
        };

        let event = UiEvent::PhaseChanged {
            from: old_phase,
            to: new_phase,
        };
        debug!(%event, "emitting phase event");
        let _ = self.event_tx.send(event);
    }
}
