//! voice-assist: client layer of a voice-controlled accessibility assistant
//!
//! Captures a spoken command, sends the transcript to a classifier server
//! and applies the action it answers with:
//! - Mic session guard with error recovery and timed re-arm
//! - Dispatch table for contrast, text scale, identity/time/emergency panels
//! - Persisted contrast and text-scale preferences
//! - Spoken feedback with voice selection
//! - Daily medication reminders
//!
//! Presentation is out of scope: every effect is emitted as a [`UiEvent`].

pub mod assistant;
pub mod channel;
pub mod config;
pub mod dispatch;
pub mod events;
pub mod lifecycle;
pub mod mic;
pub mod prefs;
pub mod reminders;
pub mod speech;
pub mod state;

pub use assistant::{Assistant, Inputs, RestartPolicy, UserCommand};
pub use config::Config;
pub use dispatch::{ActionDispatcher, AppliedEffect, Response};
pub use events::UiEvent;
pub use mic::MicController;
