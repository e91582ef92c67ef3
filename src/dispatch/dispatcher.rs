//! Response-to-effect dispatch
//!
//! Maps one classifier [`Response`] to a preference mutation, UI signals and
//! spoken feedback. `apply` takes `&mut self`, so updates to a preference key
//! are serialized by whoever owns the dispatcher; the last response applied
//! wins.

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::events::{Panel, Stage, UiEvent};
use crate::prefs::{ContrastMode, PreferenceStore, Preferences};
use crate::speech::Speaker;

use super::action::{Action, Direction, Response};
use super::timers::PanelTimers;

/// Fixed dispatch constants
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSettings {
    /// Multiplier applied by one `increase`; `decrease` uses its inverse
    pub growth_factor: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    /// Font size at scale 1.0, in pixels
    pub base_font_px: f64,
    pub identity_dismiss: Duration,
    pub emergency_dismiss: Duration,
    pub error_dismiss: Duration,
    pub reminder_dismiss: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            growth_factor: 1.2,
            min_scale: 0.5,
            max_scale: 3.0,
            base_font_px: 16.0,
            identity_dismiss: Duration::from_secs(60),
            emergency_dismiss: Duration::from_secs(5),
            error_dismiss: Duration::from_secs(5),
            reminder_dismiss: Duration::from_secs(10 * 60),
        }
    }
}

impl DispatchSettings {
    pub fn scale_bounds(&self) -> (f64, f64) {
        (self.min_scale, self.max_scale)
    }
}

/// What `apply` did
#[derive(Debug, Clone, PartialEq)]
pub enum AppliedEffect {
    ContrastChanged(ContrastMode),
    TextScaleChanged { scale: f64, font_px: f64 },
    PanelShown(Panel),
    /// Recognized action that changes nothing (`none`, or no usable direction)
    Noop,
    Unknown(String),
}

pub struct ActionDispatcher {
    prefs: PreferenceStore,
    speaker: Speaker,
    timers: PanelTimers,
    settings: DispatchSettings,
    event_tx: broadcast::Sender<UiEvent>,
}

impl ActionDispatcher {
    pub fn new(
        prefs: PreferenceStore,
        speaker: Speaker,
        settings: DispatchSettings,
        event_tx: broadcast::Sender<UiEvent>,
    ) -> Self {
        Self {
            prefs,
            speaker,
            timers: PanelTimers::new(event_tx.clone()),
            settings,
            event_tx,
        }
    }

    pub fn preferences(&self) -> Preferences {
        self.prefs.preferences()
    }

    pub fn speaker_mut(&mut self) -> &mut Speaker {
        &mut self.speaker
    }

    /// Number of panel dismissals still pending
    pub fn pending_dismissals(&self) -> usize {
        self.timers.active()
    }

    /// Re-emit the loaded preferences so the presentation layer can apply them
    pub fn restore(&self) {
        let prefs = self.prefs.preferences();
        info!(contrast = %prefs.contrast, text_scale = prefs.text_scale, "restoring preferences");
        self.emit(UiEvent::ContrastChanged {
            mode: prefs.contrast,
        });
        self.emit(UiEvent::TextScaleChanged {
            scale: prefs.text_scale,
            font_px: self.font_px(prefs.text_scale),
        });
    }

    /// Apply a classifier response. Never fails.
    pub fn apply(&mut self, response: &Response) -> AppliedEffect {
        let action = response.action();
        let feedback = response.feedback().to_string();

        info!(%action, direction = ?response.direction, "applying response");

        // A fresh reply supersedes the last server error
        if self.timers.cancel(Panel::Error) {
            self.emit(UiEvent::HidePanel { panel: Panel::Error });
        }

        if let Some(category) = response.category_label() {
            self.emit(UiEvent::StageChanged(Stage::Classified(category)));
        }

        let effect = match action {
            Action::AdjustContrast => self.adjust_contrast(response.direction()),
            Action::AdjustText => {
                let direction = response.direction().or_else(|| response.label_direction());
                self.adjust_text(direction)
            }
            Action::ShowIdentity => {
                let dismiss = self.settings.identity_dismiss;
                self.show_panel(Panel::Identity, feedback.clone(), Some(dismiss))
            }
            Action::ShowTime => self.show_panel(Panel::Time, time_text(response), None),
            Action::TriggerEmergency => {
                let dismiss = self.settings.emergency_dismiss;
                self.show_panel(Panel::Emergency, feedback.clone(), Some(dismiss))
            }
            Action::None => AppliedEffect::Noop,
            Action::Unknown(name) => {
                warn!(action = %Action::Unknown(name.clone()), "unknown action");
                self.emit(UiEvent::UnknownAction { action: name.clone() });
                AppliedEffect::Unknown(name)
            }
        };

        self.emit(UiEvent::Status {
            text: feedback.clone(),
        });
        self.emit(UiEvent::StageChanged(Stage::Applied(feedback.clone())));
        self.speaker.say(&feedback);

        debug!(?effect, "response applied");
        effect
    }

    /// Surface a server-reported error
    pub fn show_error(&mut self, message: &str) {
        warn!(error = message, "server reported an error");
        self.emit(UiEvent::Status {
            text: message.to_string(),
        });
        let dismiss = self.settings.error_dismiss;
        self.show_panel(Panel::Error, message.to_string(), Some(dismiss));
    }

    /// Show and speak a scheduled reminder
    pub fn show_reminder(&mut self, text: &str) {
        info!(text, "reminder due");
        self.emit(UiEvent::Status {
            text: text.to_string(),
        });
        let dismiss = self.settings.reminder_dismiss;
        self.show_panel(Panel::Reminder, text.to_string(), Some(dismiss));
        self.speaker.say(text);
    }

    fn adjust_contrast(&mut self, direction: Option<Direction>) -> AppliedEffect {
        let current = self.prefs.preferences().contrast;
        let mode = match direction {
            Some(Direction::Dark | Direction::Decrease) => ContrastMode::Dark,
            Some(Direction::Light | Direction::Increase) => ContrastMode::Light,
            None => current.toggled(),
        };

        if let Err(e) = self.prefs.set_contrast(mode) {
            warn!(?e, "failed to persist contrast mode");
        }

        info!(from = %current, to = %mode, "contrast changed");
        self.emit(UiEvent::ContrastChanged { mode });
        AppliedEffect::ContrastChanged(mode)
    }

    fn adjust_text(&mut self, direction: Option<Direction>) -> AppliedEffect {
        let factor = match direction {
            Some(Direction::Increase) => self.settings.growth_factor,
            Some(Direction::Decrease) => 1.0 / self.settings.growth_factor,
            other => {
                warn!(direction = ?other, "text adjustment needs increase or decrease");
                return AppliedEffect::Noop;
            }
        };

        let current = self.prefs.preferences().text_scale;
        let scale = round_scale(current * factor).clamp(self.settings.min_scale, self.settings.max_scale);

        if let Err(e) = self.prefs.set_text_scale(scale) {
            warn!(?e, "failed to persist text scale");
        }

        let font_px = self.font_px(scale);
        info!(from = current, to = scale, font_px, "text scale changed");
        self.emit(UiEvent::TextScaleChanged { scale, font_px });
        AppliedEffect::TextScaleChanged { scale, font_px }
    }

    fn show_panel(&mut self, panel: Panel, text: String, dismiss_after: Option<Duration>) -> AppliedEffect {
        self.emit(UiEvent::ShowPanel { panel, text });
        if let Some(after) = dismiss_after {
            self.timers.schedule(panel, after);
        }
        AppliedEffect::PanelShown(panel)
    }

    fn font_px(&self, scale: f64) -> f64 {
        round_scale(self.settings.base_font_px * scale)
    }

    fn emit(&self, event: UiEvent) {
        let _ = self.event_tx.send(event);
    }
}

/// Keep four decimals so repeated multiplication does not drift
fn round_scale(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Time text for the time panel: explicit field, else whatever follows
/// `": "` in the feedback, else the local clock
fn time_text(response: &Response) -> String {
    if let Some(time) = response.time.as_deref().filter(|t| !t.trim().is_empty()) {
        return time.trim().to_string();
    }
    if let Some((_, time)) = response.feedback().split_once(": ") {
        if !time.trim().is_empty() {
            return time.trim().to_string();
        }
    }
    chrono::Local::now().format("%H:%M").to_string()
}
