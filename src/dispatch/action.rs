//! Classifier response model
//!
//! The wire shape is deliberately loose: every field is optional so a
//! partial or malformed reply still decodes and degrades to a no-op.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Feedback used when the server sends none
pub const DEFAULT_FEEDBACK: &str = "Adjustment completed";

/// Reply from the classifier for one utterance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub action: Option<String>,

    #[serde(default)]
    pub direction: Option<String>,

    #[serde(default)]
    pub feedback: Option<String>,

    /// Transcript the server classified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,

    /// Classifier category, e.g. `text_size`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Matched label, e.g. `bigger`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// Preformatted time for `show_time`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl Response {
    pub fn new(action: &str, direction: Option<&str>, feedback: &str) -> Self {
        Self {
            action: Some(action.to_string()),
            direction: direction.map(str::to_string),
            feedback: Some(feedback.to_string()),
            ..Default::default()
        }
    }

    pub fn action(&self) -> Action {
        Action::parse(self.action.as_deref())
    }

    /// Explicit direction; unrecognized values count as absent
    pub fn direction(&self) -> Option<Direction> {
        let raw = self.direction.as_deref()?;
        let direction = Direction::parse(raw);
        if direction.is_none() {
            warn!(direction = raw, "ignoring unrecognized direction");
        }
        direction
    }

    /// Direction implied by the matched label, used by the legacy text
    /// action that carried no direction
    pub fn label_direction(&self) -> Option<Direction> {
        let label = self.label.as_deref()?.to_lowercase();
        if ["bigger", "larger", "increase"].iter().any(|w| label.contains(w)) {
            Some(Direction::Increase)
        } else if ["smaller", "decrease"].iter().any(|w| label.contains(w)) {
            Some(Direction::Decrease)
        } else {
            None
        }
    }

    /// Feedback text, defaulted when missing or blank
    pub fn feedback(&self) -> &str {
        self.feedback
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(DEFAULT_FEEDBACK)
    }

    /// Category formatted for display: `text_size` becomes `TEXT SIZE`
    pub fn category_label(&self) -> Option<String> {
        self.category
            .as_deref()
            .map(|c| c.replace('_', " ").to_uppercase())
    }
}

/// UI effect family
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    AdjustContrast,
    AdjustText,
    ShowIdentity,
    ShowTime,
    TriggerEmergency,
    None,
    /// Missing (empty string) or unrecognized action name
    Unknown(String),
}

impl Action {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Action::Unknown(String::new());
        };
        match raw.trim() {
            "adjust_contrast" => Action::AdjustContrast,
            "adjust_text" | "adjust_text_size" => Action::AdjustText,
            "show_identity" => Action::ShowIdentity,
            "show_time" => Action::ShowTime,
            "trigger_emergency" => Action::TriggerEmergency,
            "none" => Action::None,
            other => Action::Unknown(other.to_string()),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::AdjustContrast => write!(f, "adjust_contrast"),
            Action::AdjustText => write!(f, "adjust_text"),
            Action::ShowIdentity => write!(f, "show_identity"),
            Action::ShowTime => write!(f, "show_time"),
            Action::TriggerEmergency => write!(f, "trigger_emergency"),
            Action::None => write!(f, "none"),
            Action::Unknown(name) if name.is_empty() => write!(f, "(missing)"),
            Action::Unknown(name) => write!(f, "{name}"),
        }
    }
}

/// Qualifier of an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increase,
    Decrease,
    Dark,
    Light,
}

impl Direction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "increase" => Some(Direction::Increase),
            "decrease" => Some(Direction::Decrease),
            "dark" => Some(Direction::Dark),
            "light" => Some(Direction::Light),
            _ => None,
        }
    }
}
