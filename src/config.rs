//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::dispatch::DispatchSettings;
use crate::mic::CaptureSettings;
use crate::reminders::ReminderSchedule;
use crate::speech::SpeechSettings;

/// Client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address of the classifier server (`host:port`)
    pub server_addr: String,

    /// Directory for persisted preferences
    pub data_dir: PathBuf,

    /// Re-arm the mic after every session
    pub continuous: bool,

    /// Delay before re-arming the mic in continuous mode
    pub restart_backoff: Duration,

    pub capture: CaptureSettings,
    pub speech: SpeechSettings,
    pub dispatch: DispatchSettings,

    /// Daily medication reminder slots
    pub reminders: ReminderSchedule,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var("VOICE_ASSIST_DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => {
                let home = std::env::var("HOME").context("HOME is not set")?;
                PathBuf::from(home)
                    .join(".local")
                    .join("share")
                    .join("voice-assist")
            }
        };

        let server_addr =
            std::env::var("VOICE_ASSIST_SERVER").unwrap_or_else(|_| "127.0.0.1:5000".to_string());

        let mut capture = CaptureSettings::default();
        if let Ok(lang) = std::env::var("VOICE_ASSIST_LANG") {
            capture.language = lang;
        }

        let mut speech = SpeechSettings::default();
        speech.locale = capture.language.clone();
        if let Ok(voice) = std::env::var("VOICE_ASSIST_VOICE") {
            speech.preferred_voice = Some(voice).filter(|v| !v.is_empty());
        }

        let continuous = match std::env::var("VOICE_ASSIST_CONTINUOUS") {
            Ok(raw) => parse_bool(&raw)
                .with_context(|| format!("invalid VOICE_ASSIST_CONTINUOUS: {raw:?}"))?,
            Err(_) => true,
        };

        let restart_ms = match std::env::var("VOICE_ASSIST_RESTART_MS") {
            Ok(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("invalid VOICE_ASSIST_RESTART_MS: {raw:?}"))?,
            Err(_) => 1000,
        };

        let mut dispatch = DispatchSettings::default();
        if let Ok(raw) = std::env::var("VOICE_ASSIST_BASE_FONT_PX") {
            let px = raw
                .parse::<f64>()
                .with_context(|| format!("invalid VOICE_ASSIST_BASE_FONT_PX: {raw:?}"))?;
            anyhow::ensure!(px > 0.0, "VOICE_ASSIST_BASE_FONT_PX must be positive");
            dispatch.base_font_px = px;
        }

        let reminders = match std::env::var("VOICE_ASSIST_MEDICATION_TIMES") {
            Ok(raw) => ReminderSchedule::parse(&raw)
                .with_context(|| format!("invalid VOICE_ASSIST_MEDICATION_TIMES: {raw:?}"))?,
            Err(_) => ReminderSchedule::default(),
        };

        Ok(Self {
            server_addr,
            data_dir,
            continuous,
            restart_backoff: Duration::from_millis(restart_ms),
            capture,
            speech,
            dispatch,
            reminders,
        })
    }

    /// Path of the preference file inside the data directory
    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join("preferences.json")
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_load() {
        let config = Config::load().unwrap();
        assert!(config.preferences_path().ends_with("preferences.json"));
        assert!(!config.server_addr.is_empty());
        assert!(config.dispatch.base_font_px > 0.0);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
