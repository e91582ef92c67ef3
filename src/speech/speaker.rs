//! Spoken feedback
//!
//! [`Speaker`] wraps a platform [`SpeechOutput`] with the cancel-before-speak
//! rule and the voice preference. Failures are logged and swallowed.

use tracing::{debug, info, warn};

use super::voice::{select_voice, Voice};

/// Errors from a speech output platform
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("speech synthesis is unavailable")]
    Unavailable,

    #[error("speech synthesis failed: {0}")]
    Failed(String),
}

/// One utterance to speak
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub rate: f32,
    pub pitch: f32,
    /// `None` uses the platform default voice
    pub voice: Option<Voice>,
}

/// A speech synthesis platform
pub trait SpeechOutput: Send {
    /// Voices currently known to the platform; may be empty until loaded
    fn voices(&self) -> Vec<Voice>;

    fn speak(&mut self, utterance: &Utterance) -> Result<(), SpeechError>;

    fn cancel(&mut self);

    fn is_speaking(&self) -> bool;
}

/// Voice output settings
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechSettings {
    pub rate: f32,
    pub pitch: f32,
    pub locale: String,
    pub preferred_voice: Option<String>,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            rate: 0.9,
            pitch: 1.1,
            locale: "en-US".to_string(),
            preferred_voice: Some("Google US English".to_string()),
        }
    }
}

pub struct Speaker {
    output: Box<dyn SpeechOutput>,
    settings: SpeechSettings,
    voice: Option<Voice>,
}

impl Speaker {
    pub fn new(output: Box<dyn SpeechOutput>, settings: SpeechSettings) -> Self {
        let mut speaker = Self {
            output,
            settings,
            voice: None,
        };
        speaker.refresh_voices();
        speaker
    }

    /// Re-resolve the voice; call whenever the platform's voice list changes
    pub fn refresh_voices(&mut self) {
        let voices = self.output.voices();
        self.voice = select_voice(
            &voices,
            &self.settings.locale,
            self.settings.preferred_voice.as_deref(),
        )
        .cloned();

        match &self.voice {
            Some(voice) => info!(voice = %voice.name, lang = %voice.lang, "speech voice selected"),
            None => debug!(available = voices.len(), "using platform default voice"),
        }
    }

    pub fn voice(&self) -> Option<&Voice> {
        self.voice.as_ref()
    }

    /// Speak `text`, cutting off anything still being spoken
    pub fn say(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }

        if self.output.is_speaking() {
            debug!("cancelling in-flight speech");
        }
        self.output.cancel();

        let utterance = Utterance {
            text: text.to_string(),
            rate: self.settings.rate,
            pitch: self.settings.pitch,
            voice: self.voice.clone(),
        };

        if let Err(e) = self.output.speak(&utterance) {
            warn!(?e, "spoken feedback failed");
        }
    }
}

/// Speech output that writes utterances to the log and standard output
#[derive(Debug, Default)]
pub struct ConsoleVoice;

impl SpeechOutput for ConsoleVoice {
    fn voices(&self) -> Vec<Voice> {
        vec![Voice::new("Console", "en-US")]
    }

    fn speak(&mut self, utterance: &Utterance) -> Result<(), SpeechError> {
        let voice = utterance.voice.as_ref().map(|v| v.name.as_str()).unwrap_or("default");
        info!(voice, rate = utterance.rate, pitch = utterance.pitch, text = %utterance.text, "speaking");
        println!("[voice] {}", utterance.text);
        Ok(())
    }

    fn cancel(&mut self) {}

    fn is_speaking(&self) -> bool {
        false
    }
}
