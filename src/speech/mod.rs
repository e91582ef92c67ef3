//! Speech output module: voice selection and spoken feedback

mod speaker;
mod voice;

pub use speaker::{ConsoleVoice, Speaker, SpeechError, SpeechOutput, SpeechSettings, Utterance};
pub use voice::{select_voice, Voice};

#[cfg(test)]
pub(crate) use speaker::tests::RecordingOutput;
