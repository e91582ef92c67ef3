//! Mic module: speech capture seam and the session guard around it

mod capture;
mod controller;

pub use capture::{
    describe_error, CaptureError, CaptureEvent, CaptureSettings, ConsoleCapture, SpeechCapture,
};
pub use controller::{normalize_transcript, MicController, MicState};

#[cfg(test)]
pub(crate) use controller::tests::FakeCapture;
