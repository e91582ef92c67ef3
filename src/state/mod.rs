//! State machine module for the assistant pipeline
//!
//! Provides an explicit phase machine with three phases:
//! - Idle: no session open, nothing in flight
//! - Listening: a mic session is capturing
//! - Dispatching: a transcript is with the classifier

mod machine;

pub use machine::{Phase, PhaseInput, PhaseMachine};
