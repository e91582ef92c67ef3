//! Dispatch module: classifier responses to UI effects
//!
//! - `action`: loose wire model of a classifier reply
//! - `dispatcher`: the dispatch table and preference rules
//! - `timers`: per-panel auto-dismiss

mod action;
mod dispatcher;
mod timers;

pub use action::{Action, Direction, Response, DEFAULT_FEEDBACK};
pub use dispatcher::{ActionDispatcher, AppliedEffect, DispatchSettings};
pub use timers::PanelTimers;
