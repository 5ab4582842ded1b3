//! Application-level orchestration.
//!
//! This module owns the run lifecycle (start, event stream, terminal outcome) and post-run
//! processing such as the history refresh. Presentation layers call into this module and
//! observe it only through [`UiEvent`]s.

mod controller;
mod post_process;
mod state;

pub use controller::{RunController, RunOutcome, UiEvent};
pub use state::Phase;
