// SPDX-License-Identifier: MIT

//! Graph-based workflow execution
//!
//! This module provides the transition table and the engine that walks it
//! one step at a time for each conversation turn.

pub mod executor;
mod transitions;
pub mod types;

pub use executor::{Engine, TurnOutcome, DEFAULT_USER};
pub use transitions::TransitionTable;
pub use types::{EdgeDef, RunLimits, StepName, Target, TurnEvent};
