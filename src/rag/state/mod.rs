// SPDX-License-Identifier: MIT

//! State management for the RAG workflow
//!
//! This module provides:
//! - `WorkflowState` - the record threaded through every step and checkpointed per turn
//! - `StateDelta` - the partial update a step returns
//! - value types for routes, verdicts, citations and history

mod delta;
mod schema;
mod store;

pub use delta::{PassageUpdate, StateDelta};
pub use schema::{
    Citation, GroundingVerdict, Role, Route, Turn, UsefulnessVerdict, UserProfile,
};
pub use store::{dedup_by_content, WorkflowState};
