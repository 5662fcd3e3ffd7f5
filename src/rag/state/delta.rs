// SPDX-License-Identifier: MIT

//! Partial state updates returned by steps

use super::schema::{Citation, GroundingVerdict, Route, UsefulnessVerdict, UserProfile};
use crate::adk::retrieval::Passage;

/// How a step changes the candidate passages
#[derive(Debug, Clone, PartialEq)]
pub enum PassageUpdate {
    /// Replace the whole list
    Replace(Vec<Passage>),
    /// Concatenate onto the current list
    Append(Vec<Passage>),
}

/// Output of a step. `None` fields leave the state untouched.
///
/// Steps never mutate `WorkflowState` directly; the engine merges the delta
/// with [`WorkflowState::apply`](super::WorkflowState::apply).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    pub route: Option<Route>,
    pub current_question: Option<String>,
    pub passages: Option<PassageUpdate>,
    pub compressed_context: Option<String>,
    pub answer: Option<String>,
    pub citations: Option<Vec<Citation>>,
    pub grounding_verdict: Option<GroundingVerdict>,
    pub usefulness_verdict: Option<UsefulnessVerdict>,
    pub retry_count: Option<u32>,
    /// Facts to remember about the user, applied when the turn commits
    pub profile_update: Option<UserProfile>,
}

impl StateDelta {
    pub fn new() -> Self {
        Self::default()
    }
}
