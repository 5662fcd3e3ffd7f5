// SPDX-License-Identifier: MIT

//! Runtime state threaded through a turn

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use super::delta::{PassageUpdate, StateDelta};
use super::schema::{
    Citation, GroundingVerdict, Route, Turn, UsefulnessVerdict, UserProfile,
};
use crate::adk::retrieval::Passage;
use crate::rag::graph::StepName;

/// The single record every step reads and the checkpoint stores.
///
/// `conversation_history` and `trace` only grow; every other field is
/// last-write-wins. Per-turn fields are reset by [`WorkflowState::begin_turn`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowState {
    pub conversation_history: Vec<Turn>,
    pub current_question: String,
    pub route: Option<Route>,
    pub candidate_passages: Vec<Passage>,
    pub compressed_context: String,
    pub answer: String,
    pub citations: Vec<Citation>,
    pub user_profile: UserProfile,
    pub grounding_verdict: Option<GroundingVerdict>,
    pub usefulness_verdict: Option<UsefulnessVerdict>,
    pub retry_count: u32,
    pub regeneration_count: u32,
    pub low_confidence: bool,
    pub trace: Vec<StepName>,
    pub turns_completed: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new turn: record the user message and clear per-turn fields
    pub fn begin_turn(&mut self, message: &str) {
        self.conversation_history.push(Turn::user(message));
        self.current_question = message.to_string();
        self.route = None;
        self.candidate_passages.clear();
        self.compressed_context.clear();
        self.answer.clear();
        self.citations.clear();
        self.grounding_verdict = None;
        self.usefulness_verdict = None;
        self.retry_count = 0;
        self.regeneration_count = 0;
        self.low_confidence = false;
        self.trace.clear();
    }

    /// Merge a step delta into the state.
    ///
    /// Returns the profile update the step suggested, which the engine holds
    /// until the turn commits.
    pub fn apply(&mut self, delta: StateDelta) -> Option<UserProfile> {
        if let Some(route) = delta.route {
            match self.route {
                None => self.route = Some(route),
                Some(existing) if existing != route => {
                    log::warn!("Ignoring route change {} -> {} within a turn", existing, route);
                }
                Some(_) => {}
            }
        }
        if let Some(question) = delta.current_question {
            self.current_question = question;
        }
        match delta.passages {
            Some(PassageUpdate::Replace(passages)) => {
                self.candidate_passages = dedup_by_content(passages);
            }
            Some(PassageUpdate::Append(passages)) => {
                let mut merged = std::mem::take(&mut self.candidate_passages);
                merged.extend(passages);
                self.candidate_passages = dedup_by_content(merged);
            }
            None => {}
        }
        if let Some(context) = delta.compressed_context {
            self.compressed_context = context;
        }
        if let Some(answer) = delta.answer {
            self.answer = answer;
        }
        if let Some(citations) = delta.citations {
            self.citations = citations;
        }
        if let Some(verdict) = delta.grounding_verdict {
            self.grounding_verdict = Some(verdict);
        }
        if let Some(verdict) = delta.usefulness_verdict {
            self.usefulness_verdict = Some(verdict);
        }
        if let Some(count) = delta.retry_count {
            if count < self.retry_count {
                log::warn!(
                    "Ignoring retry_count decrease {} -> {}",
                    self.retry_count,
                    count
                );
            } else {
                self.retry_count = count;
            }
        }
        delta.profile_update
    }

    pub fn record_step(&mut self, step: StepName) {
        self.trace.push(step);
    }

    pub fn note_regeneration(&mut self) {
        self.regeneration_count += 1;
    }

    /// Close the turn: append the answer to history and fold in the profile update
    pub fn finish_turn(&mut self, profile_update: Option<&UserProfile>) {
        if !self.answer.is_empty() {
            self.conversation_history.push(Turn::assistant(self.answer.clone()));
        }
        if let Some(update) = profile_update {
            self.user_profile.merge(update);
        }
        // conversational turns end before verification; they are positive by definition
        if self.route == Some(Route::Conversational) {
            self.grounding_verdict.get_or_insert(GroundingVerdict::Grounded);
            self.usefulness_verdict.get_or_insert(UsefulnessVerdict::Useful);
        }
        self.low_confidence = self.route == Some(Route::Research)
            && self.grounding_verdict == Some(GroundingVerdict::Hallucinated);
        self.turns_completed += 1;
        self.updated_at = Some(Utc::now());
    }

    /// Context for prompting: the compressed summary, or raw passages if it is empty
    pub fn context_text(&self) -> String {
        if !self.compressed_context.trim().is_empty() {
            return self.compressed_context.clone();
        }
        self.candidate_passages
            .iter()
            .map(|p| p.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Conversation history as `role: text` lines
    pub fn render_history(&self) -> String {
        self.conversation_history
            .iter()
            .map(|t| format!("{}: {}", t.role, t.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn trace_names(&self) -> Vec<String> {
        self.trace.iter().map(|s| s.to_string()).collect()
    }

    /// JSON projection used by transition conditions
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Remove passages whose content was already seen, keeping first occurrences in order
pub fn dedup_by_content(passages: Vec<Passage>) -> Vec<Passage> {
    let mut seen = HashSet::new();
    passages
        .into_iter()
        .filter(|p| seen.insert(p.content.clone()))
        .collect()
}
