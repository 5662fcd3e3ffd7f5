// SPDX-License-Identifier: MIT

//! Graph workflow executor
//!
//! Runs one conversation turn: lock the conversation, load its checkpoint,
//! walk the transition table from the entry step until END, then commit.
//! The checkpoint is only written after END, so a failed or dropped turn
//! leaves the previous checkpoint in place.

use std::sync::Arc;
use tokio::sync::mpsc;

use super::transitions::TransitionTable;
use super::types::{RunLimits, StepName, Target, TurnEvent};
use crate::adk::error::RagError;
use crate::rag::checkpoint::{ConversationLocks, ConversationStore};
use crate::rag::profile::ProfileStore;
use crate::rag::registry::StepRegistry;
use crate::rag::state::{UserProfile, WorkflowState};
use crate::rag::steps::StepContext;

pub const DEFAULT_USER: &str = "default";

/// Result of a committed turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub conversation_id: String,
    pub state: WorkflowState,
    /// False when the checkpoint could not be written
    pub durable: bool,
}

/// The self-correcting RAG workflow engine
pub struct Engine {
    steps: StepRegistry,
    transitions: TransitionTable,
    context: StepContext,
    conversations: Arc<dyn ConversationStore>,
    profiles: Arc<dyn ProfileStore>,
    locks: ConversationLocks,
    limits: RunLimits,
    default_user: String,
}

impl Engine {
    /// Create an engine, checking the transition table against the registered steps
    pub async fn new(
        steps: StepRegistry,
        transitions: TransitionTable,
        context: StepContext,
        conversations: Arc<dyn ConversationStore>,
        profiles: Arc<dyn ProfileStore>,
        limits: RunLimits,
    ) -> Result<Self, RagError> {
        transitions.validate(&steps.names().await)?;
        Ok(Self {
            steps,
            transitions,
            context,
            conversations,
            profiles,
            locks: ConversationLocks::new(),
            limits,
            default_user: DEFAULT_USER.to_string(),
        })
    }

    pub fn with_default_user(mut self, user_id: impl Into<String>) -> Self {
        self.default_user = user_id.into();
        self
    }

    pub fn default_user(&self) -> &str {
        &self.default_user
    }

    pub fn limits(&self) -> &RunLimits {
        &self.limits
    }

    /// Run one turn for the default user
    pub async fn run_turn(
        &self,
        conversation_id: &str,
        message: &str,
    ) -> Result<TurnOutcome, RagError> {
        self.execute(&self.default_user, conversation_id, message, None)
            .await
    }

    /// Run one turn on behalf of `user_id`
    pub async fn run_turn_as(
        &self,
        user_id: &str,
        conversation_id: &str,
        message: &str,
    ) -> Result<TurnOutcome, RagError> {
        self.execute(user_id, conversation_id, message, None).await
    }

    /// Run one turn, reporting step boundaries and the final answer on `events`
    pub async fn run_turn_stream(
        &self,
        user_id: &str,
        conversation_id: &str,
        message: &str,
        events: mpsc::Sender<TurnEvent>,
    ) -> Result<TurnOutcome, RagError> {
        let result = self
            .execute(user_id, conversation_id, message, Some(&events))
            .await;

        let last = match &result {
            Ok(outcome) => TurnEvent::Answer {
                answer: outcome.state.answer.clone(),
                citations: outcome.state.citations.clone(),
                trace: outcome.state.trace.clone(),
                low_confidence: outcome.state.low_confidence,
                durable: outcome.durable,
            },
            Err(e) => TurnEvent::Error {
                message: e.to_string(),
                step: e.failed_step().map(str::to_string),
                retry_safe: e.is_retry_safe(),
            },
        };
        let _ = events.send(last).await;
        result
    }

    /// Latest checkpoint of a conversation
    pub async fn load(&self, conversation_id: &str) -> Result<Option<WorkflowState>, RagError> {
        self.conversations.load(conversation_id).await
    }

    async fn execute(
        &self,
        user_id: &str,
        conversation_id: &str,
        message: &str,
        events: Option<&mpsc::Sender<TurnEvent>>,
    ) -> Result<TurnOutcome, RagError> {
        if conversation_id.trim().is_empty() {
            return Err(RagError::InvalidInput("conversation id is empty".into()));
        }
        if message.trim().is_empty() {
            return Err(RagError::InvalidInput("message is empty".into()));
        }

        let _guard = self.locks.acquire(conversation_id).await;

        let mut state = self
            .conversations
            .load(conversation_id)
            .await?
            .unwrap_or_default();
        state.begin_turn(message);

        // the acting user's stored profile replaces whoever spoke last in this conversation
        match self.load_profile(user_id).await {
            Ok(profile) => state.user_profile = profile,
            Err(e) => log::warn!(
                "Could not load profile for {}, keeping the checkpointed one: {}",
                user_id,
                e
            ),
        }

        log::info!(
            "Turn {} of conversation {} started",
            state.turns_completed + 1,
            conversation_id
        );

        let profile_update = self.walk(&mut state, events).await?;
        self.commit(user_id, conversation_id, state, profile_update)
            .await
    }

    /// Execute steps from the entry until a transition resolves to END
    async fn walk(
        &self,
        state: &mut WorkflowState,
        events: Option<&mpsc::Sender<TurnEvent>>,
    ) -> Result<Option<UserProfile>, RagError> {
        let mut profile_update: Option<UserProfile> = None;
        let mut current = self.transitions.entry();
        let mut executed = 0u32;

        loop {
            if executed >= self.limits.max_steps {
                log::error!("Step budget of {} exhausted", self.limits.max_steps);
                return Err(RagError::LoopBoundExceeded {
                    limit: self.limits.max_steps,
                    trace: state.trace_names(),
                });
            }

            let step = self.steps.get(current).await.ok_or_else(|| {
                RagError::config(format!("step {} is not registered", current))
            })?;

            notify(events, TurnEvent::StepStarted { step: current }).await;
            log::info!("Executing step: {}", current);

            let delta = match step.run(state, &self.context).await {
                Ok(delta) => delta,
                Err(e) => {
                    log::error!("Step {} failed: {}", current, e);
                    return Err(RagError::step(current.as_str(), e, state.trace_names()));
                }
            };

            if let Some(update) = state.apply(delta) {
                profile_update
                    .get_or_insert_with(UserProfile::default)
                    .merge(&update);
            }
            state.record_step(current);
            executed += 1;
            notify(events, TurnEvent::StepCompleted { step: current }).await;

            match self.transitions.next(current, &state.to_json())? {
                Target::End => break,
                Target::Step(next) => {
                    if current == StepName::VerifyGrounding && next == StepName::Generate {
                        state.note_regeneration();
                        log::info!(
                            "Regenerating answer ({}/{})",
                            state.regeneration_count,
                            self.limits.max_regenerations
                        );
                    }
                    current = next;
                }
            }
        }

        Ok(profile_update)
    }

    async fn commit(
        &self,
        user_id: &str,
        conversation_id: &str,
        mut state: WorkflowState,
        profile_update: Option<UserProfile>,
    ) -> Result<TurnOutcome, RagError> {
        state.finish_turn(profile_update.as_ref());

        if profile_update.is_some() {
            if let Err(e) = self.save_profile(user_id, &state.user_profile).await {
                log::warn!("Could not save profile for {}: {}", user_id, e);
            }
        }

        let durable = match self.conversations.save(conversation_id, &state).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!(
                    "Turn for {} completed but was not checkpointed: {}",
                    conversation_id,
                    e
                );
                false
            }
        };

        if state.low_confidence {
            log::warn!(
                "Answer for {} is low confidence after {} regenerations",
                conversation_id,
                state.regeneration_count
            );
        }
        log::info!(
            "Turn of conversation {} finished: {}",
            conversation_id,
            state.trace_names().join(" -> ")
        );

        Ok(TurnOutcome {
            conversation_id: conversation_id.to_string(),
            state,
            durable,
        })
    }

    async fn load_profile(&self, user_id: &str) -> Result<UserProfile, RagError> {
        let limit = self.context.call_timeout();
        tokio::time::timeout(limit, self.profiles.load(user_id))
            .await
            .unwrap_or_else(|_| {
                Err(RagError::store(format!(
                    "profile load timed out after {:?}",
                    limit
                )))
            })
    }

    async fn save_profile(&self, user_id: &str, profile: &UserProfile) -> Result<(), RagError> {
        let limit = self.context.call_timeout();
        tokio::time::timeout(limit, self.profiles.save(user_id, profile))
            .await
            .unwrap_or_else(|_| {
                Err(RagError::store(format!(
                    "profile save timed out after {:?}",
                    limit
                )))
            })
    }
}

async fn notify(events: Option<&mpsc::Sender<TurnEvent>>, event: TurnEvent) {
    if let Some(tx) = events {
        // a disconnected listener does not stop the turn
        let _ = tx.send(event).await;
    }
}
