//! Integration tests for the corrective RAG workflow
//!
//! These tests drive whole turns through the engine using mock gateways.

use async_trait::async_trait;
use corrective_rag::adk::error::RagError;
use corrective_rag::adk::model::Model;
use corrective_rag::adk::retrieval::memory::MemoryRetriever;
use corrective_rag::adk::retrieval::{HybridQuery, Passage, Retriever};
use corrective_rag::rag::builder::Builder;
use corrective_rag::rag::checkpoint::{ConversationStore, FileConversationStore, MemoryConversationStore};
use corrective_rag::rag::config::{Backend, RagConfig};
use corrective_rag::rag::graph::{Engine, StepName};
use corrective_rag::rag::profile::{MemoryProfileStore, ProfileStore};
use corrective_rag::rag::state::{GroundingVerdict, Route, StateDelta, Turn, UsefulnessVerdict, WorkflowState};
use corrective_rag::rag::steps::{Step, StepContext};
use serde_json::Map;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock Components
// ============================================================================

/// Mock model answering each prompt by the first marker it contains
struct MockModel {
    rules: Vec<(String, String)>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
}

impl MockModel {
    fn new(rules: &[(&str, &str)]) -> Self {
        Self {
            rules: rules
                .iter()
                .map(|(m, r)| (m.to_string(), r.to_string()))
                .collect(),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn calls_matching(&self, marker: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.contains(marker))
            .count()
    }
}

#[async_trait]
impl Model for MockModel {
    fn provider(&self) -> &str {
        "mock"
    }

    async fn complete(&self, prompt: &str) -> Result<String, RagError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.calls.lock().unwrap().push(prompt.to_string());
        self.rules
            .iter()
            .find(|(marker, _)| prompt.contains(marker.as_str()))
            .map(|(_, reply)| reply.clone())
            .ok_or_else(|| RagError::model("mock", "unexpected prompt"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
    }
}

/// Wraps a retriever and counts searches
struct CountingRetriever {
    inner: MemoryRetriever,
    searches: AtomicUsize,
}

impl CountingRetriever {
    fn new(inner: MemoryRetriever) -> Self {
        Self {
            inner,
            searches: AtomicUsize::new(0),
        }
    }

    fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Retriever for CountingRetriever {
    fn provider(&self) -> &str {
        "counting"
    }

    async fn hybrid_search(&self, query: &HybridQuery) -> Result<Vec<Passage>, RagError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.inner.hybrid_search(query).await
    }
}

/// Route step that records the history it was given
struct RecordingRoute {
    seen: Arc<Mutex<Vec<Vec<Turn>>>>,
}

#[async_trait]
impl Step for RecordingRoute {
    fn name(&self) -> StepName {
        StepName::Route
    }

    async fn run(&self, state: &WorkflowState, _ctx: &StepContext) -> Result<StateDelta, RagError> {
        self.seen
            .lock()
            .unwrap()
            .push(state.conversation_history.clone());
        Ok(StateDelta {
            route: Some(Route::Conversational),
            ..Default::default()
        })
    }
}

/// Generate step that always fails
struct FailingGenerate;

#[async_trait]
impl Step for FailingGenerate {
    fn name(&self) -> StepName {
        StepName::Generate
    }

    async fn run(&self, _state: &WorkflowState, _ctx: &StepContext) -> Result<StateDelta, RagError> {
        Err(RagError::model("mock", "generation backend crashed"))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

const PROOF_OF_WORK: [&str; 5] = [
    "Proof-of-work requires miners to find a nonce so the block hash falls below a target.",
    "The difficulty target adjusts every 2016 blocks to keep block time near ten minutes.",
    "Miners bundle transactions into a block and hash the block header repeatedly.",
    "The longest chain represents the greatest amount of proof-of-work effort.",
    "Changing a past block requires redoing the proof-of-work of all blocks after it.",
];

async fn bitcoin_store() -> MemoryRetriever {
    let store = MemoryRetriever::new();
    for (i, text) in PROOF_OF_WORK.iter().enumerate() {
        let mut metadata = Map::new();
        metadata.insert("source".into(), format!("bitcoin.pdf#{}", i + 1).into());
        store.insert(*text, metadata, vec![1.0, 0.0, 0.0]).await;
    }
    store
}

fn conversational_rules() -> Vec<(&'static str, &'static str)> {
    vec![
        ("Route the user question", "conversational"),
        ("friendly technical expert", "Nice to meet you, Sam!"),
    ]
}

fn research_rules(grounding: &'static str, usefulness: &'static str) -> Vec<(&'static str, &'static str)> {
    vec![
        ("Route the user question", "research"),
        ("search queries", "proof of work mining\nnonce hash target\nblock difficulty"),
        ("Extract ONLY", "Miners must find a nonce so the block hash falls below a target."),
        (
            "friendly technical expert",
            "Proof-of-work means miners search for a nonce so the block hash falls below a target [1].",
        ),
        ("FABRICATED", grounding),
        ("reasonable response", usefulness),
        ("Rewrite for better search", "obscure incantation meaning"),
    ]
}

fn memory_config() -> RagConfig {
    let mut config = RagConfig::default();
    config.stores.retrieval = Backend::Memory;
    config.stores.checkpoints = Backend::Memory;
    config.stores.profiles = Backend::Memory;
    config.call_timeout_secs = 5;
    config
}

struct Harness {
    engine: Engine,
    model: Arc<MockModel>,
    retriever: Arc<CountingRetriever>,
    conversations: Arc<MemoryConversationStore>,
    profiles: Arc<MemoryProfileStore>,
}

async fn harness(model: MockModel, store: MemoryRetriever) -> Harness {
    harness_with(model, store, vec![]).await
}

async fn harness_with(model: MockModel, store: MemoryRetriever, steps: Vec<Arc<dyn Step>>) -> Harness {
    let model = Arc::new(model);
    let retriever = Arc::new(CountingRetriever::new(store));
    let conversations = Arc::new(MemoryConversationStore::new());
    let profiles = Arc::new(MemoryProfileStore::new());

    let mut builder = Builder::new(memory_config())
        .with_model(model.clone())
        .with_retriever(retriever.clone())
        .with_conversation_store(conversations.clone())
        .with_profile_store(profiles.clone());
    for step in steps {
        builder = builder.with_step(step);
    }

    Harness {
        engine: builder.build().await.unwrap(),
        model,
        retriever,
        conversations,
        profiles,
    }
}

fn count(trace: &[StepName], step: StepName) -> usize {
    trace.iter().filter(|s| **s == step).count()
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_scenario_a_introduction_is_conversational() {
    let h = harness(MockModel::new(&conversational_rules()), bitcoin_store().await).await;

    let outcome = h.engine.run_turn("conv-a", "Hi, I'm Sam").await.unwrap();
    let state = &outcome.state;

    assert_eq!(state.route, Some(Route::Conversational));
    assert_eq!(state.answer, "Nice to meet you, Sam!");
    assert_eq!(state.grounding_verdict, Some(GroundingVerdict::Grounded));
    assert_eq!(state.usefulness_verdict, Some(UsefulnessVerdict::Useful));
    assert_eq!(h.retriever.searches(), 0);
    assert!(state.candidate_passages.is_empty());
    assert!(state.citations.is_empty());

    assert_eq!(state.user_profile.name(), Some("Sam"));
    let stored = h.profiles.load("default").await.unwrap();
    assert_eq!(stored.name(), Some("Sam"));

    let checkpoint = h.conversations.load("conv-a").await.unwrap().unwrap();
    assert_eq!(checkpoint.user_profile.name(), Some("Sam"));
    assert_eq!(checkpoint.conversation_history.len(), 2);
}

#[tokio::test]
async fn test_scenario_b_research_with_citations() {
    let h = harness(
        MockModel::new(&research_rules("no", "yes")),
        bitcoin_store().await,
    )
    .await;

    let outcome = h.engine.run_turn("conv-b", "What is proof-of-work?").await.unwrap();
    let state = &outcome.state;

    assert_eq!(state.route, Some(Route::Research));
    assert!(!state.candidate_passages.is_empty());
    assert!(!state.compressed_context.is_empty());
    assert!(state.answer.contains("nonce"));
    assert!(!state.citations.is_empty());
    assert!(state.citations.len() <= 5);
    assert_eq!(state.citations[0].index, 1);
    assert!(state.citations[0].source.starts_with("bitcoin.pdf"));
    assert_eq!(state.retry_count, 0);
    assert!(!state.low_confidence);
    assert_eq!(state.trace.first(), Some(&StepName::Route));
    assert_eq!(state.trace.last(), Some(&StepName::VerifyUsefulness));
    // three expansions plus the original question
    assert_eq!(h.retriever.searches(), 4);
}

#[tokio::test]
async fn test_scenario_c_rewrites_are_bounded() {
    let h = harness(
        MockModel::new(&research_rules("no", "no")),
        MemoryRetriever::new(),
    )
    .await;

    let outcome = h.engine.run_turn("conv-c", "xyzzy plugh quux?").await.unwrap();
    let state = &outcome.state;

    assert_eq!(state.retry_count, 2);
    assert_eq!(count(&state.trace, StepName::Rewrite), 2);
    assert_eq!(count(&state.trace, StepName::Retrieve), 3);
    assert_eq!(state.usefulness_verdict, Some(UsefulnessVerdict::NotUseful));
    assert_eq!(state.trace.last(), Some(&StepName::VerifyUsefulness));
    assert_eq!(state.current_question, "obscure incantation meaning");
    assert!(!state.answer.is_empty());
    assert!(state.candidate_passages.is_empty());
    // compression is skipped when nothing was retrieved
    assert_eq!(h.model.calls_matching("Extract ONLY"), 0);
}

#[tokio::test]
async fn test_scenario_d_regenerations_are_bounded() {
    let h = harness(
        MockModel::new(&research_rules("yes", "yes")),
        bitcoin_store().await,
    )
    .await;

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        h.engine.run_turn("conv-d", "What is proof-of-work?"),
    )
    .await
    .expect("turn must halt")
    .unwrap();
    let state = &outcome.state;

    assert_eq!(state.regeneration_count, 3);
    assert_eq!(count(&state.trace, StepName::Generate), 4);
    assert_eq!(state.trace.last(), Some(&StepName::VerifyGrounding));
    assert_eq!(state.grounding_verdict, Some(GroundingVerdict::Hallucinated));
    assert!(state.low_confidence);
    assert!(!state.answer.is_empty());
    // one assistant turn, however many regenerations happened
    assert_eq!(state.conversation_history.len(), 2);
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test]
async fn test_passages_have_no_duplicate_content() {
    let h = harness(
        MockModel::new(&research_rules("no", "yes")),
        bitcoin_store().await,
    )
    .await;

    let outcome = h.engine.run_turn("conv", "What is proof-of-work?").await.unwrap();
    let contents: HashSet<&str> = outcome
        .state
        .candidate_passages
        .iter()
        .map(|p| p.content.as_str())
        .collect();
    assert_eq!(contents.len(), outcome.state.candidate_passages.len());
    assert_eq!(contents.len(), PROOF_OF_WORK.len());
}

#[tokio::test]
async fn test_new_conversation_history_is_just_the_message() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let h = harness_with(
        MockModel::new(&conversational_rules()),
        MemoryRetriever::new(),
        vec![Arc::new(RecordingRoute { seen: seen.clone() }) as Arc<dyn Step>],
    )
    .await;

    h.engine.run_turn("fresh", "hello there").await.unwrap();
    h.engine.run_turn("fresh", "second message").await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].len(), 1);
    assert_eq!(seen[0][0].text, "hello there");
    // the second turn sees the first exchange plus its own message
    assert_eq!(seen[1].len(), 3);
    assert_eq!(seen[1][2].text, "second message");
}

#[tokio::test]
async fn test_failed_turn_leaves_checkpoint_untouched() {
    let conversations = Arc::new(MemoryConversationStore::new());
    let healthy = Builder::new(memory_config())
        .with_model(Arc::new(MockModel::new(&conversational_rules())))
        .with_retriever(Arc::new(MemoryRetriever::new()))
        .with_conversation_store(conversations.clone())
        .with_profile_store(Arc::new(MemoryProfileStore::new()))
        .build()
        .await
        .unwrap();
    let broken = Builder::new(memory_config())
        .with_model(Arc::new(MockModel::new(&conversational_rules())))
        .with_retriever(Arc::new(MemoryRetriever::new()))
        .with_conversation_store(conversations.clone())
        .with_profile_store(Arc::new(MemoryProfileStore::new()))
        .with_step(Arc::new(FailingGenerate))
        .build()
        .await
        .unwrap();

    healthy.run_turn("conv", "hello").await.unwrap();
    let before = conversations.load("conv").await.unwrap().unwrap();

    let err = broken.run_turn("conv", "hello again").await.unwrap_err();
    assert_eq!(err.failed_step(), Some("generate"));
    assert_eq!(err.partial_trace(), &["route"]);
    assert!(err.is_retry_safe());

    let after = conversations.load("conv").await.unwrap().unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_dropped_turn_persists_nothing() {
    let h = harness(
        MockModel::new(&research_rules("no", "yes")).with_delay(Duration::from_millis(200)),
        bitcoin_store().await,
    )
    .await;

    let result = tokio::time::timeout(
        Duration::from_millis(350),
        h.engine.run_turn("conv", "What is proof-of-work?"),
    )
    .await;
    assert!(result.is_err(), "turn should still be running");
    assert!(h.conversations.load("conv").await.unwrap().is_none());

    // the conversation lock was released with the dropped future
    let retry = tokio::time::timeout(
        Duration::from_secs(5),
        h.engine.run_turn("conv", "What is proof-of-work?"),
    )
    .await;
    assert!(retry.unwrap().is_ok());
}

#[tokio::test]
async fn test_concurrent_turns_on_one_conversation_serialize() {
    let h = harness(
        MockModel::new(&conversational_rules()).with_delay(Duration::from_millis(20)),
        MemoryRetriever::new(),
    )
    .await;

    let (first, second) = tokio::join!(
        h.engine.run_turn("shared", "first message"),
        h.engine.run_turn("shared", "second message"),
    );
    first.unwrap();
    second.unwrap();

    let state = h.conversations.load("shared").await.unwrap().unwrap();
    assert_eq!(state.turns_completed, 2);
    assert_eq!(state.conversation_history.len(), 4);
    let user_messages: Vec<&str> = state
        .conversation_history
        .iter()
        .step_by(2)
        .map(|t| t.text.as_str())
        .collect();
    assert!(user_messages.contains(&"first message"));
    assert!(user_messages.contains(&"second message"));
}

#[tokio::test]
async fn test_profiles_are_per_user() {
    let h = harness(MockModel::new(&conversational_rules()), MemoryRetriever::new()).await;

    h.engine
        .run_turn_as("alice", "conv-alice", "my name is Alice")
        .await
        .unwrap();
    h.engine.run_turn_as("bob", "conv-bob", "hello").await.unwrap();

    assert_eq!(h.profiles.load("alice").await.unwrap().name(), Some("Alice"));
    assert!(h.profiles.load("bob").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_shared_conversation_uses_each_speakers_profile() {
    let h = harness(MockModel::new(&conversational_rules()), MemoryRetriever::new()).await;

    h.engine
        .run_turn_as("alice", "shared", "my name is Alice")
        .await
        .unwrap();
    let outcome = h.engine.run_turn_as("bob", "shared", "hello").await.unwrap();

    assert!(outcome.state.user_profile.is_empty());
    assert!(h.profiles.load("bob").await.unwrap().is_empty());
    assert_eq!(h.profiles.load("alice").await.unwrap().name(), Some("Alice"));

    let calls = h.model.calls.lock().unwrap();
    let last_route = calls
        .iter()
        .rev()
        .find(|p| p.contains("Route the user question"))
        .unwrap();
    assert!(!last_route.contains("Alice"));
}

#[tokio::test]
async fn test_file_checkpoints_survive_engine_restart() {
    let dir = tempfile::tempdir().unwrap();

    for message in ["hello", "hello again"] {
        let engine = Builder::new(memory_config())
            .with_model(Arc::new(MockModel::new(&conversational_rules())))
            .with_retriever(Arc::new(MemoryRetriever::new()))
            .with_conversation_store(Arc::new(FileConversationStore::new(dir.path())))
            .with_profile_store(Arc::new(MemoryProfileStore::new()))
            .build()
            .await
            .unwrap();
        let outcome = engine.run_turn("persisted", message).await.unwrap();
        assert!(outcome.durable);
    }

    let store = FileConversationStore::new(dir.path());
    let state = store.load("persisted").await.unwrap().unwrap();
    assert_eq!(state.turns_completed, 2);
    assert_eq!(state.conversation_history.len(), 4);
}
