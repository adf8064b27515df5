//! End-to-end pipeline tests over deterministic mock model clients.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use counterpoint_common::{
    Chunk, Config, CounterpointError, Query, Stage, StageStatus, TokenUsage,
};
use counterpoint_core::llm::ChatOutcome;
use counterpoint_core::{ChatModel, CorpusStore, Pipeline, ProgressChannel, TextEmbedder};

const SCOUT_MODEL: &str = "mock/scout";
const MINER_MODEL: &str = "mock/miner";
const ARCHITECT_MODEL: &str = "mock/architect";

#[derive(Clone)]
enum Script {
    Reply(&'static str),
    TransportError,
}

/// Scripted chat model: replies per model name in order, repeating the last
/// entry once the script runs out. Records every call.
struct MockChat {
    scripts: HashMap<&'static str, Vec<Script>>,
    cursors: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<String>>,
}

impl MockChat {
    fn new(scripts: HashMap<&'static str, Vec<Script>>) -> Self {
        Self {
            scripts,
            cursors: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for MockChat {
    async fn complete_json(
        &self,
        model: &str,
        _system: &str,
        _user: &str,
    ) -> Result<ChatOutcome, CounterpointError> {
        self.calls.lock().unwrap().push(model.to_string());

        let script = self
            .scripts
            .get(model)
            .unwrap_or_else(|| panic!("no script for model {model}"));

        let mut cursors = self.cursors.lock().unwrap();
        let cursor = cursors.entry(model.to_string()).or_insert(0);
        let entry = script[(*cursor).min(script.len() - 1)].clone();
        *cursor += 1;

        match entry {
            Script::Reply(content) => Ok(ChatOutcome {
                content: content.to_string(),
                usage: TokenUsage::new(100, 50),
            }),
            Script::TransportError => Err(CounterpointError::LlmCall(
                "connection reset by peer".to_string(),
            )),
        }
    }
}

struct FixedEmbedder;

#[async_trait]
impl TextEmbedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, CounterpointError> {
        Ok(vec![1.0, 0.0])
    }
}

/// Embedder that parks until released, so a test can act while retrieval is
/// still in flight.
struct GatedEmbedder {
    gate: Arc<tokio::sync::Notify>,
}

#[async_trait]
impl TextEmbedder for GatedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, CounterpointError> {
        self.gate.notified().await;
        Ok(vec![1.0, 0.0])
    }
}

fn corpus() -> CorpusStore {
    let chesky = Chunk {
        episode_id: "ep-042".into(),
        guest: "Brian Chesky".into(),
        chunk_id: 7,
        t_start: 754,
        t_end: 815,
        citation: "Brian Chesky (12:34)".into(),
        text: "I disagree with the standard advice that founders should delegate early. \
               The conventional wisdom is wrong for design-led companies."
            .into(),
        contrarian_signals: vec!["i disagree".into(), "conventional wisdom".into()],
        topics: vec!["management".into()],
        embedding: vec![0.95, 0.05],
    };
    let agreeable = Chunk {
        episode_id: "ep-007".into(),
        guest: "Agreeable Guest".into(),
        chunk_id: 1,
        t_start: 60,
        t_end: 120,
        citation: "Agreeable Guest (1:00)".into(),
        text: "Delegation is great, standard advice works.".into(),
        contrarian_signals: vec![],
        topics: vec!["management".into()],
        embedding: vec![0.5, 0.5],
    };
    CorpusStore::from_chunks(vec![chesky, agreeable])
}

fn test_config() -> Config {
    Config {
        openrouter_api_key: "test-key".into(),
        scout_model: SCOUT_MODEL.into(),
        miner_model: MINER_MODEL.into(),
        architect_model: ARCHITECT_MODEL.into(),
        embedding_model: "mock/embed".into(),
        chunks_path: "unused".into(),
        max_per_guest: 1,
        web_host: "127.0.0.1".into(),
        web_port: 0,
    }
}

fn pipeline(chat: Arc<MockChat>) -> Pipeline {
    Pipeline::new(
        Arc::new(corpus()),
        chat,
        Arc::new(FixedEmbedder),
        &test_config(),
    )
}

const SCOUT_REPLY: &str = r#"{
    "conventional_wisdom_steelman": "Delegation frees founders to focus on strategy.",
    "contrarian_findings": [{
        "guest": "Brian Chesky",
        "citation": "Brian Chesky (12:34)",
        "contrarian_position": "Founders of design-led companies should stay in the details.",
        "quote": "I disagree with the standard advice that founders should delegate early.",
        "reasoning_hint": "Delegating taste dilutes the product.",
        "relevance_score": 9
    }]
}"#;

const MINER_REPLY: &str = r#"{
    "structured_arguments": [{
        "core_argument": "Early delegation trades away the founder's taste.",
        "reasoning": ["Taste is the scarce input", "Hired managers optimize locally"],
        "evidence": [{"kind": "story", "description": "Airbnb product reviews"}],
        "best_quote": "I disagree with the standard advice that founders should delegate early.",
        "conditions": {
            "applies_when": ["Product quality is the differentiator"],
            "does_not_apply_when": ["Operational scale dominates"]
        },
        "confidence": "high",
        "sources": ["Brian Chesky (12:34)"]
    }],
    "common_threads": ["Founder involvement preserves quality"]
}"#;

const MINER_UNGROUNDED_REPLY: &str = r#"{
    "structured_arguments": [{
        "core_argument": "Best-effort contrarian case without transcript grounding.",
        "reasoning": ["General reasoning only"],
        "evidence": [],
        "best_quote": "",
        "conditions": {"applies_when": [], "does_not_apply_when": []},
        "confidence": "low",
        "sources": []
    }],
    "common_threads": []
}"#;

const ARCHITECT_REPLY: &str = r#"{
    "steelman_conventional": "Delegation is how companies scale beyond one brain.",
    "steelman_contrarian": "Founder taste is the product; delegating it too early dilutes it.",
    "real_disagreement": "Whether the founder's attention is the bottleneck or the moat.",
    "when_conventional_applies": ["Operations dominate the roadmap"],
    "when_contrarian_applies": ["Design quality is the differentiator"],
    "meta_lesson": "Delegate outcomes you can specify, keep judgment you cannot.",
    "questions_to_ask": ["What breaks if you step away for a month?"],
    "warning_signs": ["Product reviews feel like status meetings"],
    "summary": "Delegation timing depends on whether taste or throughput is scarce."
}"#;

fn happy_scripts() -> HashMap<&'static str, Vec<Script>> {
    HashMap::from([
        (SCOUT_MODEL, vec![Script::Reply(SCOUT_REPLY)]),
        (MINER_MODEL, vec![Script::Reply(MINER_REPLY)]),
        (ARCHITECT_MODEL, vec![Script::Reply(ARCHITECT_REPLY)]),
    ])
}

#[tokio::test]
async fn full_run_produces_grounded_synthesis_and_ordered_events() {
    let chat = Arc::new(MockChat::new(happy_scripts()));
    let pipeline = pipeline(Arc::clone(&chat));

    let (progress, mut rx) = ProgressChannel::pair();
    let result = pipeline
        .run(Query::new("Founders should delegate early"), progress)
        .await;

    assert!(result.metadata.success);
    assert!(result.metadata.errors.is_empty());
    assert_eq!(result.forethought.len(), 1);
    assert_eq!(result.forethought[0].guest, "Brian Chesky");
    assert_eq!(result.quickaction.len(), 1);
    assert_eq!(result.quickaction[0].sources, vec!["Brian Chesky (12:34)"]);

    let synthesis = result.examiner.expect("architect output present");
    assert!(!synthesis.when_contrarian_applies.is_empty());
    assert!(!synthesis.when_conventional_applies.is_empty());

    assert_eq!(result.metadata.token_usage.total(), 3 * 150);
    assert_eq!(
        chat.calls(),
        vec![SCOUT_MODEL, MINER_MODEL, ARCHITECT_MODEL]
    );

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push((event.stage, event.status));
    }
    assert_eq!(
        events,
        vec![
            (Stage::Retrieval, StageStatus::Started),
            (Stage::Retrieval, StageStatus::Completed),
            (Stage::Scout, StageStatus::Started),
            (Stage::Scout, StageStatus::Completed),
            (Stage::Miner, StageStatus::Started),
            (Stage::Miner, StageStatus::Completed),
            (Stage::Architect, StageStatus::Started),
            (Stage::Architect, StageStatus::Completed),
            (Stage::Workflow, StageStatus::Completed),
        ]
    );
}

#[tokio::test]
async fn scout_transport_failure_stops_the_run() {
    let scripts = HashMap::from([
        (SCOUT_MODEL, vec![Script::TransportError]),
        (MINER_MODEL, vec![Script::Reply(MINER_REPLY)]),
        (ARCHITECT_MODEL, vec![Script::Reply(ARCHITECT_REPLY)]),
    ]);
    let chat = Arc::new(MockChat::new(scripts));
    let pipeline = pipeline(Arc::clone(&chat));

    let (progress, mut rx) = ProgressChannel::pair();
    let result = pipeline.run(Query::new("belief"), progress).await;

    assert!(!result.metadata.success);
    assert_eq!(result.metadata.errors.len(), 1);
    assert!(result.metadata.errors[0].contains("LLM call failed"));
    assert!(result.examiner.is_none());

    // Only the scout was ever called.
    assert_eq!(chat.calls(), vec![SCOUT_MODEL]);

    let mut stages_seen = Vec::new();
    while let Some(event) = rx.recv().await {
        stages_seen.push(event.stage);
    }
    assert!(!stages_seen.contains(&Stage::Miner));
    assert!(!stages_seen.contains(&Stage::Architect));
    assert_eq!(stages_seen.last(), Some(&Stage::Workflow));
}

#[tokio::test]
async fn unparseable_scout_degrades_to_an_ungrounded_run() {
    let scripts = HashMap::from([
        (SCOUT_MODEL, vec![Script::Reply("not json, sorry")]),
        (MINER_MODEL, vec![Script::Reply(MINER_UNGROUNDED_REPLY)]),
        (ARCHITECT_MODEL, vec![Script::Reply(ARCHITECT_REPLY)]),
    ]);
    let chat = Arc::new(MockChat::new(scripts));
    let pipeline = pipeline(Arc::clone(&chat));

    let result = pipeline.submit(Query::new("belief")).await;

    // Parse failure at a non-terminal stage degrades instead of aborting.
    assert!(result.metadata.success);
    assert!(result.forethought.is_empty());
    assert_eq!(result.quickaction.len(), 1);
    assert!(result.quickaction[0].sources.is_empty());
    assert!(result.examiner.is_some());

    assert!(result
        .metadata
        .errors
        .iter()
        .any(|e| e.contains("Could not parse scout output")));
    assert!(result
        .metadata
        .errors
        .iter()
        .any(|e| e.contains("ungrounded")));

    // Scout was re-prompted once before giving up.
    assert_eq!(
        chat.calls(),
        vec![SCOUT_MODEL, SCOUT_MODEL, MINER_MODEL, ARCHITECT_MODEL]
    );
}

#[tokio::test]
async fn architect_failure_is_fatal_even_when_parse_shaped() {
    let scripts = HashMap::from([
        (SCOUT_MODEL, vec![Script::Reply(SCOUT_REPLY)]),
        (MINER_MODEL, vec![Script::Reply(MINER_REPLY)]),
        (ARCHITECT_MODEL, vec![Script::Reply("still not json")]),
    ]);
    let chat = Arc::new(MockChat::new(scripts));
    let pipeline = pipeline(Arc::clone(&chat));

    let result = pipeline.submit(Query::new("belief")).await;

    assert!(!result.metadata.success);
    assert!(result.examiner.is_none());
    // Earlier stage outputs and their cost survive the failure.
    assert_eq!(result.forethought.len(), 1);
    assert_eq!(result.quickaction.len(), 1);
    assert!(result.metadata.token_usage.total() > 0);
    assert!(result
        .metadata
        .errors
        .iter()
        .any(|e| e.contains("Could not parse architect output")));
}

#[tokio::test]
async fn dropped_subscriber_cancels_before_any_model_call() {
    let chat = Arc::new(MockChat::new(happy_scripts()));
    let pipeline = pipeline(Arc::clone(&chat));

    let (progress, rx) = ProgressChannel::pair();
    drop(rx);

    let result = pipeline.run(Query::new("belief"), progress).await;

    assert!(!result.metadata.success);
    assert!(result
        .metadata
        .errors
        .iter()
        .any(|e| e.contains("cancelled")));
    assert!(chat.calls().is_empty());
    assert_eq!(result.metadata.token_usage.total(), 0);
}

#[tokio::test]
async fn subscriber_loss_mid_retrieval_stops_before_scout() {
    let chat = Arc::new(MockChat::new(happy_scripts()));
    let gate = Arc::new(tokio::sync::Notify::new());
    let pipeline = Pipeline::new(
        Arc::new(corpus()),
        Arc::clone(&chat) as Arc<dyn ChatModel>,
        Arc::new(GatedEmbedder {
            gate: Arc::clone(&gate),
        }),
        &test_config(),
    );

    let (progress, mut rx) = ProgressChannel::pair();
    let run = tokio::spawn(async move { pipeline.run(Query::new("belief"), progress).await });

    // Retrieval has started and is now parked inside the embedder.
    let first = rx.recv().await.unwrap();
    assert_eq!((first.stage, first.status), (Stage::Retrieval, StageStatus::Started));

    // Client goes away mid-stage; retrieval is then allowed to finish.
    drop(rx);
    gate.notify_one();

    let result = run.await.unwrap();

    // Retrieval completed, but the closed channel aborts before the scout.
    assert!(!result.metadata.success);
    assert!(result
        .metadata
        .errors
        .iter()
        .any(|e| e.contains("cancelled")));
    assert!(chat.calls().is_empty());
    assert!(result.forethought.is_empty());
    assert!(result.examiner.is_none());
    assert_eq!(result.metadata.token_usage.total(), 0);
}

#[tokio::test]
async fn repeated_runs_are_identical_modulo_timing() {
    let chat = Arc::new(MockChat::new(happy_scripts()));
    let pipeline = pipeline(chat);

    let first = pipeline.submit(Query::new("Founders should delegate early")).await;
    let second = pipeline.submit(Query::new("Founders should delegate early")).await;

    assert_eq!(first.forethought, second.forethought);
    assert_eq!(first.quickaction, second.quickaction);
    assert_eq!(first.examiner, second.examiner);
    assert_eq!(first.metadata.success, second.metadata.success);
    assert_eq!(first.metadata.token_usage, second.metadata.token_usage);
}
