use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// --- Corpus types ---

/// One retrievable unit of transcript text with metadata and an embedding.
///
/// Produced by the offline ingestion step; immutable once loaded. The serde
/// aliases match the ingest file's field names (`title` carries the guest,
/// signal detection writes `contrarian_signals_found`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub episode_id: String,
    #[serde(alias = "title")]
    pub guest: String,
    #[serde(default)]
    pub chunk_id: u32,
    pub t_start: u32,
    pub t_end: u32,
    /// Human-readable source reference, e.g. `"Brian Chesky (12:34)"`.
    pub citation: String,
    pub text: String,
    #[serde(default, alias = "contrarian_signals_found")]
    pub contrarian_signals: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub embedding: Vec<f32>,
}

/// Convert seconds to the `M:SS` form used in citations.
pub fn format_timestamp(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

// --- Request types ---

pub const MIN_RESULTS: usize = 1;
pub const MAX_RESULTS: usize = 10;
pub const DEFAULT_RESULTS: usize = 5;

/// One pipeline request. Read-only through all stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// The conventional wisdom to find contrarian views on.
    pub belief: String,
    #[serde(default, alias = "topics", skip_serializing_if = "Option::is_none")]
    pub topic_filter: Option<Vec<String>>,
    #[serde(default = "default_n_results")]
    pub n_results: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_context: Option<String>,
}

fn default_n_results() -> usize {
    DEFAULT_RESULTS
}

impl Query {
    pub fn new(belief: impl Into<String>) -> Self {
        Self {
            belief: belief.into(),
            topic_filter: None,
            n_results: DEFAULT_RESULTS,
            user_context: None,
        }
    }

    /// Requested result count clamped into the supported range.
    /// Out-of-range values are clamped, not rejected.
    pub fn clamped_n_results(&self) -> usize {
        self.n_results.clamp(MIN_RESULTS, MAX_RESULTS)
    }
}

// --- Stage output types ---

/// The Scout's structured output: one contrarian perspective, grounded in a
/// chunk that was actually retrieved for this query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ForethoughtFinding {
    pub guest: String,
    pub citation: String,
    /// Their main disagreement with the stated belief.
    pub contrarian_position: String,
    /// Key quote from the transcript, verbatim.
    pub quote: String,
    /// Why they hold this view, when the transcript says.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_hint: Option<String>,
    /// 1..=10, clamped at the parse boundary.
    pub relevance_score: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Example,
    Data,
    Story,
    Observation,
    Research,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Evidence {
    #[serde(alias = "type")]
    pub kind: EvidenceKind,
    pub description: String,
}

/// Contexts that make an argument apply or not apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Conditions {
    #[serde(default)]
    pub applies_when: Vec<String>,
    #[serde(default)]
    pub does_not_apply_when: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// The Miner's structured output: one debate-ready argument bundle per theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StructuredArgument {
    /// One sentence capturing the contrarian thesis.
    pub core_argument: String,
    /// Ordered reasoning steps behind the thesis.
    #[serde(default)]
    pub reasoning: Vec<String>,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    /// The single most compelling direct quote.
    pub best_quote: String,
    #[serde(default)]
    pub conditions: Conditions,
    pub confidence: Confidence,
    /// Citations of the findings this argument was derived from.
    /// Empty only on the ungrounded fallback path.
    #[serde(default)]
    pub sources: Vec<String>,
}

/// The Architect's terminal output: a decision framework, not a verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Synthesis {
    /// Strongest good-faith case for the conventional wisdom (model-generated).
    pub steelman_conventional: String,
    /// Strongest good-faith case for the contrarian side (grounded in arguments).
    pub steelman_contrarian: String,
    /// The axis of real disagreement, one sentence.
    pub real_disagreement: String,
    #[serde(default)]
    pub when_conventional_applies: Vec<String>,
    #[serde(default)]
    pub when_contrarian_applies: Vec<String>,
    /// The insight that transcends the debate.
    pub meta_lesson: String,
    #[serde(default)]
    pub questions_to_ask: Vec<String>,
    #[serde(default)]
    pub warning_signs: Vec<String>,
    /// 2-3 sentence takeaway.
    #[serde(default)]
    pub summary: String,
}

// --- Metrics ---

/// Token accounting accumulated across all stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt: u32,
    pub completion: u32,
}

impl TokenUsage {
    pub fn new(prompt: u32, completion: u32) -> Self {
        Self { prompt, completion }
    }

    pub fn total(&self) -> u32 {
        self.prompt + self.completion
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.prompt += other.prompt;
        self.completion += other.completion;
    }
}

/// Execution metadata, populated for successful and failed runs alike so
/// partial runs still report accurate cost.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    pub token_usage: TokenUsage,
    pub elapsed_ms: u64,
    pub errors: Vec<String>,
    pub success: bool,
}

// --- Workflow result ---

/// Aggregate of every stage's output for one request. Created once per
/// request, immutable after the pipeline completes, owned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub query: Query,
    pub forethought: Vec<ForethoughtFinding>,
    pub quickaction: Vec<StructuredArgument>,
    /// Absent whenever the Architect did not complete; never half-populated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examiner: Option<Synthesis>,
    pub metadata: Metadata,
}

// --- Progress events ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Retrieval,
    Scout,
    Miner,
    Architect,
    /// Reserved for the terminal event covering the whole run.
    Workflow,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Retrieval => "retrieval",
            Stage::Scout => "scout",
            Stage::Miner => "miner",
            Stage::Architect => "architect",
            Stage::Workflow => "workflow",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Started,
    Completed,
    Error,
}

/// One status update on the progress channel. Ephemeral; consumed in
/// arrival order by the channel's subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn started(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            status: StageStatus::Started,
            message: Some(message.into()),
            payload: None,
            timestamp: Utc::now(),
        }
    }

    pub fn completed(
        stage: Stage,
        message: impl Into<String>,
        payload: Option<serde_json::Value>,
    ) -> Self {
        Self {
            stage,
            status: StageStatus::Completed,
            message: Some(message.into()),
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn error(stage: Stage, message: impl Into<String>, payload: Option<serde_json::Value>) -> Self {
        Self {
            stage,
            status: StageStatus::Error,
            message: Some(message.into()),
            payload,
            timestamp: Utc::now(),
        }
    }
}
