//! The pipeline orchestrator: retrieval, then the three model stages in
//! order, with progress reporting and error aggregation.

use std::sync::Arc;
use std::time::Instant;

use counterpoint_common::{
    Config, Metadata, Query, Stage, TokenUsage, WorkflowResult,
};
use serde_json::json;
use tracing::{info, warn};

use crate::agents::{ArchitectAgent, MinerAgent, ScoutAgent, ScoutReport, StageFailure};
use crate::llm::{SharedChatModel, SharedEmbedder};
use crate::progress::ProgressChannel;
use crate::retriever::Retriever;
use crate::store::CorpusStore;

/// Owns the four stages of one deployment. Cheap to share behind an `Arc`;
/// each `run` call is independent.
pub struct Pipeline {
    retriever: Retriever,
    scout: ScoutAgent,
    miner: MinerAgent,
    architect: ArchitectAgent,
}

impl Pipeline {
    pub fn new(
        store: Arc<CorpusStore>,
        chat: SharedChatModel,
        embedder: SharedEmbedder,
        config: &Config,
    ) -> Self {
        Self {
            retriever: Retriever::new(store, embedder, config.max_per_guest),
            scout: ScoutAgent::new(Arc::clone(&chat), &config.scout_model),
            miner: MinerAgent::new(Arc::clone(&chat), &config.miner_model),
            architect: ArchitectAgent::new(chat, &config.architect_model),
        }
    }

    /// Run to completion with nobody subscribed to progress.
    pub async fn submit(&self, query: Query) -> WorkflowResult {
        self.run(query, ProgressChannel::detached()).await
    }

    /// Run the staged pipeline. Always returns a result; failures are
    /// recorded in `metadata.errors` with `success` false, and the spend up
    /// to the failure point is still reported.
    pub async fn run(&self, query: Query, progress: ProgressChannel) -> WorkflowResult {
        let started_at = Instant::now();
        let mut run = RunState::new(query);

        // --- Retrieval ---
        if progress.is_closed() {
            return run.cancelled(started_at);
        }
        progress.started(Stage::Retrieval, "Searching the transcript corpus");
        let candidates = match self.retriever.retrieve(&run.query).await {
            Ok(candidates) => candidates,
            Err(error) => {
                run.errors.push(error.to_string());
                progress.error(Stage::Retrieval, error.to_string(), None);
                return run.finish_failed(started_at, &progress);
            }
        };
        progress.completed(
            Stage::Retrieval,
            format!("Retrieved {} candidate passages", candidates.len()),
            Some(json!({ "candidates": candidates.len() })),
        );

        // --- Scout ---
        if progress.is_closed() {
            return run.cancelled(started_at);
        }
        progress.started(Stage::Scout, "Scouting for contrarian perspectives");
        let scout_report = match self.scout.run(&run.query, &candidates).await {
            Ok(report) => {
                progress.completed(
                    Stage::Scout,
                    format!("Found {} contrarian perspective(s)", report.findings.len()),
                    Some(json!({ "findings": report.findings.len() })),
                );
                run.usage += report.usage;
                report
            }
            Err(failure) => {
                run.usage += failure.usage;
                run.errors.push(failure.error.to_string());
                progress.error(Stage::Scout, failure.error.to_string(), None);
                if !failure.is_parse() {
                    return run.finish_failed(started_at, &progress);
                }
                // Unparseable output after the re-prompt: continue with an
                // empty report rather than losing the whole run.
                warn!("scout output unusable, continuing without findings");
                ScoutReport::default()
            }
        };
        run.forethought = scout_report.findings;

        // --- Miner ---
        if progress.is_closed() {
            return run.cancelled(started_at);
        }
        progress.started(Stage::Miner, "Structuring arguments");
        let miner_report = match self
            .miner
            .run(&run.query, &run.forethought, scout_report.steelman.as_deref())
            .await
        {
            Ok(report) => {
                progress.completed(
                    Stage::Miner,
                    format!("Structured {} argument(s)", report.arguments.len()),
                    Some(json!({
                        "arguments": report.arguments.len(),
                        "ungrounded": report.ungrounded,
                    })),
                );
                run.usage += report.usage;
                if report.ungrounded {
                    run.errors.push(
                        "quickaction: arguments are ungrounded (no findings survived)".to_string(),
                    );
                }
                report
            }
            Err(failure) => {
                run.usage += failure.usage;
                run.errors.push(failure.error.to_string());
                progress.error(Stage::Miner, failure.error.to_string(), None);
                if !failure.is_parse() {
                    return run.finish_failed(started_at, &progress);
                }
                warn!("miner output unusable, continuing without arguments");
                Default::default()
            }
        };
        run.quickaction = miner_report.arguments;

        // --- Architect ---
        if progress.is_closed() {
            return run.cancelled(started_at);
        }
        progress.started(Stage::Architect, "Synthesizing the decision framework");
        match self
            .architect
            .run(
                &run.query,
                &run.forethought,
                &run.quickaction,
                &miner_report.common_threads,
            )
            .await
        {
            Ok((synthesis, usage)) => {
                run.usage += usage;
                progress.completed(Stage::Architect, "Synthesis complete", None);
                run.examiner = Some(synthesis);
            }
            // Terminal stage: no degraded path, parse failures included.
            Err(StageFailure { error, usage }) => {
                run.usage += usage;
                run.errors.push(error.to_string());
                progress.error(Stage::Architect, error.to_string(), None);
                return run.finish_failed(started_at, &progress);
            }
        }

        let result = run.finish(started_at, true);
        info!(
            elapsed_ms = result.metadata.elapsed_ms,
            tokens = result.metadata.token_usage.total(),
            errors = result.metadata.errors.len(),
            "workflow complete"
        );
        progress.completed(
            Stage::Workflow,
            "Workflow complete",
            serde_json::to_value(&result).ok(),
        );
        result
    }
}

/// Per-run accumulator, folded into the final `WorkflowResult`.
struct RunState {
    query: Query,
    forethought: Vec<counterpoint_common::ForethoughtFinding>,
    quickaction: Vec<counterpoint_common::StructuredArgument>,
    examiner: Option<counterpoint_common::Synthesis>,
    usage: TokenUsage,
    errors: Vec<String>,
}

impl RunState {
    fn new(query: Query) -> Self {
        Self {
            query,
            forethought: Vec::new(),
            quickaction: Vec::new(),
            examiner: None,
            usage: TokenUsage::default(),
            errors: Vec::new(),
        }
    }

    fn finish(self, started_at: Instant, success: bool) -> WorkflowResult {
        WorkflowResult {
            query: self.query,
            forethought: self.forethought,
            quickaction: self.quickaction,
            examiner: self.examiner,
            metadata: Metadata {
                token_usage: self.usage,
                elapsed_ms: started_at.elapsed().as_millis() as u64,
                errors: self.errors,
                success,
            },
        }
    }

    /// Failed terminus: emit the terminal event carrying the partial result.
    fn finish_failed(self, started_at: Instant, progress: &ProgressChannel) -> WorkflowResult {
        let result = self.finish(started_at, false);
        warn!(errors = ?result.metadata.errors, "workflow failed");
        progress.error(
            Stage::Workflow,
            result.metadata.errors.join("; "),
            serde_json::to_value(&result).ok(),
        );
        result
    }

    fn cancelled(mut self, started_at: Instant) -> WorkflowResult {
        info!("subscriber disconnected, aborting before the next stage");
        self.errors.push("request cancelled by subscriber".to_string());
        self.finish(started_at, false)
    }
}
