use thiserror::Error;

/// Error taxonomy for the retrieval-and-synthesis pipeline.
///
/// Fatality is decided by the orchestrator, not here: `LlmCall` is fatal for
/// the stage that raised it, `Parse` degrades to an empty stage result except
/// at the terminal Architect stage, `Validation` is filtered in place and
/// never escalated.
#[derive(Error, Debug)]
pub enum CounterpointError {
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("LLM call failed: {0}")]
    LlmCall(String),

    #[error("Could not parse {stage} output: {detail}")]
    Parse { stage: String, detail: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl CounterpointError {
    pub fn parse(stage: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Parse {
            stage: stage.into(),
            detail: detail.into(),
        }
    }
}
