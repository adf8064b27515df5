//! The three stage agents. Each wraps one remote call per attempt and owns
//! parsing/validation of its structured output.

pub mod architect;
pub mod miner;
pub mod scout;

pub use architect::ArchitectAgent;
pub use miner::{MinerAgent, MinerReport};
pub use scout::{ScoutAgent, ScoutReport};

use ai_client::util::{extract_json_object, strip_code_blocks};
use ai_client::StructuredOutput;
use counterpoint_common::{CounterpointError, Stage, TokenUsage};
use tracing::warn;

use crate::llm::ChatModel;

/// A stage-level failure carrying the tokens already spent, so partial runs
/// still report accurate cost.
#[derive(Debug)]
pub struct StageFailure {
    pub error: CounterpointError,
    pub usage: TokenUsage,
}

impl StageFailure {
    pub fn is_parse(&self) -> bool {
        matches!(self.error, CounterpointError::Parse { .. })
    }
}

const FORMAT_REMINDER: &str = "\n\nREMINDER: your previous answer was not valid. \
    Respond with exactly one JSON object matching the schema above. \
    No markdown fences, no commentary, no surrounding text.";

/// One structured call with bounded parse-retry: attempt, then one re-prompt
/// with a stricter format reminder, then `Parse`. Explicit retry counter, not
/// recursion. Transport failures surface as `LlmCall` (the transport layer
/// has already retried once by then).
pub(crate) async fn call_structured<T: StructuredOutput>(
    chat: &dyn ChatModel,
    model: &str,
    stage: Stage,
    system: &str,
    user: &str,
) -> Result<(T, TokenUsage), StageFailure> {
    let mut usage = TokenUsage::default();
    let mut attempts = 0u8;
    let mut last_detail = String::new();

    while attempts < 2 {
        attempts += 1;
        let prompt = if attempts == 1 {
            user.to_string()
        } else {
            format!("{user}{FORMAT_REMINDER}")
        };

        let outcome = match chat.complete_json(model, system, &prompt).await {
            Ok(outcome) => outcome,
            Err(error) => return Err(StageFailure { error, usage }),
        };
        usage += outcome.usage;

        match parse_structured::<T>(&outcome.content) {
            Ok(parsed) => return Ok((parsed, usage)),
            Err(detail) => {
                warn!(stage = stage.as_str(), attempt = attempts, %detail, "unparseable model output");
                last_detail = detail;
            }
        }
    }

    Err(StageFailure {
        error: CounterpointError::parse(stage.as_str(), last_detail),
        usage,
    })
}

/// Parse model output into `T`: strip code fences, then fall back to the
/// first balanced JSON object when the model wrapped it in prose.
pub(crate) fn parse_structured<T: StructuredOutput>(content: &str) -> Result<T, String> {
    let cleaned = strip_code_blocks(content);

    match serde_json::from_str(cleaned) {
        Ok(parsed) => Ok(parsed),
        Err(first_err) => match extract_json_object(cleaned) {
            Some(object) => serde_json::from_str(object).map_err(|e| e.to_string()),
            None => Err(first_err.to_string()),
        },
    }
}

/// Render a JSON schema section for embedding in a prompt.
pub(crate) fn schema_section<T: StructuredOutput>() -> String {
    format!(
        "Return a single JSON object matching this schema:\n```json\n{}\n```",
        serde_json::to_string_pretty(&T::prompt_schema()).unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Sample {
        name: String,
    }

    #[test]
    fn parses_fenced_output() {
        let parsed: Sample = parse_structured("```json\n{\"name\": \"x\"}\n```").unwrap();
        assert_eq!(parsed.name, "x");
    }

    #[test]
    fn parses_prose_wrapped_output() {
        let parsed: Sample =
            parse_structured("Sure! Here you go: {\"name\": \"x\"} — anything else?").unwrap();
        assert_eq!(parsed.name, "x");
    }

    #[test]
    fn reports_unparseable_output() {
        assert!(parse_structured::<Sample>("no json at all").is_err());
    }
}
