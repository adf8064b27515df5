//! Architect stage: weigh both sides and produce the decision framework.
//! Terminal stage — any failure here fails the run.

use std::sync::Arc;

use counterpoint_common::{ForethoughtFinding, Query, Stage, StructuredArgument, Synthesis, TokenUsage};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::info;

use super::{call_structured, schema_section, StageFailure};
use crate::llm::ChatModel;

const SYSTEM_PROMPT: &str = "You are a master synthesizer of competing viewpoints, in the style of a great intellectual moderator.

Given a piece of conventional wisdom and structured contrarian arguments against it, your job is to:

1. STEELMAN BOTH SIDES: present the strongest version of the conventional wisdom AND the strongest contrarian case
2. FIND THE CRUX: identify the single axis the two sides actually disagree on
3. CONTEXTUALIZE: specify the conditions under which each side tends to be right
4. EXTRACT THE META-LESSON: the insight that transcends the debate
5. EQUIP THE ASKER: questions to ask themselves and warning signs to watch for

GUIDELINES:
- Do NOT declare a winner; your output is a decision framework, not a verdict
- Be concrete: conditions should be situations a reader can recognize themselves in
- `when_conventional_applies` and `when_contrarian_applies` must not repeat each other
- Ground the contrarian steelman in the supplied arguments; do not invent new claims";

pub struct ArchitectAgent {
    chat: Arc<dyn ChatModel>,
    model: String,
}

// The wire aliases cover the longer key names earlier prompt revisions used.
#[derive(Debug, Deserialize, JsonSchema)]
struct RawSynthesis {
    #[serde(default, alias = "conventional_wisdom_steelman")]
    steelman_conventional: String,
    #[serde(default, alias = "contrarian_steelman")]
    steelman_contrarian: String,
    #[serde(default, alias = "crux", alias = "core_disagreement")]
    real_disagreement: String,
    #[serde(default, alias = "conventional_wisdom_applies_when")]
    when_conventional_applies: Vec<String>,
    #[serde(default, alias = "contrarian_view_applies_when")]
    when_contrarian_applies: Vec<String>,
    #[serde(default)]
    meta_lesson: String,
    #[serde(default, alias = "questions_to_ask_yourself")]
    questions_to_ask: Vec<String>,
    #[serde(default)]
    warning_signs: Vec<String>,
    #[serde(default)]
    summary: String,
}

impl ArchitectAgent {
    pub fn new(chat: Arc<dyn ChatModel>, model: impl Into<String>) -> Self {
        Self {
            chat,
            model: model.into(),
        }
    }

    pub async fn run(
        &self,
        query: &Query,
        findings: &[ForethoughtFinding],
        arguments: &[StructuredArgument],
        common_threads: &[String],
    ) -> Result<(Synthesis, TokenUsage), StageFailure> {
        let user_prompt = build_user_prompt(query, findings, arguments, common_threads);

        let (raw, usage) = call_structured::<RawSynthesis>(
            self.chat.as_ref(),
            &self.model,
            Stage::Architect,
            SYSTEM_PROMPT,
            &user_prompt,
        )
        .await?;

        let synthesis = normalize(raw);
        info!(
            conventional_conditions = synthesis.when_conventional_applies.len(),
            contrarian_conditions = synthesis.when_contrarian_applies.len(),
            "architect complete"
        );

        Ok((synthesis, usage))
    }
}

fn build_user_prompt(
    query: &Query,
    findings: &[ForethoughtFinding],
    arguments: &[StructuredArgument],
    common_threads: &[String],
) -> String {
    let mut prompt = format!(
        "CONVENTIONAL WISDOM:\n\"{}\"\n\nCONTRARIAN ARGUMENTS AGAINST IT:\n",
        query.belief
    );

    for (i, argument) in arguments.iter().enumerate() {
        prompt.push_str(&format!(
            "\n--- ARGUMENT {} ({:?} confidence) ---\nCore: {}\n",
            i + 1,
            argument.confidence,
            argument.core_argument,
        ));
        if !argument.reasoning.is_empty() {
            prompt.push_str(&format!("Reasoning: {}\n", argument.reasoning.join(" -> ")));
        }
        if !argument.best_quote.is_empty() {
            prompt.push_str(&format!("Best quote: \"{}\"\n", argument.best_quote));
        }
        if !argument.sources.is_empty() {
            prompt.push_str(&format!("Sources: {}\n", argument.sources.join("; ")));
        }
    }

    if !common_threads.is_empty() {
        prompt.push_str(&format!(
            "\nCOMMON THREADS ACROSS THE CONTRARIAN VIEWS:\n- {}\n",
            common_threads.join("\n- ")
        ));
    }

    if !findings.is_empty() {
        let voices: Vec<String> = findings
            .iter()
            .map(|f| format!("{}: {}", f.citation, f.contrarian_position))
            .collect();
        prompt.push_str(&format!("\nUNDERLYING VOICES:\n- {}\n", voices.join("\n- ")));
    }

    if let Some(context) = &query.user_context {
        prompt.push_str(&format!(
            "\nASKER'S SITUATION (tailor the conditions and questions to this):\n{context}\n"
        ));
    }

    prompt.push('\n');
    prompt.push_str(&schema_section::<RawSynthesis>());
    prompt
}

/// Trim whitespace and enforce disjointness of the two condition lists:
/// a condition listed for the conventional side is removed from the
/// contrarian side rather than repeated.
fn normalize(raw: RawSynthesis) -> Synthesis {
    let when_conventional_applies = clean_list(raw.when_conventional_applies);
    let when_contrarian_applies: Vec<String> = clean_list(raw.when_contrarian_applies)
        .into_iter()
        .filter(|c| {
            !when_conventional_applies
                .iter()
                .any(|other| other.eq_ignore_ascii_case(c))
        })
        .collect();

    Synthesis {
        steelman_conventional: raw.steelman_conventional.trim().to_string(),
        steelman_contrarian: raw.steelman_contrarian.trim().to_string(),
        real_disagreement: raw.real_disagreement.trim().to_string(),
        when_conventional_applies,
        when_contrarian_applies,
        meta_lesson: raw.meta_lesson.trim().to_string(),
        questions_to_ask: clean_list(raw.questions_to_ask),
        warning_signs: clean_list(raw.warning_signs),
        summary: raw.summary.trim().to_string(),
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
