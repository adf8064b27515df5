//! Miner stage: structure the Scout's findings into debate-ready argument
//! bundles, one per theme.

use std::collections::HashSet;
use std::sync::Arc;

use counterpoint_common::{
    Conditions, Confidence, Evidence, EvidenceKind, ForethoughtFinding, Query, Stage, TokenUsage,
};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};

use super::{call_structured, schema_section, StageFailure};
use crate::llm::ChatModel;

const SYSTEM_PROMPT: &str = "You are an argument analyst and structuring expert.

Given contrarian findings from podcast transcripts, grouped by theme, your job is to
produce ONE debate-ready argument bundle per theme:

1. EXTRACT the core argument: one clear sentence capturing the contrarian thesis
2. IDENTIFY the reasoning: 2-4 ordered steps of their logic
3. NOTE the evidence cited: examples, data, stories, observations, research
4. SPECIFY conditions: when the view applies and when it does not
5. GRADE confidence (low/medium/high) by how well-supported the argument is
6. PICK the single most compelling direct quote (verbatim, never paraphrased)

GUIDELINES:
- Be FAITHFUL to what the guests actually said; do not extrapolate
- Copy each supporting finding's citation verbatim into `sources`
- Do NOT invent arguments beyond the findings provided";

const UNGROUNDED_SYSTEM_PROMPT: &str = "You are an argument analyst and structuring expert.

No transcript evidence is available. Construct the best-effort contrarian case against
the stated belief from general reasoning alone: 1-3 argument bundles, each with a core
argument, reasoning steps, applicability conditions, and a confidence grade of low.
Leave `sources` empty and `evidence` empty — there is no grounded material to cite.";

/// Minimum shared significant words for two findings to share a theme.
const MIN_SHARED_WORDS: usize = 2;

const STOPWORDS: &[&str] = &[
    "that", "this", "with", "from", "they", "their", "have", "what", "when", "will",
    "about", "because", "should", "would", "could", "there", "which", "being", "more",
    "than", "them", "then", "your", "really", "people", "thing", "things",
];

/// The Miner's output for one run.
#[derive(Debug, Default)]
pub struct MinerReport {
    pub arguments: Vec<counterpoint_common::StructuredArgument>,
    /// Themes recurring across multiple contrarian views, fed to the Architect.
    pub common_threads: Vec<String>,
    pub usage: TokenUsage,
    /// True when the run had no findings to ground the arguments in.
    pub ungrounded: bool,
}

// --- Wire types ---

#[derive(Debug, Deserialize, JsonSchema)]
struct MinerEnvelope {
    #[serde(default, alias = "arguments")]
    structured_arguments: Vec<RawArgument>,
    #[serde(default)]
    common_threads: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RawArgument {
    #[serde(default, alias = "thesis")]
    core_argument: String,
    #[serde(default)]
    reasoning: Vec<String>,
    #[serde(default)]
    evidence: Vec<RawEvidence>,
    #[serde(default, alias = "quote_highlight", alias = "strongest_quote")]
    best_quote: String,
    #[serde(default)]
    conditions: Conditions,
    #[serde(default)]
    confidence: RawConfidence,
    #[serde(default, alias = "citations", alias = "source_citations")]
    sources: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RawEvidence {
    #[serde(default, alias = "type")]
    kind: Option<EvidenceKind>,
    #[serde(default)]
    description: String,
}

/// Canonical grades are low/medium/high; the strong/moderate/weak vocabulary
/// some models fall back to is accepted as aliases.
#[derive(Debug, Clone, Copy, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
enum RawConfidence {
    #[serde(alias = "weak")]
    Low,
    #[default]
    #[serde(alias = "moderate")]
    Medium,
    #[serde(alias = "strong")]
    High,
}

impl From<RawConfidence> for Confidence {
    fn from(raw: RawConfidence) -> Self {
        match raw {
            RawConfidence::Low => Confidence::Low,
            RawConfidence::Medium => Confidence::Medium,
            RawConfidence::High => Confidence::High,
        }
    }
}

pub struct MinerAgent {
    chat: Arc<dyn ChatModel>,
    model: String,
}

impl MinerAgent {
    pub fn new(chat: Arc<dyn ChatModel>, model: impl Into<String>) -> Self {
        Self {
            chat,
            model: model.into(),
        }
    }

    /// Structure the findings into one argument bundle per theme. With no
    /// findings the stage still runs, over the bare belief, and the report
    /// is marked ungrounded.
    pub async fn run(
        &self,
        query: &Query,
        findings: &[ForethoughtFinding],
        steelman: Option<&str>,
    ) -> Result<MinerReport, StageFailure> {
        let ungrounded = findings.is_empty();
        let (system, user) = if ungrounded {
            (UNGROUNDED_SYSTEM_PROMPT, build_ungrounded_prompt(query))
        } else {
            (SYSTEM_PROMPT, build_grounded_prompt(query, findings, steelman))
        };

        let (envelope, usage) = call_structured::<MinerEnvelope>(
            self.chat.as_ref(),
            &self.model,
            Stage::Miner,
            system,
            &user,
        )
        .await?;

        let known: HashSet<&str> = findings.iter().map(|f| f.citation.as_str()).collect();
        let arguments = validate_arguments(envelope.structured_arguments, &known, ungrounded);

        info!(arguments = arguments.len(), ungrounded, "miner complete");

        Ok(MinerReport {
            arguments,
            common_threads: envelope.common_threads,
            usage,
            ungrounded,
        })
    }
}

fn build_grounded_prompt(
    query: &Query,
    findings: &[ForethoughtFinding],
    steelman: Option<&str>,
) -> String {
    let mut prompt = format!(
        "TASK: Structure the following contrarian findings into debate-ready arguments.\n\n\
         CONVENTIONAL WISDOM BEING CHALLENGED:\n\"{}\"\n",
        query.belief
    );
    if let Some(steelman) = steelman {
        prompt.push_str(&format!("\nSTEELMAN OF THE CONVENTIONAL WISDOM:\n\"{steelman}\"\n"));
    }

    let themes = group_by_theme(findings);
    prompt.push_str(&format!(
        "\nFINDINGS, GROUPED INTO {} THEME(S). Produce exactly one argument bundle per theme:\n",
        themes.len()
    ));

    for (theme_no, members) in themes.iter().enumerate() {
        prompt.push_str(&format!("\n=== THEME {} ===\n", theme_no + 1));
        for &idx in members {
            let finding = &findings[idx];
            prompt.push_str(&format!(
                "\n--- FINDING: {} ---\nCitation: {}\nContrarian position: {}\nQuote: \"{}\"\n",
                finding.guest, finding.citation, finding.contrarian_position, finding.quote,
            ));
            if let Some(hint) = &finding.reasoning_hint {
                prompt.push_str(&format!("Reasoning/context: {hint}\n"));
            }
            prompt.push_str(&format!("Relevance score: {}\n", finding.relevance_score));
        }
    }

    prompt.push_str(
        "\nAlso identify `common_threads`: themes recurring across multiple contrarian views.\n\n",
    );
    prompt.push_str(&schema_section::<MinerEnvelope>());
    prompt
}

fn build_ungrounded_prompt(query: &Query) -> String {
    format!(
        "CONVENTIONAL WISDOM TO ARGUE AGAINST (no transcript evidence available):\n\"{}\"\n\n{}",
        query.belief,
        schema_section::<MinerEnvelope>()
    )
}

/// Group findings by significant-word overlap of their positions and quotes.
/// Deliberately cheap — no extra embedding call for this step.
pub(crate) fn group_by_theme(findings: &[ForethoughtFinding]) -> Vec<Vec<usize>> {
    let token_sets: Vec<HashSet<String>> = findings.iter().map(significant_words).collect();

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut group_tokens: Vec<HashSet<String>> = Vec::new();

    for (idx, tokens) in token_sets.iter().enumerate() {
        let joined = group_tokens.iter().position(|existing| {
            existing.intersection(tokens).count() >= MIN_SHARED_WORDS
        });

        match joined {
            Some(g) => {
                groups[g].push(idx);
                group_tokens[g].extend(tokens.iter().cloned());
            }
            None => {
                groups.push(vec![idx]);
                group_tokens.push(tokens.clone());
            }
        }
    }

    groups
}

fn significant_words(finding: &ForethoughtFinding) -> HashSet<String> {
    let text = format!("{} {}", finding.contrarian_position, finding.quote);
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3 && !STOPWORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}

/// Keep only sources that reference an input finding; drop arguments left
/// with no valid source (unless the whole run is ungrounded). Filtered
/// silently, never escalated.
fn validate_arguments(
    raw: Vec<RawArgument>,
    known_citations: &HashSet<&str>,
    allow_unsourced: bool,
) -> Vec<counterpoint_common::StructuredArgument> {
    raw.into_iter()
        .filter_map(|argument| {
            let mut seen = HashSet::new();
            let sources: Vec<String> = argument
                .sources
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| known_citations.contains(s.as_str()))
                .filter(|s| seen.insert(s.clone()))
                .collect();

            if sources.is_empty() && !allow_unsourced {
                warn!(core_argument = %argument.core_argument, "dropping argument with no valid sources");
                return None;
            }

            Some(counterpoint_common::StructuredArgument {
                core_argument: argument.core_argument,
                reasoning: argument.reasoning,
                evidence: argument
                    .evidence
                    .into_iter()
                    .map(|e| Evidence {
                        kind: e.kind.unwrap_or(EvidenceKind::Observation),
                        description: e.description,
                    })
                    .collect(),
                best_quote: argument.best_quote,
                conditions: argument.conditions,
                confidence: argument.confidence.into(),
                sources,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(citation: &str, position: &str) -> ForethoughtFinding {
        ForethoughtFinding {
            guest: "G".into(),
            citation: citation.into(),
            contrarian_position: position.into(),
            quote: String::new(),
            reasoning_hint: None,
            relevance_score: 5,
        }
    }

    #[test]
    fn overlapping_findings_share_a_theme() {
        let findings = vec![
            finding("A (1:00)", "venture capital funding distorts early pricing decisions"),
            finding("B (2:00)", "early pricing decisions matter more than funding"),
            finding("C (3:00)", "hire slowly even under growth pressure"),
        ];

        let groups = group_by_theme(&findings);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], vec![0, 1]);
        assert_eq!(groups[1], vec![2]);
    }

    #[test]
    fn unrelated_findings_get_their_own_themes() {
        let findings = vec![
            finding("A (1:00)", "distribution beats polish"),
            finding("B (2:00)", "remote teams communicate asynchronously"),
        ];
        assert_eq!(group_by_theme(&findings).len(), 2);
    }

    #[test]
    fn bogus_sources_are_dropped_and_unsourced_arguments_discarded() {
        let known: HashSet<&str> = ["A (1:00)"].into_iter().collect();
        let raw = vec![
            RawArgument {
                core_argument: "good".into(),
                reasoning: vec![],
                evidence: vec![],
                best_quote: "q".into(),
                conditions: Conditions::default(),
                confidence: RawConfidence::High,
                sources: vec!["A (1:00)".into(), "Fabricated (9:99)".into()],
            },
            RawArgument {
                core_argument: "orphan".into(),
                reasoning: vec![],
                evidence: vec![],
                best_quote: "q".into(),
                conditions: Conditions::default(),
                confidence: RawConfidence::Low,
                sources: vec!["Fabricated (9:99)".into()],
            },
        ];

        let arguments = validate_arguments(raw, &known, false);
        assert_eq!(arguments.len(), 1);
        assert_eq!(arguments[0].sources, vec!["A (1:00)"]);
    }

    #[test]
    fn repeated_citations_collapse_to_one() {
        let known: HashSet<&str> = ["A (1:00)", "B (2:00)"].into_iter().collect();
        let raw = vec![RawArgument {
            core_argument: "c".into(),
            reasoning: vec![],
            evidence: vec![],
            best_quote: "q".into(),
            conditions: Conditions::default(),
            confidence: RawConfidence::Medium,
            sources: vec!["A (1:00)".into(), "B (2:00)".into(), "A (1:00)".into()],
        }];

        let arguments = validate_arguments(raw, &known, false);
        assert_eq!(arguments[0].sources, vec!["A (1:00)", "B (2:00)"]);
    }

    #[test]
    fn ungrounded_mode_allows_empty_sources() {
        let known = HashSet::new();
        let raw = vec![RawArgument {
            core_argument: "best effort".into(),
            reasoning: vec![],
            evidence: vec![],
            best_quote: String::new(),
            conditions: Conditions::default(),
            confidence: RawConfidence::Low,
            sources: vec![],
        }];
        assert_eq!(validate_arguments(raw, &known, true).len(), 1);
    }

    #[test]
    fn legacy_confidence_vocabulary_is_accepted() {
        let json = r#"{"structured_arguments": [{"core_argument": "c", "best_quote": "q",
            "confidence": "strong", "sources": []}]}"#;
        let envelope: MinerEnvelope = serde_json::from_str(json).unwrap();
        assert!(matches!(
            envelope.structured_arguments[0].confidence,
            RawConfidence::High
        ));
    }
}
