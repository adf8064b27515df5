//! Scout stage: find genuine contrarian perspectives among the retrieved
//! candidates. First of the three sequential model stages.

use std::collections::HashSet;
use std::sync::Arc;

use ai_client::util::truncate_to_char_boundary;
use counterpoint_common::{ForethoughtFinding, Query, Stage, TokenUsage};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};

use super::{call_structured, schema_section, StageFailure};
use crate::llm::ChatModel;
use crate::retriever::RankedCandidate;

const MAX_CANDIDATE_TEXT_BYTES: usize = 2000;

const SYSTEM_PROMPT: &str = "You are a research analyst specializing in finding contrarian perspectives.

Given a statement of conventional wisdom and search results from podcast transcripts, your job is to:
1. Identify which search results contain GENUINE contrarian views
2. Extract the core disagreement or nuance each guest offers
3. Note the context and reasoning behind their position
4. Rank by how compelling and distinct each perspective is

GUIDELINES:
- Do not include results that actually AGREE with the conventional wisdom
- Look for nuanced disagreement, not surface-level contradiction
- Prioritize guests who explain WHY they disagree, with evidence
- One perspective per guest (pick their strongest contrarian point)
- Copy the `citation` field of each result verbatim into your findings";

/// The Scout's output for one run.
#[derive(Debug, Default)]
pub struct ScoutReport {
    pub findings: Vec<ForethoughtFinding>,
    /// The model's strongest case FOR the conventional wisdom, carried into
    /// the Miner prompt.
    pub steelman: Option<String>,
    pub usage: TokenUsage,
}

// --- Wire types (lenient at the ingestion boundary, canonical after) ---

/// `contrarian_findings` is the canonical field name;
/// `contrarian_perspectives` is a deprecated alias still accepted on read.
#[derive(Debug, Deserialize, JsonSchema)]
struct ScoutEnvelope {
    #[serde(default)]
    conventional_wisdom_steelman: Option<String>,
    #[serde(
        default,
        alias = "contrarian_perspectives",
        alias = "findings"
    )]
    contrarian_findings: Vec<RawFinding>,
}

/// Some models answer with a bare findings array instead of the envelope.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(untagged)]
enum ScoutWire {
    Envelope(ScoutEnvelope),
    Bare(Vec<RawFinding>),
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RawFinding {
    #[serde(default)]
    guest: String,
    #[serde(default)]
    citation: String,
    #[serde(default, alias = "core_disagreement", alias = "disagreement", alias = "position")]
    contrarian_position: String,
    #[serde(default, alias = "strongest_quote", alias = "quote_highlight")]
    quote: String,
    #[serde(default, alias = "context_and_reasoning", alias = "reasoning")]
    reasoning_hint: Option<String>,
    #[serde(default, alias = "relevance_to_conventional_wisdom")]
    relevance_score: Option<f32>,
}

impl ScoutWire {
    fn into_envelope(self) -> ScoutEnvelope {
        match self {
            ScoutWire::Envelope(envelope) => envelope,
            ScoutWire::Bare(findings) => ScoutEnvelope {
                conventional_wisdom_steelman: None,
                contrarian_findings: findings,
            },
        }
    }
}

pub struct ScoutAgent {
    chat: Arc<dyn ChatModel>,
    model: String,
}

impl ScoutAgent {
    pub fn new(chat: Arc<dyn ChatModel>, model: impl Into<String>) -> Self {
        Self {
            chat,
            model: model.into(),
        }
    }

    /// Run the Scout over the retrieved candidates. With no candidates there
    /// is nothing to cite, so no call is made and the report is empty.
    pub async fn run(
        &self,
        query: &Query,
        candidates: &[RankedCandidate],
    ) -> Result<ScoutReport, StageFailure> {
        if candidates.is_empty() {
            return Ok(ScoutReport::default());
        }

        let user_prompt = build_user_prompt(query, candidates);

        let (wire, usage) = call_structured::<ScoutWire>(
            self.chat.as_ref(),
            &self.model,
            Stage::Scout,
            SYSTEM_PROMPT,
            &user_prompt,
        )
        .await?;

        let envelope = wire.into_envelope();
        let findings = validate_findings(envelope.contrarian_findings, candidates);

        info!(findings = findings.len(), "scout complete");

        Ok(ScoutReport {
            findings,
            steelman: envelope.conventional_wisdom_steelman,
            usage,
        })
    }
}

fn build_user_prompt(query: &Query, candidates: &[RankedCandidate]) -> String {
    let mut prompt = format!(
        "CONVENTIONAL WISDOM TO CHALLENGE:\n\"{}\"\n\nSEARCH RESULTS FROM PODCAST TRANSCRIPTS:\n",
        query.belief
    );

    for (i, candidate) in candidates.iter().enumerate() {
        let chunk = &candidate.chunk;
        let signals = if chunk.contrarian_signals.is_empty() {
            "none detected".to_string()
        } else {
            chunk.contrarian_signals.join(", ")
        };
        let topics = if chunk.topics.is_empty() {
            "unclassified".to_string()
        } else {
            chunk.topics.join(", ")
        };

        prompt.push_str(&format!(
            "\n--- RESULT {} ---\nGuest: {}\nEpisode: {}\nCitation: {}\nSimilarity: {:.3}\nContrarian signals: {}\nTopics: {}\n\nTEXT:\n{}\n",
            i + 1,
            chunk.guest,
            chunk.episode_id,
            chunk.citation,
            candidate.similarity,
            signals,
            topics,
            truncate_to_char_boundary(&chunk.text, MAX_CANDIDATE_TEXT_BYTES),
        ));
    }

    prompt.push_str(
        "\nAnalyze these results and identify genuine contrarian perspectives. \
         Only include results that actually DISAGREE with or add important nuance to the \
         conventional wisdom. Rate relevance 1-10 by how directly each challenges it. \
         Also provide `conventional_wisdom_steelman`: the strongest argument FOR the belief.\n\n",
    );
    prompt.push_str(&schema_section::<ScoutEnvelope>());
    prompt
}

/// Drop findings citing sources that were not in the candidate set — the
/// no-fabricated-citations invariant, enforced by construction. Offending
/// items are filtered silently (logged, never escalated).
fn validate_findings(
    raw: Vec<RawFinding>,
    candidates: &[RankedCandidate],
) -> Vec<ForethoughtFinding> {
    let known: HashSet<&str> = candidates
        .iter()
        .map(|c| c.chunk.citation.as_str())
        .collect();

    raw.into_iter()
        .filter_map(|finding| {
            let citation = finding.citation.trim();
            if !known.contains(citation) {
                warn!(citation = %finding.citation, "dropping finding with unknown citation");
                return None;
            }
            Some(ForethoughtFinding {
                guest: finding.guest,
                citation: citation.to_string(),
                contrarian_position: finding.contrarian_position,
                quote: finding.quote,
                reasoning_hint: finding.reasoning_hint,
                relevance_score: clamp_relevance(finding.relevance_score),
            })
        })
        .collect()
}

fn clamp_relevance(score: Option<f32>) -> u8 {
    score.map(|s| s.round()).unwrap_or(5.0).clamp(1.0, 10.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use counterpoint_common::Chunk;
    use std::sync::Arc as StdArc;

    fn candidate(guest: &str, citation: &str) -> RankedCandidate {
        RankedCandidate {
            chunk: StdArc::new(Chunk {
                episode_id: "e".into(),
                guest: guest.into(),
                chunk_id: 0,
                t_start: 0,
                t_end: 1,
                citation: citation.into(),
                text: "t".into(),
                contrarian_signals: vec![],
                topics: vec![],
                embedding: vec![],
            }),
            similarity: 0.9,
            contrarian_boost: 0.0,
            final_score: 0.9,
        }
    }

    fn raw(citation: &str) -> RawFinding {
        RawFinding {
            guest: "G".into(),
            citation: citation.into(),
            contrarian_position: "p".into(),
            quote: "q".into(),
            reasoning_hint: None,
            relevance_score: Some(7.0),
        }
    }

    #[test]
    fn unknown_citations_are_dropped() {
        let candidates = vec![candidate("A", "A (1:00)")];
        let findings = validate_findings(
            vec![raw("A (1:00)"), raw("Fabricated (9:99)")],
            &candidates,
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].citation, "A (1:00)");
    }

    #[test]
    fn citation_whitespace_is_tolerated() {
        let candidates = vec![candidate("A", "A (1:00)")];
        let findings = validate_findings(vec![raw(" A (1:00) ")], &candidates);
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn relevance_is_clamped_into_range() {
        assert_eq!(clamp_relevance(None), 5);
        assert_eq!(clamp_relevance(Some(0.0)), 1);
        assert_eq!(clamp_relevance(Some(42.0)), 10);
        assert_eq!(clamp_relevance(Some(7.4)), 7);
    }

    #[test]
    fn deprecated_alias_is_accepted() {
        let json = r#"{"contrarian_perspectives": [{"guest": "G", "citation": "G (1:00)",
            "contrarian_position": "p", "quote": "q", "relevance_score": 8}]}"#;
        let wire: ScoutWire = serde_json::from_str(json).unwrap();
        let envelope = wire.into_envelope();
        assert_eq!(envelope.contrarian_findings.len(), 1);
    }

    #[test]
    fn bare_list_is_accepted() {
        let json = r#"[{"guest": "G", "citation": "G (1:00)", "contrarian_position": "p",
            "quote": "q"}]"#;
        let wire: ScoutWire = serde_json::from_str(json).unwrap();
        assert_eq!(wire.into_envelope().contrarian_findings.len(), 1);
    }

    #[test]
    fn alternate_finding_keys_are_normalized() {
        let json = r#"{"contrarian_findings": [{"guest": "G", "citation": "G (1:00)",
            "core_disagreement": "p", "strongest_quote": "q",
            "context_and_reasoning": "because"}]}"#;
        let wire: ScoutWire = serde_json::from_str(json).unwrap();
        let envelope = wire.into_envelope();
        assert_eq!(envelope.contrarian_findings[0].contrarian_position, "p");
        assert_eq!(envelope.contrarian_findings[0].quote, "q");
        assert_eq!(
            envelope.contrarian_findings[0].reasoning_hint.as_deref(),
            Some("because")
        );
    }
}
