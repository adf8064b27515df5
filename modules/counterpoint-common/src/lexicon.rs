//! Linguistic markers and the topic taxonomy used at ingest and retrieval.
//!
//! Signal detection is plain lowercase substring matching — the corpus is
//! conversational transcript text, not adversarial input.

/// Phrases indicating a contrarian/disagreement stance.
pub const CONTRARIAN_SIGNALS: &[&str] = &[
    "i disagree",
    "but actually",
    "the opposite is true",
    "that's a misconception",
    "people get this wrong",
    "contrary to popular belief",
    "i'd push back on",
    "the problem with that is",
    "that's not quite right",
    "i think people overestimate",
    "i think people underestimate",
    "the counterintuitive thing",
    "what most people miss",
    "the uncomfortable truth",
    "here's where i differ",
    "i would challenge",
    "the conventional wisdom is wrong",
    "most advice says",
    "everyone tells you to",
    "the standard approach",
    "i've seen the opposite",
    "in my experience, the reverse",
];

/// Topic taxonomy: topic slug → keyword list.
pub const TOPIC_TAXONOMY: &[(&str, &[&str])] = &[
    (
        "product-market-fit",
        &[
            "product market fit",
            "pmf",
            "finding fit",
            "market validation",
            "product-market fit",
            "fit with the market",
        ],
    ),
    (
        "growth-strategy",
        &[
            "growth",
            "scaling",
            "acquisition",
            "retention",
            "viral",
            "growth loops",
            "flywheel",
            "network effects",
        ],
    ),
    (
        "pricing",
        &[
            "pricing",
            "monetization",
            "willingness to pay",
            "freemium",
            "subscription",
            "revenue model",
            "pricing strategy",
        ],
    ),
    (
        "hiring",
        &[
            "hiring",
            "recruiting",
            "team building",
            "culture fit",
            "interviewing",
            "talent",
            "onboarding",
        ],
    ),
    (
        "fundraising",
        &[
            "fundraising",
            "investors",
            "series a",
            "venture capital",
            "vc",
            "raising money",
            "pitch deck",
            "valuation",
        ],
    ),
    (
        "leadership",
        &[
            "leadership",
            "management",
            "ceo",
            "founder",
            "delegation",
            "executive",
            "decision making",
            "vision",
        ],
    ),
    (
        "user-research",
        &[
            "user research",
            "customer interviews",
            "jobs to be done",
            "jtbd",
            "customer discovery",
            "user feedback",
            "qualitative",
        ],
    ),
    (
        "experimentation",
        &[
            "a/b test",
            "experiment",
            "hypothesis",
            "data-driven",
            "metrics",
            "analytics",
            "measurement",
        ],
    ),
    (
        "positioning",
        &[
            "positioning",
            "differentiation",
            "category",
            "messaging",
            "brand",
            "narrative",
            "storytelling",
        ],
    ),
    (
        "roadmap",
        &[
            "roadmap",
            "prioritization",
            "backlog",
            "planning",
            "strategy",
            "okrs",
            "goals",
        ],
    ),
    (
        "culture",
        &[
            "culture",
            "values",
            "mission",
            "team dynamics",
            "remote work",
            "collaboration",
        ],
    ),
    (
        "product-development",
        &[
            "product development",
            "engineering",
            "technical debt",
            "shipping",
            "mvp",
            "iteration",
            "agile",
        ],
    ),
];

/// Detect disagreement markers present in a passage.
pub fn detect_contrarian_signals(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    CONTRARIAN_SIGNALS
        .iter()
        .filter(|signal| lower.contains(*signal))
        .map(|signal| signal.to_string())
        .collect()
}

/// Classify a passage into taxonomy topics by keyword presence.
pub fn classify_topics(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOPIC_TAXONOMY
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(topic, _)| topic.to_string())
        .collect()
}

/// All topic slugs, in taxonomy order.
pub fn topic_names() -> Vec<&'static str> {
    TOPIC_TAXONOMY.iter().map(|(topic, _)| *topic).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_markers_case_insensitively() {
        let signals =
            detect_contrarian_signals("Honestly, I DISAGREE. Contrary to popular belief, no.");
        assert_eq!(signals, vec!["i disagree", "contrary to popular belief"]);
    }

    #[test]
    fn clean_text_has_no_signals() {
        assert!(detect_contrarian_signals("We launched on a Tuesday.").is_empty());
    }

    #[test]
    fn classifies_multiple_topics() {
        let topics = classify_topics("Our pricing strategy changed once growth stalled.");
        assert!(topics.contains(&"pricing".to_string()));
        assert!(topics.contains(&"growth-strategy".to_string()));
    }

    #[test]
    fn taxonomy_slugs_are_unique() {
        let names = topic_names();
        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());
    }
}
