//! Contrarian-aware vector retrieval over the corpus store.

use std::collections::HashMap;
use std::sync::Arc;

use counterpoint_common::{Chunk, CounterpointError, Query};
use tracing::debug;

use crate::llm::TextEmbedder;
use crate::store::CorpusStore;

/// Weight of the contrarian boost relative to cosine similarity.
/// Fixed constant, not learned.
pub const BOOST_WEIGHT: f32 = 0.15;

/// How far past `n_results` the scored pool extends before guest
/// deduplication, so diversity filtering does not starve the result set.
const OVERSAMPLE_FACTOR: usize = 10;

/// A scored retrieval candidate. Derived per request, discarded after the
/// Scout consumes it.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub chunk: Arc<Chunk>,
    pub similarity: f32,
    pub contrarian_boost: f32,
    pub final_score: f32,
}

pub struct Retriever {
    store: Arc<CorpusStore>,
    embedder: Arc<dyn TextEmbedder>,
    max_per_guest: usize,
}

impl Retriever {
    pub fn new(store: Arc<CorpusStore>, embedder: Arc<dyn TextEmbedder>, max_per_guest: usize) -> Self {
        Self {
            store,
            embedder,
            max_per_guest: max_per_guest.max(1),
        }
    }

    /// Retrieve up to `query.n_results` candidates, ranked by boosted
    /// similarity, at most `max_per_guest` per guest.
    pub async fn retrieve(&self, query: &Query) -> Result<Vec<RankedCandidate>, CounterpointError> {
        if self.store.is_empty() {
            return Err(CounterpointError::Retrieval(
                "corpus store is empty or not loaded".to_string(),
            ));
        }

        let search_text = contrarian_query_text(query);
        let query_embedding = self.embedder.embed(&search_text).await?;

        let n_results = query.clamped_n_results();

        // Topic filter applies before similarity scoring, never after, so
        // filtering cannot truncate relevant results out of the pool.
        let mut candidates: Vec<RankedCandidate> = self
            .store
            .chunks()
            .iter()
            .filter(|chunk| matches_topics(chunk, query.topic_filter.as_deref()))
            .map(|chunk| {
                let similarity = cosine_similarity(&query_embedding, &chunk.embedding);
                let boost = contrarian_boost(chunk.contrarian_signals.len());
                RankedCandidate {
                    chunk: Arc::clone(chunk),
                    similarity,
                    contrarian_boost: boost,
                    final_score: similarity + BOOST_WEIGHT * boost,
                }
            })
            .collect();

        // Descending score; ties broken by earlier timestamp for
        // reproducibility.
        candidates.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.t_start.cmp(&b.chunk.t_start))
        });
        candidates.truncate(n_results * OVERSAMPLE_FACTOR);

        let results = dedupe_by_guest(candidates, self.max_per_guest, n_results);

        debug!(
            results = results.len(),
            requested = n_results,
            "retrieval complete"
        );

        Ok(results)
    }
}

/// Frame the search text to emphasize disagreement with the belief.
fn contrarian_query_text(query: &Query) -> String {
    let mut text = format!(
        "Perspectives that disagree with, challenge, or provide nuance to the idea that: \
         {}\n\nArguments against this view. Counterpoints. Alternative perspectives. \
         People who say this is wrong, overrated, or missing something important.",
        query.belief
    );
    if let Some(context) = &query.user_context {
        text.push_str("\n\nAsker's situation: ");
        text.push_str(context);
    }
    text
}

fn matches_topics(chunk: &Chunk, filter: Option<&[String]>) -> bool {
    match filter {
        None => true,
        Some([]) => true,
        Some(topics) => chunk.topics.iter().any(|t| topics.contains(t)),
    }
}

/// Cosine similarity; 0.0 for mismatched or zero-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Monotonic saturating function of disagreement-marker count.
/// Zero markers ⇒ 0.0; each additional marker adds less.
pub fn contrarian_boost(signal_count: usize) -> f32 {
    let n = signal_count as f32;
    n / (n + 2.0)
}

fn dedupe_by_guest(
    candidates: Vec<RankedCandidate>,
    max_per_guest: usize,
    n_results: usize,
) -> Vec<RankedCandidate> {
    let mut per_guest: HashMap<String, usize> = HashMap::new();
    let mut results = Vec::with_capacity(n_results);

    for candidate in candidates {
        let seen = per_guest.entry(candidate.chunk.guest.clone()).or_default();
        if *seen >= max_per_guest {
            continue;
        }
        *seen += 1;
        results.push(candidate);
        if results.len() >= n_results {
            break;
        }
    }

    results
}
