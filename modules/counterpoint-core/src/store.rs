//! Read-only corpus of pre-chunked transcript passages.
//!
//! Loaded once at process start and shared behind `Arc`; never mutated during
//! request handling, so it is safe for unlimited concurrent readers.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use counterpoint_common::Chunk;
use serde::Serialize;
use tracing::info;

/// Summary statistics for the auxiliary `/api/stats` surface.
#[derive(Debug, Clone, Serialize)]
pub struct CorpusStats {
    pub total_chunks: usize,
    pub contrarian_chunks: usize,
    pub guests: usize,
    pub topic_distribution: BTreeMap<String, usize>,
}

pub struct CorpusStore {
    chunks: Vec<Arc<Chunk>>,
}

impl CorpusStore {
    /// Load enriched chunks from a JSONL file (one chunk per line, embeddings
    /// precomputed by the offline ingestion step).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("could not open corpus file {}", path.display()))?;

        let mut chunks = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let chunk: Chunk = serde_json::from_str(&line)
                .with_context(|| format!("malformed chunk at {}:{}", path.display(), line_no + 1))?;
            chunks.push(Arc::new(chunk));
        }

        info!(chunks = chunks.len(), path = %path.display(), "corpus loaded");

        Ok(Self { chunks })
    }

    /// Build a store from in-memory chunks (fixtures and tests).
    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        Self {
            chunks: chunks.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        !self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Arc<Chunk>] {
        &self.chunks
    }

    pub fn stats(&self) -> CorpusStats {
        let mut topic_distribution: BTreeMap<String, usize> = BTreeMap::new();
        let mut guests: Vec<&str> = Vec::new();
        let mut contrarian_chunks = 0;

        for chunk in &self.chunks {
            if !chunk.contrarian_signals.is_empty() {
                contrarian_chunks += 1;
            }
            for topic in &chunk.topics {
                *topic_distribution.entry(topic.clone()).or_default() += 1;
            }
            guests.push(&chunk.guest);
        }

        guests.sort_unstable();
        guests.dedup();

        CorpusStats {
            total_chunks: self.chunks.len(),
            contrarian_chunks,
            guests: guests.len(),
            topic_distribution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn chunk(guest: &str, topics: &[&str], signals: &[&str]) -> Chunk {
        Chunk {
            episode_id: "ep-1".into(),
            guest: guest.into(),
            chunk_id: 0,
            t_start: 10,
            t_end: 60,
            citation: format!("{guest} (0:10)"),
            text: "text".into(),
            contrarian_signals: signals.iter().map(|s| s.to_string()).collect(),
            topics: topics.iter().map(|s| s.to_string()).collect(),
            embedding: vec![1.0, 0.0],
        }
    }

    #[test]
    fn stats_count_signals_topics_and_guests() {
        let store = CorpusStore::from_chunks(vec![
            chunk("A", &["pricing"], &["i disagree"]),
            chunk("A", &["pricing", "hiring"], &[]),
            chunk("B", &[], &[]),
        ]);

        let stats = store.stats();
        assert_eq!(stats.total_chunks, 3);
        assert_eq!(stats.contrarian_chunks, 1);
        assert_eq!(stats.guests, 2);
        assert_eq!(stats.topic_distribution["pricing"], 2);
        assert_eq!(stats.topic_distribution["hiring"], 1);
    }

    #[test]
    fn loads_jsonl_and_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"episode_id":"e1","title":"A","t_start":5,"t_end":9,"citation":"A (0:05)","text":"t","embedding":[1.0]}}"#
        )
        .unwrap();
        writeln!(file).unwrap();

        let store = CorpusStore::load(file.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.chunks()[0].guest, "A");
    }

    #[test]
    fn malformed_line_is_a_load_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();
        assert!(CorpusStore::load(file.path()).is_err());
    }
}
